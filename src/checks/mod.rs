//! Built-in file checks: size, mime type and byte signatures

pub mod mime;
pub mod signatures;

use std::result::Result as StdResult;

use crate::config::RuleSet;
use crate::error::ConfigError;

pub use signatures::{SignatureCache, SignatureKind};

/// Everything the checks need to know about one file
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub bytes: &'a [u8],
    /// Cleaned file name, used in failure messages
    pub file_name: &'a str,
    pub category: &'a str,
    pub extension: &'a str,
    /// Caller-supplied mime type, if any
    pub mime_hint: Option<&'a str>,
}

/// Outcome lines from one pass over the configured checks
#[derive(Debug, Default)]
pub struct CheckReport {
    pub passed: Vec<String>,
    pub failures: Vec<String>,
}

impl CheckReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run the configured checks in a fixed order: size, mime type, magic
/// bytes, header signature, footer signature.
///
/// A rule the config leaves out or blank contributes no line at all.
/// With `fail_fast` the report stops at the first failure.
pub fn run_checks(
    rules: &RuleSet,
    cache: &SignatureCache,
    ctx: &CheckContext<'_>,
) -> StdResult<CheckReport, ConfigError> {
    let fail_fast = rules.fail_fast.unwrap_or(false);
    let mut report = CheckReport::default();

    if let Some(max) = rules.max_size.filter(|max| *max >= 0) {
        let kilobytes = ctx.bytes.len() / 1000;
        if kilobytes as i64 > max || ctx.bytes.is_empty() {
            report.failures.push(format!(
                "Invalid file size ({}KB) exceeds maximum allowed size ({}KB) for file: {}",
                kilobytes, max, ctx.file_name
            ));
            if fail_fast {
                return Ok(report);
            }
        } else {
            report
                .passed
                .push(format!("File size check passed, file size: {}KB", kilobytes));
        }
    }

    if let Some(expected) = non_blank(rules.mime_type.as_deref()) {
        let effective = mime::resolve_mime(ctx.mime_hint, ctx.bytes);
        if mime::mime_matches(expected, effective.as_deref()) {
            report.passed.push(format!(
                "Mime type check passed, mime type: {}",
                effective.as_deref().unwrap_or(expected)
            ));
        } else {
            report
                .failures
                .push(format!("Invalid mime_type for file: {}", ctx.file_name));
            if fail_fast {
                return Ok(report);
            }
        }
    }

    type Matcher = fn(&[u8], &[u8]) -> bool;
    let signature_checks: [(SignatureKind, Option<&str>, Matcher, &str); 3] = [
        (
            SignatureKind::Magic,
            rules.magic_bytes.as_deref(),
            signatures::contains_magic,
            "Magic bytes check passed, magic bytes",
        ),
        (
            SignatureKind::Header,
            rules.header_signatures.as_deref(),
            signatures::matches_header,
            "Header signatures check passed, header signatures",
        ),
        (
            SignatureKind::Footer,
            rules.footer_signatures.as_deref(),
            signatures::matches_footer,
            "Footer signatures check passed, footer signatures",
        ),
    ];

    for (kind, pattern, matcher, pass_label) in signature_checks {
        let Some(pattern) = non_blank(pattern) else {
            continue;
        };
        let parsed = cache.get_or_parse(ctx.category, ctx.extension, kind, pattern)?;
        if matcher(ctx.bytes, &parsed) {
            report.passed.push(format!("{}: {}", pass_label, pattern));
        } else {
            report.failures.push(format!(
                "Invalid {} for file: {}",
                kind.field_name(),
                ctx.file_name
            ));
            if fail_fast {
                return Ok(report);
            }
        }
    }

    Ok(report)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
