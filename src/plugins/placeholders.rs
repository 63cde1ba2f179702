//! `${..}` placeholder substitution and response pattern extraction

use std::collections::HashMap;
use std::path::Path;
use std::result::Result as StdResult;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use lazy_static::lazy_static;
use regex::Regex;

use crate::credentials::CredentialStore;
use crate::hash::{digest_hex, FileHashes, HashAlgorithm};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\$\{([^}]+)\}").unwrap();
}

/// Values available to placeholder substitution for one step run
pub struct PlaceholderContext<'a> {
    /// Staged on-disk copy for `${filePath}`, when the transport has one
    pub file_path: Option<&'a Path>,
    pub bytes: &'a [u8],
    /// Precomputed digests, when the templates ask for named checksums
    pub hashes: Option<&'a FileHashes>,
    pub creds: Option<&'a CredentialStore>,
}

/// Replace the known placeholders in a template.
///
/// `${filePath}`, `${fileContent}`, `${fileChecksum}`,
/// `${fileChecksum.<algo>}` and `${creds.<name>}` are resolved; any
/// other token is left verbatim. The error string is a step failure
/// message, not a crate error.
pub fn substitute(
    template: &str,
    ctx: &PlaceholderContext<'_>,
) -> StdResult<String, String> {
    let mut result = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(name) = caps.get(1) else { continue };
        result.push_str(&template[last..whole.start()]);
        result.push_str(&resolve(name.as_str(), ctx)?);
        last = whole.end();
    }
    result.push_str(&template[last..]);
    Ok(result)
}

fn resolve(name: &str, ctx: &PlaceholderContext<'_>) -> StdResult<String, String> {
    match name {
        "filePath" => ctx
            .file_path
            .map(|path| path.display().to_string())
            .ok_or_else(|| "no staged file available for ${filePath}".to_string()),
        "fileContent" => Ok(BASE64.encode(ctx.bytes)),
        "fileChecksum" => Ok(digest_hex(HashAlgorithm::Sha256, ctx.bytes)),
        _ => {
            if let Some(algo_name) = name.strip_prefix("fileChecksum.") {
                let algorithm: HashAlgorithm = algo_name.parse()?;
                return Ok(match ctx.hashes {
                    Some(hashes) => hashes.get(algorithm).to_string(),
                    None => digest_hex(algorithm, ctx.bytes),
                });
            }
            if let Some(cred_name) = name.strip_prefix("creds.") {
                let store = ctx.creds.ok_or_else(|| {
                    format!("credential {} requested without a creds_path", cred_name)
                })?;
                return store.get(cred_name).map_err(|err| err.to_string());
            }
            Ok(format!("${{{}}}", name))
        }
    }
}

/// Credential names a template refers to via `${creds.<name>}`.
pub fn creds_names(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| {
            caps.get(1)
                .and_then(|name| name.as_str().strip_prefix("creds."))
                .map(str::to_string)
        })
        .collect()
}

/// True when a template needs the full digest set.
pub fn wants_named_checksums(template: &str) -> bool {
    template.contains("${fileChecksum.")
}

/// True when a template needs a staged on-disk copy.
pub fn wants_file_path(template: &str) -> bool {
    template.contains("${filePath}")
}

/// Literal part of a response pattern before its first placeholder.
/// Step output must contain this text to count as a success.
pub fn expected_prefix(response: &str) -> &str {
    response.find("${").map_or(response, |idx| &response[..idx])
}

/// Pull placeholder values out of step output.
///
/// The pattern's literal segments are matched verbatim and each
/// `${name}` captures the text between them, trimmed. No match means
/// an empty map.
pub fn extract(pattern: &str, output: &str) -> HashMap<String, String> {
    let spans: Vec<(usize, usize, String)> = PLACEHOLDER
        .captures_iter(pattern)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some((whole.start(), whole.end(), name.as_str().to_string()))
        })
        .collect();
    if spans.is_empty() {
        return HashMap::new();
    }

    let mut regex_src = String::from("(?s)");
    let mut last = 0;
    for (i, (start, end, _)) in spans.iter().enumerate() {
        regex_src.push_str(&regex::escape(&pattern[last..*start]));
        regex_src.push_str(if i + 1 == spans.len() { "(.*)" } else { "(.*?)" });
        last = *end;
    }
    regex_src.push_str(&regex::escape(&pattern[last..]));

    let Ok(matcher) = Regex::new(&regex_src) else {
        return HashMap::new();
    };
    let Some(caps) = matcher.captures(output) else {
        return HashMap::new();
    };

    spans
        .iter()
        .enumerate()
        .filter_map(|(i, (_, _, name))| {
            caps.get(i + 1)
                .map(|m| (name.clone(), m.as_str().trim().to_string()))
        })
        .collect()
}
