//! File validation orchestration

use std::path::{Path, PathBuf};
use std::result::Result as StdResult;

use tracing::{debug, info, instrument, warn};

use crate::checks::{self, CheckContext, SignatureCache};
use crate::config::{FailurePolicy, RuleSet, ValidationConfig};
use crate::error::{AclError, ConfigError, Result, ValidationError};
use crate::hash::{digest_hex, HashAlgorithm};
use crate::plugins::{self, PluginSet, StepContext};
use crate::response::ValidationResponse;
use crate::sanitize;
use crate::storage;

/// Per-call options for a validation
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    output_dir: Option<PathBuf>,
    mime_type: Option<String>,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save the file into this directory when it validates.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Trust this mime type instead of sniffing the content.
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }
}

/// Validates files against a configuration document.
///
/// Construction resolves every plugin step up front, so a config that
/// references an undeclared step never produces a validator.
pub struct FileValidator {
    config: ValidationConfig,
    plugins: PluginSet,
    patterns: SignatureCache,
}

impl FileValidator {
    pub fn new(config: ValidationConfig) -> Result<Self> {
        let plugins = PluginSet::from_config(config.plugins())?;
        for (_, _, rules) in config.rule_sets() {
            for id in &rules.extension_plugins {
                if !plugins.contains(id) {
                    return Err(ConfigError::UnknownPluginStep(id.clone()).into());
                }
            }
        }
        Ok(Self {
            config,
            plugins,
            patterns: SignatureCache::new(),
        })
    }

    /// Validate in-memory bytes under a category's rules.
    pub async fn validate_bytes(
        &self,
        category: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ValidationResponse> {
        self.validate_bytes_with(category, file_name, bytes, &ValidateOptions::default())
            .await
    }

    /// Validate a file read from disk.
    pub async fn validate_path(&self, category: &str, path: &Path) -> Result<ValidationResponse> {
        self.validate_path_with(category, path, &ValidateOptions::default())
            .await
    }

    pub async fn validate_path_with(
        &self,
        category: &str,
        path: &Path,
        options: &ValidateOptions,
    ) -> Result<ValidationResponse> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        self.validate_bytes_with(category, &file_name, bytes, options).await
    }

    /// Full validation flow: guards, plugin steps around the built-in
    /// checks, then optional save and ownership changes.
    ///
    /// Unknown categories and extensions come back as invalid
    /// responses; only unusable input and broken config are errors.
    #[instrument(skip(self, bytes, options), fields(size = bytes.len()))]
    pub async fn validate_bytes_with(
        &self,
        category: &str,
        file_name: &str,
        mut bytes: Vec<u8>,
        options: &ValidateOptions,
    ) -> Result<ValidationResponse> {
        if category.trim().is_empty() {
            return Err(ValidationError::EmptyCategory.into());
        }
        if file_name.trim().is_empty() {
            return Err(ValidationError::EmptyFileName.into());
        }
        if bytes.is_empty() {
            return Err(ValidationError::EmptyFile.into());
        }

        let clean_name = sanitize::clean_file_name(file_name);
        let extension = sanitize::file_extension(file_name);

        let rules = match self.config.rule_set(category, extension) {
            Ok(rules) => rules,
            Err(err) => {
                warn!(%err, "no validation rules for file");
                let checksum = Some(digest_hex(HashAlgorithm::Sha256, &bytes));
                return Ok(ValidationResponse::new(
                    false,
                    format!("Error resolving validation rules: {}", err),
                    String::new(),
                    clean_name,
                    bytes,
                    checksum,
                    None,
                ));
            }
        };
        let add_checksum = rules.add_checksum.unwrap_or(true);

        if let Some(failed) = self
            .run_steps(rules, true, &clean_name, extension, &mut bytes)
            .await
        {
            let checksum = add_checksum.then(|| digest_hex(HashAlgorithm::Sha256, &bytes));
            return Ok(ValidationResponse::new(
                false,
                format!("Plugin execution failed for {}", clean_name),
                format!("\n1. {}", failed),
                clean_name,
                bytes,
                checksum,
                None,
            ));
        }

        let report = checks::run_checks(
            rules,
            &self.patterns,
            &CheckContext {
                bytes: &bytes,
                file_name: &clean_name,
                category,
                extension,
                mime_hint: options.mime_type.as_deref(),
            },
        )?;

        if !report.is_valid() {
            info!(file = %clean_name, failures = report.failures.len(), "file validation failed");
            let checksum = add_checksum.then(|| digest_hex(HashAlgorithm::Sha256, &bytes));
            return Ok(ValidationResponse::new(
                false,
                format!("File validation failed for {}", clean_name),
                numbered(&report.failures),
                clean_name,
                bytes,
                checksum,
                None,
            ));
        }

        if let Some(failed) = self
            .run_steps(rules, false, &clean_name, extension, &mut bytes)
            .await
        {
            let checksum = add_checksum.then(|| digest_hex(HashAlgorithm::Sha256, &bytes));
            return Ok(ValidationResponse::new(
                false,
                format!("Plugin execution failed for {}", clean_name),
                format!("\n1. {}", failed),
                clean_name,
                bytes,
                checksum,
                None,
            ));
        }

        let checksum = add_checksum.then(|| digest_hex(HashAlgorithm::Sha256, &bytes));
        let details = numbered(&report.passed);

        let Some(output_dir) = options.output_dir.as_deref() else {
            info!(file = %clean_name, "file is valid");
            return Ok(ValidationResponse::new(
                true,
                format!("File is valid: {}", clean_name),
                details,
                clean_name,
                bytes,
                checksum,
                None,
            ));
        };

        let stored_name = if rules.name_encoding.unwrap_or(false) {
            sanitize::encode_file_name(&clean_name, extension)
        } else {
            clean_name.clone()
        };

        match storage::save_to_output_dir(output_dir, &stored_name, &bytes) {
            Ok(path) => {
                if let Err(err) = apply_ownership(rules, &path) {
                    let _ = std::fs::remove_file(&path);
                    warn!(%err, file = %clean_name, "removed saved file after failed ownership change");
                    return Ok(ValidationResponse::new(
                        true,
                        format!(
                            "File is valid but failed to save to output directory: {}",
                            err
                        ),
                        details,
                        clean_name,
                        bytes,
                        checksum,
                        None,
                    ));
                }
                info!(file = %clean_name, path = %path.display(), "file is valid and saved");
                Ok(ValidationResponse::new(
                    true,
                    format!(
                        "File is valid and was saved to output directory: {}",
                        path.display()
                    ),
                    details,
                    clean_name,
                    bytes,
                    checksum,
                    Some(path),
                ))
            }
            Err(err) => {
                warn!(%err, file = %clean_name, "could not save valid file");
                Ok(ValidationResponse::new(
                    true,
                    format!(
                        "File is valid but failed to save to output directory: {}",
                        err
                    ),
                    details,
                    clean_name,
                    bytes,
                    checksum,
                    None,
                ))
            }
        }
    }

    /// Run the rule set's steps for one phase. A failing step whose
    /// policy is `fail` aborts with its detail line; `pass` failures
    /// are logged and skipped.
    async fn run_steps(
        &self,
        rules: &RuleSet,
        before: bool,
        clean_name: &str,
        extension: &str,
        bytes: &mut Vec<u8>,
    ) -> Option<String> {
        for id in &rules.extension_plugins {
            let Some(step) = self.plugins.get(id) else {
                continue;
            };
            let wanted = if before {
                step.config.run_before
            } else {
                step.config.run_after
            };
            if !wanted {
                continue;
            }

            let outcome = step
                .run(&StepContext {
                    bytes,
                    extension,
                    clean_file_name: clean_name,
                })
                .await;

            let failure = if outcome.success {
                match plugins::apply_replacement(&step.id, &outcome, bytes) {
                    Ok(replaced) => {
                        info!("Success for step: {}", step.id);
                        if replaced {
                            debug!(step = %step.id, size = bytes.len(), "step replaced the working bytes");
                        }
                        continue;
                    }
                    Err(message) => message,
                }
            } else {
                outcome.message
            };

            match step.config.on_timeout_or_fail {
                FailurePolicy::Fail => {
                    return Some(format!("Failed for step: {}, Results: {}", step.id, failure));
                }
                FailurePolicy::Pass => {
                    warn!("Error for step: {}, Results: {}", step.id, failure);
                }
            }
        }
        None
    }
}

fn apply_ownership(rules: &RuleSet, path: &Path) -> StdResult<(), AclError> {
    if !rules.change_ownership.unwrap_or(false) {
        return Ok(());
    }
    let user = rules
        .change_ownership_user
        .as_deref()
        .ok_or(AclError::MissingField("change_ownership_user"))?;
    let mode = rules
        .change_ownership_mode
        .as_deref()
        .ok_or(AclError::MissingField("change_ownership_mode"))?;
    storage::apply_acl(path, user, mode)
}

fn numbered(lines: &[String]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("\n{}. {}", i + 1, line))
        .collect()
}
