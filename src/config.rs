//! Validation rule and plugin step configuration

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{serde_as, DurationSeconds};

use crate::error::{ConfigError, Result};

/// Parsed configuration document.
///
/// The document has two top-level sections: `Validations` maps file
/// categories to per-extension rule sets, and `Plugins` declares the
/// external steps those rules may reference.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    #[serde(rename = "Validations", default)]
    validations: HashMap<String, HashMap<String, RuleSet>>,
    #[serde(rename = "Plugins", default)]
    plugins: PluginsSection,
}

impl ValidationConfig {
    /// Parse a configuration document from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ValidationConfig =
            serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.finish()
    }

    /// Parse a configuration document from an already-decoded value.
    pub fn from_value(value: Value) -> Result<Self> {
        let config: ValidationConfig =
            serde_json::from_value(value).map_err(ConfigError::Parse)?;
        config.finish()
    }

    /// Load a configuration file, trying JSON first and YAML second.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Self::from_value(value),
            Err(json_err) => match serde_yaml::from_str::<Value>(&raw) {
                Ok(value) => Self::from_value(value),
                Err(_) => Err(ConfigError::Parse(json_err).into()),
            },
        }
    }

    fn finish(self) -> Result<Self> {
        if self.validations.is_empty() {
            return Err(ConfigError::MissingValidations.into());
        }
        for (category, extension, rules) in self.rule_sets() {
            if rules.is_unconfigured() {
                return Err(ConfigError::EmptyRuleSet {
                    category: category.to_string(),
                    extension: extension.to_string(),
                }
                .into());
            }
        }
        Ok(self)
    }

    /// Rule set for one category and extension.
    pub fn rule_set(&self, category: &str, extension: &str) -> StdResult<&RuleSet, ConfigError> {
        let extensions = self
            .validations
            .get(category)
            .ok_or_else(|| ConfigError::UnknownCategory(category.to_string()))?;
        extensions
            .get(extension)
            .ok_or_else(|| ConfigError::UnknownExtension(extension.to_string()))
    }

    /// Every rule set in the document, with its category and extension.
    pub fn rule_sets(&self) -> impl Iterator<Item = (&str, &str, &RuleSet)> + '_ {
        self.validations.iter().flat_map(|(category, extensions)| {
            extensions
                .iter()
                .map(move |(extension, rules)| (category.as_str(), extension.as_str(), rules))
        })
    }

    /// Declared plugin steps.
    pub fn plugins(&self) -> &PluginsSection {
        &self.plugins
    }
}

/// Checks and post-actions configured for one file extension.
///
/// Every field is optional; an absent field disables its check. Any
/// key outside this set is rejected when the document is parsed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    /// Expected mime type, compared against the detected one
    pub mime_type: Option<String>,
    /// Hex byte pattern that must occur somewhere in the file
    pub magic_bytes: Option<String>,
    /// Hex byte pattern the file must start with
    pub header_signatures: Option<String>,
    /// Hex byte pattern anchored near the end of the file
    pub footer_signatures: Option<String>,
    /// Apply owner and permission changes after saving
    pub change_ownership: Option<bool>,
    /// Owner for saved files, a name or numeric uid
    pub change_ownership_user: Option<String>,
    /// Permission letters for saved files, for example "rw"
    pub change_ownership_mode: Option<String>,
    /// Store under the base64-encoded clean name
    pub name_encoding: Option<bool>,
    /// Size ceiling in kilobytes; non-numeric text disables the check
    #[serde(default, deserialize_with = "de_max_size")]
    pub max_size: Option<i64>,
    /// Plugin step ids to run around the checks
    #[serde(default)]
    pub extension_plugins: Vec<String>,
    /// Include a SHA-256 checksum in the response, on unless disabled
    pub add_checksum: Option<bool>,
    /// Stop at the first failed check
    pub fail_fast: Option<bool>,
}

impl RuleSet {
    /// A rule block must configure something; an empty `{}` is a
    /// config mistake rather than an always-valid extension.
    fn is_unconfigured(&self) -> bool {
        self.mime_type.is_none()
            && self.magic_bytes.is_none()
            && self.header_signatures.is_none()
            && self.footer_signatures.is_none()
            && self.change_ownership.is_none()
            && self.change_ownership_user.is_none()
            && self.change_ownership_mode.is_none()
            && self.name_encoding.is_none()
            && self.max_size.is_none()
            && self.extension_plugins.is_empty()
            && self.add_checksum.is_none()
            && self.fail_fast.is_none()
    }
}

/// The `Plugins` section: plugin name to step key to step definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct PluginsSection {
    groups: HashMap<String, HashMap<String, StepConfig>>,
}

impl PluginsSection {
    /// Iterate all declared steps with their derived ids.
    pub fn steps(&self) -> impl Iterator<Item = (String, &StepConfig)> + '_ {
        self.groups.iter().flat_map(|(plugin, steps)| {
            steps
                .iter()
                .map(move |(key, step)| (step_id(plugin, key), step))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// A step declared under `"pdf_cleaner": {"step1.step": {..}}` gets the
/// id `pdf_cleaner.step1`: plugin name, dot, step key minus its last
/// dotted segment.
pub(crate) fn step_id(plugin: &str, step_key: &str) -> String {
    let short = step_key
        .rsplit_once('.')
        .map_or(step_key, |(head, _)| head);
    format!("{}.{}", plugin, short)
}

/// One external step: how to invoke it and how to read its outcome
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    #[serde(flatten)]
    pub action: StepAction,
    /// Run before the built-in checks
    #[serde(default)]
    pub run_before: bool,
    /// Run after the built-in checks
    #[serde(default)]
    pub run_after: bool,
    /// Directory of credential files exposed as `${creds.<name>}`
    #[serde(default)]
    pub creds_path: Option<PathBuf>,
    /// Seconds to wait before giving up on the step
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    /// Whether a timed-out or failed step fails the whole validation
    pub on_timeout_or_fail: FailurePolicy,
    /// Command line or URL, with `${..}` placeholders
    pub endpoint: String,
    /// Expected response pattern, with `${..}` capture placeholders
    pub response: String,
}

impl StepConfig {
    /// Credentials directory, treating an empty path as unset.
    pub fn creds_path(&self) -> Option<&Path> {
        self.creds_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

/// Transport-specific part of a step definition
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StepAction {
    #[serde(rename = "cli")]
    Cli {},
    #[serde(rename = "http")]
    Http {
        method: HttpMethod,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        body: HashMap<String, String>,
        /// Status code that counts as success
        http_pass_code: u16,
        /// Status code that counts as a clean failure
        http_fail_code: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpMethod {
    Get,
    Post,
    PostMultipart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the validation when the step fails
    Fail,
    /// Log the step failure and keep going
    Pass,
}

/// `max_size` accepts a number or a numeric string. Text that does not
/// parse becomes -1, which the size check treats as disabled.
fn de_max_size<'de, D>(deserializer: D) -> StdResult<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.as_i64().unwrap_or(-1))),
        Some(Value::String(s)) => Ok(Some(s.trim().parse::<i64>().unwrap_or(-1))),
        Some(_) => Err(de::Error::custom(
            "max_size must be a number or a numeric string",
        )),
    }
}
