//! External validation steps run before or after the built-in checks

pub mod cli;
pub mod http;
pub mod placeholders;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::result::Result as StdResult;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use tempfile::TempDir;

use crate::config::{PluginsSection, StepAction, StepConfig};
use crate::credentials::CredentialStore;
use crate::error::{ConfigError, Result};

pub use cli::CliRunner;
pub use http::HttpRunner;

/// File state handed to a step
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub bytes: &'a [u8],
    pub extension: &'a str,
    pub clean_file_name: &'a str,
}

/// What one step run produced
#[derive(Debug)]
pub struct StepOutcome {
    pub success: bool,
    /// Raw step output, command output or http response body
    pub output: String,
    /// Values captured through the step's response pattern
    pub extracted: HashMap<String, String>,
    /// Failure description, empty on success
    pub message: String,
    /// Keeps a staged temp copy alive until any `filePath` replacement
    /// has been read back
    staging: Option<TempDir>,
}

impl StepOutcome {
    pub fn success(output: String, extracted: HashMap<String, String>) -> Self {
        Self {
            success: true,
            output,
            extracted,
            message: String::new(),
            staging: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            extracted: HashMap::new(),
            message: message.into(),
            staging: None,
        }
    }

    pub(crate) fn keep_staging(mut self, dir: TempDir) -> Self {
        self.staging = Some(dir);
        self
    }
}

/// Transport behind a plugin step
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run(
        &self,
        id: &str,
        step: &StepConfig,
        creds: Option<&CredentialStore>,
        ctx: &StepContext<'_>,
    ) -> StepOutcome;
}

/// One resolved step: its config, transport and credential store
pub struct PluginStep {
    pub id: String,
    pub config: StepConfig,
    runner: Box<dyn StepRunner>,
    creds: Option<Arc<CredentialStore>>,
}

impl PluginStep {
    pub async fn run(&self, ctx: &StepContext<'_>) -> StepOutcome {
        self.runner
            .run(&self.id, &self.config, self.creds.as_deref(), ctx)
            .await
    }
}

/// All steps declared in the config, ready to run by id
#[derive(Default)]
pub struct PluginSet {
    steps: HashMap<String, Arc<PluginStep>>,
}

impl PluginSet {
    /// Build runners and credential stores for every declared step.
    pub fn from_config(section: &PluginsSection) -> Result<Self> {
        let mut steps = HashMap::new();
        let mut http_client: Option<reqwest::Client> = None;

        for (id, config) in section.steps() {
            let runner: Box<dyn StepRunner> = match &config.action {
                StepAction::Cli {} => Box::new(CliRunner),
                StepAction::Http { .. } => {
                    let client = match &http_client {
                        Some(client) => client.clone(),
                        None => {
                            let client = reqwest::Client::builder()
                                .build()
                                .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
                            http_client = Some(client.clone());
                            client
                        }
                    };
                    Box::new(HttpRunner::new(client))
                }
            };
            let creds = build_creds(&id, config)?;
            steps.insert(
                id.clone(),
                Arc::new(PluginStep {
                    id,
                    config: config.clone(),
                    runner,
                    creds,
                }),
            );
        }
        Ok(Self { steps })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<PluginStep>> {
        self.steps.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.steps.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A step referencing `${creds.<name>}` gets a store over its
/// `creds_path`; referencing credentials without a path is a config
/// error, since the step could never run.
fn build_creds(id: &str, config: &StepConfig) -> Result<Option<Arc<CredentialStore>>> {
    let mut names = placeholders::creds_names(&config.endpoint);
    if let StepAction::Http { headers, body, .. } = &config.action {
        for value in headers.values().chain(body.values()) {
            names.extend(placeholders::creds_names(value));
        }
    }
    names.sort();
    names.dedup();

    if names.is_empty() {
        return Ok(None);
    }
    let Some(path) = config.creds_path() else {
        return Err(ConfigError::InvalidStep {
            step: id.to_string(),
            detail: "credentials referenced without a creds_path".to_string(),
        }
        .into());
    };
    let store = CredentialStore::new(path, &names).map_err(|err| ConfigError::InvalidStep {
        step: id.to_string(),
        detail: err.to_string(),
    })?;
    Ok(Some(Arc::new(store)))
}

/// Apply a successful step's file replacement, if it captured one.
///
/// `<step>.filePath` reads the named file back and removes its temp
/// directory; `<step>.fileContent` decodes inline base64. A step may
/// capture both; the decoded content is applied last and wins. Returns
/// whether the working bytes changed; the error string is a step
/// failure message.
pub fn apply_replacement(
    step_id: &str,
    outcome: &StepOutcome,
    bytes: &mut Vec<u8>,
) -> StdResult<bool, String> {
    let short = step_id.rsplit_once('.').map_or(step_id, |(_, tail)| tail);
    let mut replaced = false;

    if let Some(path) = outcome.extracted.get(&format!("{}.filePath", short)) {
        let path = Path::new(path);
        let replacement = fs::read(path)
            .map_err(|err| format!("could not read replacement file {}: {}", path.display(), err))?;
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
        *bytes = replacement;
        replaced = true;
    }

    if let Some(encoded) = outcome.extracted.get(&format!("{}.fileContent", short)) {
        let replacement = BASE64
            .decode(encoded.as_bytes())
            .map_err(|err| format!("invalid base64 file content from step: {}", err))?;
        *bytes = replacement;
        replaced = true;
    }

    Ok(replaced)
}
