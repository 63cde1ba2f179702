//! Error types for file validation operations

use std::io;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;

/// Custom result type for validation operations
pub type Result<T> = StdResult<T, Error>;

/// Core error type for validation operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("file attribute error: {0}")]
    Acl(#[from] AclError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// -------------------- Sub-Error Categories --------------------

/// Errors raised while loading or resolving the JSON configuration
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config must declare a non-empty Validations section")]
    MissingValidations,

    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("at least one validation must be configured for {category}.{extension}")]
    EmptyRuleSet { category: String, extension: String },

    #[error("category {0} not found")]
    UnknownCategory(String),

    #[error("extension {0} not found")]
    UnknownExtension(String),

    #[error("step {0} defined in config does not exist in plugins configuration")]
    UnknownPluginStep(String),

    #[error("invalid hex pattern in {field} for {category}.{extension}: {detail}")]
    InvalidSignature {
        category: String,
        extension: String,
        field: &'static str,
        detail: String,
    },

    #[error("step {step}: {detail}")]
    InvalidStep { step: String, detail: String },

    #[error("failed to initialize http client: {0}")]
    HttpClient(String),
}

/// Input guard failures for a single validation call
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("fileCategory cannot be empty")]
    EmptyCategory,

    #[error("fileName cannot be empty")]
    EmptyFileName,

    #[error("file content cannot be empty")]
    EmptyFile,
}

/// Errors from the expiring credential store
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CredentialError {
    #[error("credentials path {} is not an accessible directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("credential names list cannot be empty")]
    EmptyNames,

    #[error("credential {0} is not present in the credentials directory")]
    Missing(String),

    #[error("credential {0} is not known to this store")]
    Unknown(String),

    #[error("credential {name} could not be read: {detail}")]
    Unreadable { name: String, detail: String },

    #[error("expiration must be greater than zero")]
    InvalidExpiration,
}

/// Errors from owner and permission changes on saved files
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AclError {
    #[error("invalid permissions: {0}")]
    InvalidMode(String),

    #[error("rule set enables change_ownership but omits {0}")]
    MissingField(&'static str),

    #[error("could not resolve user: {0}")]
    UnknownUser(String),

    #[error("changing file owner failed: {0}")]
    ChangeOwner(String),

    #[error("setting file permissions failed: {0}")]
    SetPermissions(String),

    #[error("ownership changes are not supported on this platform")]
    Unsupported,
}
