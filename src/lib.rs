//! File upload validation and sanitization.
//!
//! A JSON configuration maps file categories and extensions to rule
//! sets: byte signature checks, size and mime limits, external plugin
//! steps, and what to do with a file that passes. [`FileValidator`]
//! applies those rules to in-memory bytes or files on disk and returns
//! a [`ValidationResponse`] describing the outcome.

pub mod checks;
pub mod config;
pub mod credentials;
pub mod error;
pub mod hash;
pub mod plugins;
pub mod response;
pub mod sanitize;
pub mod storage;
pub mod validator;

// Re-exports for crate consumers
pub use config::ValidationConfig;
pub use credentials::CredentialStore;
pub use error::{Error, Result};
pub use hash::{FileHashes, HashAlgorithm};
pub use response::ValidationResponse;
pub use validator::{FileValidator, ValidateOptions};
