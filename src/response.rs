//! Validation outcome returned to callers

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Outcome of validating one file
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResponse {
    /// Whether every check and required step passed
    is_valid: bool,
    /// One-line verdict for the file
    results_info: String,
    /// Numbered per-check outcome lines
    results_details: String,
    /// File name with unsafe characters replaced
    clean_file_name: String,
    /// Working bytes after any plugin replacements
    #[serde(skip)]
    file_bytes: Vec<u8>,
    /// SHA-256 of the working bytes, unless the rule set disables it
    file_checksum: Option<String>,
    /// Absolute path of the saved file, when one was written
    valid_file_path: Option<PathBuf>,
}

impl ValidationResponse {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        is_valid: bool,
        results_info: String,
        results_details: String,
        clean_file_name: String,
        file_bytes: Vec<u8>,
        file_checksum: Option<String>,
        valid_file_path: Option<PathBuf>,
    ) -> Self {
        Self {
            is_valid,
            results_info,
            results_details,
            clean_file_name,
            file_bytes,
            file_checksum,
            valid_file_path,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn results_info(&self) -> &str {
        &self.results_info
    }

    pub fn results_details(&self) -> &str {
        &self.results_details
    }

    pub fn clean_file_name(&self) -> &str {
        &self.clean_file_name
    }

    pub fn file_bytes(&self) -> &[u8] {
        &self.file_bytes
    }

    pub fn file_checksum(&self) -> Option<&str> {
        self.file_checksum.as_deref()
    }

    pub fn valid_file_path(&self) -> Option<&Path> {
        self.valid_file_path.as_deref()
    }
}
