//! Checksum calculation over in-memory file content

use std::fmt;
use std::result::Result as StdResult;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// Feed digests in bounded chunks so very large uploads keep a steady
/// working-set size instead of one giant update call.
const MIN_CHUNK: usize = 1024 * 1024;
const MAX_CHUNK: usize = 3 * 1024 * 1024;

/// Digest algorithms available for checksum placeholders and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Blake3,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Blake3 => "blake3",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "blake3" => Ok(HashAlgorithm::Blake3),
            other => Err(format!("unknown hash algorithm: {}", other)),
        }
    }
}

/// All supported digests of one file, captured together
#[derive(Debug, Clone)]
pub struct FileHashes {
    /// MD5 digest as lowercase hex
    pub md5: String,
    /// SHA-1 digest as lowercase hex
    pub sha1: String,
    /// SHA-256 digest as lowercase hex
    pub sha256: String,
    /// SHA-512 digest as lowercase hex
    pub sha512: String,
    /// BLAKE3 digest as lowercase hex
    pub blake3: String,
    /// When the digests were computed
    pub computed_at: DateTime<Utc>,
}

impl FileHashes {
    /// Digest for one named algorithm, as used by checksum placeholders.
    pub fn get(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha1 => &self.sha1,
            HashAlgorithm::Sha256 => &self.sha256,
            HashAlgorithm::Sha512 => &self.sha512,
            HashAlgorithm::Blake3 => &self.blake3,
        }
    }
}

/// Lowercase hex digest of `data` under one algorithm.
pub fn digest_hex(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Md5 => update_in_chunks::<Md5>(data),
        HashAlgorithm::Sha1 => update_in_chunks::<Sha1>(data),
        HashAlgorithm::Sha256 => update_in_chunks::<Sha256>(data),
        HashAlgorithm::Sha512 => update_in_chunks::<Sha512>(data),
        HashAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            for chunk in data.chunks(chunk_size(data.len())) {
                hasher.update(chunk);
            }
            hasher.finalize().to_hex().to_string()
        }
    }
}

/// Compute every supported digest of `data`, fanning the independent
/// algorithms out across the rayon pool.
pub fn digest_all(data: &[u8]) -> FileHashes {
    let ((md5, sha1), (sha256, (sha512, blake3))) = rayon::join(
        || {
            rayon::join(
                || digest_hex(HashAlgorithm::Md5, data),
                || digest_hex(HashAlgorithm::Sha1, data),
            )
        },
        || {
            rayon::join(
                || digest_hex(HashAlgorithm::Sha256, data),
                || {
                    rayon::join(
                        || digest_hex(HashAlgorithm::Sha512, data),
                        || digest_hex(HashAlgorithm::Blake3, data),
                    )
                },
            )
        },
    );

    FileHashes {
        md5,
        sha1,
        sha256,
        sha512,
        blake3,
        computed_at: Utc::now(),
    }
}

fn update_in_chunks<D: Digest>(data: &[u8]) -> String {
    let mut hasher = D::new();
    for chunk in data.chunks(chunk_size(data.len())) {
        hasher.update(chunk);
    }
    hex::encode(hasher.finalize())
}

fn chunk_size(len: usize) -> usize {
    (len / num_cpus::get()).clamp(MIN_CHUNK, MAX_CHUNK)
}
