//! Expiring store for plugin credentials read from disk

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::result::Result as StdResult;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rand::RngCore;
use tracing::debug;

use crate::error::CredentialError;

const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

/// Credential files loaded on demand and cached for a limited time.
///
/// Cached values are XOR-masked with a random pad so the plaintext
/// never sits in memory between uses, and wiped when they expire.
pub struct CredentialStore {
    dir: PathBuf,
    names: Vec<String>,
    ttl: RwLock<Duration>,
    entries: RwLock<HashMap<String, MaskedValue>>,
}

struct MaskedValue {
    masked: Vec<u8>,
    pad: Vec<u8>,
    loaded_at: Instant,
}

impl MaskedValue {
    fn conceal(value: &str) -> Self {
        let bytes = value.as_bytes();
        let mut pad = vec![0u8; bytes.len()];
        rand::thread_rng().fill_bytes(&mut pad);
        let masked = bytes.iter().zip(&pad).map(|(b, p)| b ^ p).collect();
        Self {
            masked,
            pad,
            loaded_at: Instant::now(),
        }
    }

    fn reveal(&self) -> String {
        let bytes: Vec<u8> = self
            .masked
            .iter()
            .zip(&self.pad)
            .map(|(b, p)| b ^ p)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn wipe(&mut self) {
        self.masked.fill(0);
        self.pad.fill(0);
    }
}

impl Drop for MaskedValue {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl CredentialStore {
    /// Open a store over `dir`, restricted to the given names.
    ///
    /// The directory and every named file must already exist.
    pub fn new(dir: impl Into<PathBuf>, names: &[String]) -> StdResult<Self, CredentialError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(CredentialError::NotADirectory(dir));
        }
        if names.is_empty() {
            return Err(CredentialError::EmptyNames);
        }
        for name in names {
            if !dir.join(name).is_file() {
                return Err(CredentialError::Missing(name.clone()));
            }
        }
        Ok(Self {
            dir,
            names: names.to_vec(),
            ttl: RwLock::new(DEFAULT_TTL),
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Fetch a credential value, reading it from disk on a cache miss.
    ///
    /// Reads refresh the entry's expiry clock.
    pub fn get(&self, name: &str) -> StdResult<String, CredentialError> {
        if !self.names.iter().any(|n| n == name) {
            return Err(CredentialError::Unknown(name.to_string()));
        }

        let ttl = *self.ttl.read();
        {
            let mut entries = self.entries.write();
            entries.retain(|_, value| {
                let fresh = value.loaded_at.elapsed() < ttl;
                if !fresh {
                    value.wipe();
                }
                fresh
            });
            if let Some(value) = entries.get_mut(name) {
                value.loaded_at = Instant::now();
                return Ok(value.reveal());
            }
        }

        let raw = fs::read_to_string(self.dir.join(name)).map_err(|err| {
            CredentialError::Unreadable {
                name: name.to_string(),
                detail: err.to_string(),
            }
        })?;
        let value = raw.trim_end().to_string();
        debug!(credential = name, "loaded credential from disk");
        self.entries
            .write()
            .insert(name.to_string(), MaskedValue::conceal(&value));
        Ok(value)
    }

    /// Change how long cached values stay usable.
    pub fn set_expiration(&self, ttl: Duration) -> StdResult<(), CredentialError> {
        if ttl.is_zero() {
            return Err(CredentialError::InvalidExpiration);
        }
        *self.ttl.write() = ttl;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn store_with(value: &str) -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("api_token"), value).unwrap();
        let store = CredentialStore::new(dir.path(), &["api_token".to_string()]).unwrap();
        (dir, store)
    }

    #[test]
    fn returns_trimmed_file_content() {
        let (_dir, store) = store_with("s3cr3t\n");
        assert_eq!(store.get("api_token").unwrap(), "s3cr3t");
    }

    #[test]
    fn caches_until_expiry() {
        let (dir, store) = store_with("first");
        store
            .set_expiration(Duration::from_millis(40))
            .unwrap();

        assert_eq!(store.get("api_token").unwrap(), "first");
        fs::write(dir.path().join("api_token"), "second").unwrap();
        assert_eq!(store.get("api_token").unwrap(), "first");

        sleep(Duration::from_millis(60));
        assert_eq!(store.get("api_token").unwrap(), "second");
    }

    #[test]
    fn rejects_unknown_names() {
        let (_dir, store) = store_with("x");
        assert!(matches!(
            store.get("other"),
            Err(CredentialError::Unknown(name)) if name == "other"
        ));
    }

    #[test]
    fn construction_validates_inputs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CredentialStore::new(dir.path().join("nope"), &["a".to_string()]),
            Err(CredentialError::NotADirectory(_))
        ));
        assert!(matches!(
            CredentialStore::new(dir.path(), &[]),
            Err(CredentialError::EmptyNames)
        ));
        assert!(matches!(
            CredentialStore::new(dir.path(), &["ghost".to_string()]),
            Err(CredentialError::Missing(name)) if name == "ghost"
        ));
    }

    #[test]
    fn expiration_must_be_positive() {
        let (_dir, store) = store_with("x");
        assert!(matches!(
            store.set_expiration(Duration::ZERO),
            Err(CredentialError::InvalidExpiration)
        ));
    }
}
