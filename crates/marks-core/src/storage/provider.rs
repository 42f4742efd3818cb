use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use thiserror::Error;

/// Errors produced by encryption providers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Nothing stored at the path.
    #[error("no encrypted file at {path}")]
    NotFound { path: String },
    /// Stored bytes could not be decrypted (wrong key, tampered or foreign file).
    #[error("decrypt failed: {reason}")]
    Decrypt { reason: String },
    /// Plaintext could not be encrypted (usually: no key available).
    #[error("encrypt failed: {reason}")]
    Encrypt { reason: String },
    /// Underlying read/write failure.
    #[error("io failure: {reason}")]
    Io { reason: String },
}

/// Transparent encrypt-on-write / decrypt-on-read over a file path.
/// Key material is resolved by the implementation, never by callers.
#[async_trait]
pub trait EncryptionProvider: Send + Sync {
    /// Whether anything is stored at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Read and decrypt the full contents of `path`.
    async fn decrypt(&self, path: &Path) -> Result<Vec<u8>, ProviderError>;

    /// Encrypt `plaintext` and replace the contents of `path` in one step.
    async fn encrypt_and_write(&self, path: &Path, plaintext: &[u8])
        -> Result<(), ProviderError>;
}

/// In-memory provider that simulates encryption for tests and smoke runs.
/// Not cryptographically secure. Clones share the same backing map, and
/// read or write failures can be switched on to exercise error paths.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProvider {
    inner: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `decrypt` fail as if the key were wrong.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `encrypt_and_write` fail without touching the entry.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Store raw plaintext as if it had been written by another tool.
    pub fn insert_plaintext(&self, path: impl Into<PathBuf>, plaintext: &[u8]) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(path.into(), mask(plaintext));
        }
    }

    /// Decrypted view of whatever is stored at `path`.
    pub fn plaintext(&self, path: &Path) -> Option<Vec<u8>> {
        let map = self.inner.lock().ok()?;
        map.get(path).map(|masked| unmask(masked))
    }
}

#[async_trait]
impl EncryptionProvider for InMemoryProvider {
    fn exists(&self, path: &Path) -> bool {
        self.inner
            .lock()
            .map(|map| map.contains_key(path))
            .unwrap_or(false)
    }

    async fn decrypt(&self, path: &Path) -> Result<Vec<u8>, ProviderError> {
        let map = self.inner.lock().map_err(|err| ProviderError::Io {
            reason: format!("lock poisoned: {err}"),
        })?;

        let masked = map.get(path).ok_or_else(|| ProviderError::NotFound {
            path: path.display().to_string(),
        })?;

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ProviderError::Decrypt {
                reason: "simulated key mismatch".to_string(),
            });
        }
        Ok(unmask(masked))
    }

    async fn encrypt_and_write(
        &self,
        path: &Path,
        plaintext: &[u8],
    ) -> Result<(), ProviderError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ProviderError::Io {
                reason: "simulated write failure".to_string(),
            });
        }

        let mut map = self.inner.lock().map_err(|err| ProviderError::Io {
            reason: format!("lock poisoned: {err}"),
        })?;
        // XOR is a placeholder to avoid holding plaintext in tests.
        map.insert(path.to_path_buf(), mask(plaintext));
        Ok(())
    }
}

const MASK_BYTE: u8 = 0xA5;

fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}

fn unmask(input: &[u8]) -> Vec<u8> {
    mask(input) // XOR twice restores original.
}
