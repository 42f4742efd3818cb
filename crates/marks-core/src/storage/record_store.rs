use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

use super::provider::{EncryptionProvider, ProviderError};
use crate::bookmarks::Collection;

/// Failures surfaced by [`EncryptedStore`]. Raw I/O never crosses this boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store file does not exist yet.
    #[error("no bookmark store at {path}")]
    NotFound { path: String },
    /// Decryption succeeded but the plaintext is not a bookmark list.
    #[error("bookmark store is corrupt: {reason}")]
    CorruptData { reason: String },
    #[error("could not decrypt bookmark store: {reason}")]
    DecryptionFailed { reason: String },
    #[error("could not encrypt bookmark store: {reason}")]
    EncryptionFailed { reason: String },
    #[error("could not write bookmark store: {reason}")]
    Write { reason: String },
}

/// Durable, encrypted-at-rest bookmark collection stored as one blob.
pub struct EncryptedStore<P: EncryptionProvider> {
    path: PathBuf,
    provider: P,
}

impl<P: EncryptionProvider> EncryptedStore<P> {
    pub fn new(path: impl Into<PathBuf>, provider: P) -> Self {
        Self {
            path: path.into(),
            provider,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.provider.exists(&self.path)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<Collection, StoreError> {
        let plaintext = self
            .provider
            .decrypt(&self.path)
            .await
            .map_err(|err| match err {
                ProviderError::NotFound { path } => StoreError::NotFound { path },
                other => StoreError::DecryptionFailed {
                    reason: other.to_string(),
                },
            })?;

        let collection: Collection =
            serde_json::from_slice(&plaintext).map_err(|e| StoreError::CorruptData {
                reason: e.to_string(),
            })?;
        debug!(records = collection.len(), "loaded bookmark store");
        Ok(collection)
    }

    /// Replace the stored collection. Either the whole new blob lands or the old one stays.
    #[instrument(skip_all, fields(path = %self.path.display(), records = collection.len()))]
    pub async fn save(&self, collection: &Collection) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec_pretty(collection).map_err(|e| StoreError::Write {
            reason: format!("serialize failed: {e}"),
        })?;

        self.provider
            .encrypt_and_write(&self.path, &plaintext)
            .await
            .map_err(|err| match err {
                ProviderError::Encrypt { reason } => StoreError::EncryptionFailed { reason },
                other => StoreError::Write {
                    reason: other.to_string(),
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bookmarks::Bookmark, storage::InMemoryProvider};

    fn store(provider: &InMemoryProvider) -> EncryptedStore<InMemoryProvider> {
        EncryptedStore::new("/tmp/marks-test.enc", provider.clone())
    }

    #[tokio::test]
    async fn load_after_save_returns_same_collection() {
        let provider = InMemoryProvider::new();
        let store = store(&provider);
        let collection = vec![
            Bookmark::new("https://b.com", Some("notes".into())),
            Bookmark::new("https://a.com", None),
        ];

        store.save(&collection).await.expect("save");
        let loaded = store.load().await.expect("load");
        assert_eq!(loaded, collection);
    }

    #[tokio::test]
    async fn empty_collection_is_an_empty_array() {
        let provider = InMemoryProvider::new();
        let store = store(&provider);

        store.save(&Vec::new()).await.expect("save");
        let raw = provider.plaintext(store.path()).expect("stored");
        assert_eq!(raw, b"[]");
        assert!(store.load().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let provider = InMemoryProvider::new();
        let store = store(&provider);

        assert!(!store.exists());
        let err = store.load().await.expect_err("should be missing");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn malformed_plaintext_is_corrupt_not_decryption_failure() {
        let provider = InMemoryProvider::new();
        let store = store(&provider);
        provider.insert_plaintext(store.path(), b"{\"url\": ");

        let err = store.load().await.expect_err("should be corrupt");
        assert!(matches!(err, StoreError::CorruptData { .. }));
    }

    #[tokio::test]
    async fn provider_decrypt_failure_is_reported_as_such() {
        let provider = InMemoryProvider::new();
        let store = store(&provider);
        store.save(&Vec::new()).await.expect("save");

        provider.set_fail_reads(true);
        let err = store.load().await.expect_err("should fail");
        assert!(matches!(err, StoreError::DecryptionFailed { .. }));
    }

    #[tokio::test]
    async fn write_failure_surfaces_and_keeps_old_contents() {
        let provider = InMemoryProvider::new();
        let store = store(&provider);
        let original = vec![Bookmark::new("https://a.com", None)];
        store.save(&original).await.expect("save");

        provider.set_fail_writes(true);
        let err = store
            .save(&vec![Bookmark::new("https://b.com", None)])
            .await
            .expect_err("should fail");
        assert!(matches!(err, StoreError::Write { .. }));

        provider.set_fail_writes(false);
        assert_eq!(store.load().await.expect("load"), original);
    }
}
