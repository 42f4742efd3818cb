//! In-process working copy of the bookmark collection over an `EncryptedStore`.
//! The cache decrypts at most once per load, writes the whole collection back
//! after every mutation, and tracks whether memory is ahead of disk.

mod api;

pub use api::{BookmarkApi, Outcome};

use marks_core::{
    bookmarks::{self, Bookmark, Collection},
    storage::{EncryptedStore, EncryptionProvider, StoreError},
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("already bookmarked: {url}")]
    AlreadyExists { url: String },
    #[error("no bookmark for {url}")]
    NotFound { url: String },
    #[error("bookmark url must not be empty")]
    InvalidUrl,
    #[error("unsaved changes were discarded for {path}")]
    UnsavedChanges { path: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    /// Only a store that cannot be decrypted stops the program.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CacheError::Store(StoreError::DecryptionFailed { .. }))
    }
}

/// Lazily-populated bookmark collection plus dirty tracking.
/// Exclusive `&mut self` access keeps every operation sequential.
pub struct RecordCache<P: EncryptionProvider> {
    store: EncryptedStore<P>,
    collection: Option<Collection>,
    dirty: bool,
    warnings: Vec<String>,
}

impl<P: EncryptionProvider> RecordCache<P> {
    pub fn new(store: EncryptedStore<P>) -> Self {
        Self {
            store,
            collection: None,
            dirty: false,
            warnings: Vec::new(),
        }
    }

    pub fn store(&self) -> &EncryptedStore<P> {
        &self.store
    }

    pub fn is_loaded(&self) -> bool {
        self.collection.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Drain warnings from recovered loads (corrupt store replaced by an empty list).
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub async fn get_all(&mut self) -> Result<&Collection, CacheError> {
        let collection = self.working_copy().await?;
        Ok(collection)
    }

    pub async fn find(&mut self, url: &str) -> Result<&Bookmark, CacheError> {
        let collection = self.working_copy().await?;
        bookmarks::find(collection, url).ok_or_else(|| CacheError::NotFound {
            url: url.to_string(),
        })
    }

    #[instrument(skip(self, description))]
    pub async fn add(&mut self, url: &str, description: Option<String>) -> Result<(), CacheError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CacheError::InvalidUrl);
        }

        let collection = self.working_copy().await?;
        if bookmarks::find(collection, url).is_some() {
            return Err(CacheError::AlreadyExists {
                url: url.to_string(),
            });
        }
        collection.push(Bookmark::new(url, description));

        self.dirty = true;
        self.flush().await
    }

    #[instrument(skip(self))]
    pub async fn delete(&mut self, url: &str) -> Result<(), CacheError> {
        let collection = self.working_copy().await?;
        let before = collection.len();
        collection.retain(|b| b.url != url);
        if collection.len() == before {
            return Err(CacheError::NotFound {
                url: url.to_string(),
            });
        }

        self.dirty = true;
        self.flush().await
    }

    #[instrument(skip(self, description))]
    pub async fn edit(&mut self, url: &str, description: Option<String>) -> Result<(), CacheError> {
        let collection = self.working_copy().await?;
        let bookmark = collection
            .iter_mut()
            .find(|b| b.url == url)
            .ok_or_else(|| CacheError::NotFound {
                url: url.to_string(),
            })?;
        bookmark.set_description(description);

        self.dirty = true;
        self.flush().await
    }

    /// Write the whole working copy if it is ahead of disk.
    /// A failed write leaves the mutation in memory and the flag set.
    pub async fn flush(&mut self) -> Result<(), CacheError> {
        if !self.dirty {
            return Ok(());
        }
        let Some(collection) = self.collection.as_ref() else {
            return Ok(());
        };

        self.store.save(collection).await?;
        self.dirty = false;
        debug!(records = collection.len(), "flushed bookmark store");
        Ok(())
    }

    /// Forget the working copy; the next read decrypts the file again.
    pub fn reload(&mut self) {
        if self.dirty {
            warn!("reload discarded unsaved bookmark changes");
        }
        self.collection = None;
        self.dirty = false;
    }

    /// Create an empty store file when none exists. Never touches an existing file.
    /// Unsaved changes stay in memory and keep the dirty flag; they are not written here.
    pub async fn initialize_if_absent(&mut self) -> Result<bool, CacheError> {
        if self.store.exists() {
            return Ok(false);
        }

        self.store.save(&Vec::new()).await?;
        if !self.dirty {
            self.collection = Some(Vec::new());
        }
        Ok(true)
    }

    /// End of the cache's life. Reports memory that never reached disk.
    pub fn shutdown(self) -> Result<(), CacheError> {
        if self.dirty {
            warn!("shutting down with unsaved bookmark changes");
            return Err(CacheError::UnsavedChanges {
                path: self.store.path().display().to_string(),
            });
        }
        Ok(())
    }

    async fn working_copy(&mut self) -> Result<&mut Collection, CacheError> {
        if self.collection.is_none() {
            let loaded = match self.store.load().await {
                Ok(collection) => collection,
                Err(StoreError::NotFound { path }) => {
                    debug!(%path, "no store yet, starting empty");
                    Vec::new()
                }
                Err(StoreError::CorruptData { reason }) => {
                    warn!(%reason, "bookmark store is corrupt, starting empty");
                    self.warnings
                        .push(format!("bookmark store is corrupt ({reason}); showing no bookmarks"));
                    Vec::new()
                }
                Err(err) => return Err(err.into()),
            };
            self.dirty = false;
            self.collection = Some(loaded);
        } else {
            debug!("bookmark cache hit");
        }

        Ok(self.collection.get_or_insert_with(Vec::new))
    }
}
