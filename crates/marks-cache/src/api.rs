use std::fmt;

use async_trait::async_trait;
use marks_core::{bookmarks::Collection, storage::EncryptionProvider};

use crate::{CacheError, RecordCache};

/// Result of a successful bookmark command, rendered as one short line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Added { url: String },
    Deleted { url: String },
    Edited { url: String },
    Reloaded,
    Initialized { path: String },
    AlreadyInitialized { path: String },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Added { url } => write!(f, "Added {url}"),
            Outcome::Deleted { url } => write!(f, "Deleted {url}"),
            Outcome::Edited { url } => write!(f, "Updated description for {url}"),
            Outcome::Reloaded => write!(f, "Reloaded bookmarks from disk"),
            Outcome::Initialized { path } => write!(f, "Created empty bookmark store at {path}"),
            Outcome::AlreadyInitialized { path } => {
                write!(f, "Bookmark store already exists at {path}")
            }
        }
    }
}

/// Operations the UI layer drives. Implemented by [`RecordCache`].
#[async_trait]
pub trait BookmarkApi: Send {
    async fn add_bookmark(
        &mut self,
        url: &str,
        description: Option<String>,
    ) -> Result<Outcome, CacheError>;

    async fn delete_bookmark(&mut self, url: &str) -> Result<Outcome, CacheError>;

    async fn list_bookmarks(&mut self) -> Result<Collection, CacheError>;

    /// Urls in display order, for pickers.
    async fn find_for_selection(&mut self) -> Result<Vec<String>, CacheError>;

    async fn edit_description(
        &mut self,
        url: &str,
        description: Option<String>,
    ) -> Result<Outcome, CacheError>;

    fn reload(&mut self) -> Outcome;

    async fn initialize_if_absent(&mut self) -> Result<Outcome, CacheError>;

    /// Messages from loads that recovered from a corrupt store.
    fn take_warnings(&mut self) -> Vec<String>;
}

#[async_trait]
impl<P: EncryptionProvider> BookmarkApi for RecordCache<P> {
    async fn add_bookmark(
        &mut self,
        url: &str,
        description: Option<String>,
    ) -> Result<Outcome, CacheError> {
        self.add(url, description).await?;
        Ok(Outcome::Added {
            url: url.trim().to_string(),
        })
    }

    async fn delete_bookmark(&mut self, url: &str) -> Result<Outcome, CacheError> {
        self.delete(url).await?;
        Ok(Outcome::Deleted {
            url: url.to_string(),
        })
    }

    async fn list_bookmarks(&mut self) -> Result<Collection, CacheError> {
        Ok(self.get_all().await?.clone())
    }

    async fn find_for_selection(&mut self) -> Result<Vec<String>, CacheError> {
        let collection = self.get_all().await?;
        Ok(collection.iter().map(|b| b.url.clone()).collect())
    }

    async fn edit_description(
        &mut self,
        url: &str,
        description: Option<String>,
    ) -> Result<Outcome, CacheError> {
        self.edit(url, description).await?;
        Ok(Outcome::Edited {
            url: url.to_string(),
        })
    }

    fn reload(&mut self) -> Outcome {
        RecordCache::reload(self);
        Outcome::Reloaded
    }

    async fn initialize_if_absent(&mut self) -> Result<Outcome, CacheError> {
        let path = self.store().path().display().to_string();
        if RecordCache::initialize_if_absent(self).await? {
            Ok(Outcome::Initialized { path })
        } else {
            Ok(Outcome::AlreadyInitialized { path })
        }
    }

    fn take_warnings(&mut self) -> Vec<String> {
        RecordCache::take_warnings(self)
    }
}

#[cfg(test)]
mod tests {
    use marks_core::{
        bookmarks::Bookmark,
        storage::{EncryptedStore, InMemoryProvider},
    };

    use super::*;

    fn api() -> impl BookmarkApi {
        RecordCache::new(EncryptedStore::new(
            "/tmp/marks-api-test.enc",
            InMemoryProvider::new(),
        ))
    }

    #[tokio::test]
    async fn add_list_delete_scenario() {
        let mut api = api();

        api.add_bookmark("https://a.com", Some(String::new()))
            .await
            .expect("add a");
        api.add_bookmark("https://b.com", Some("notes".into()))
            .await
            .expect("add b");
        assert_eq!(
            api.list_bookmarks().await.expect("list"),
            vec![
                Bookmark::new("https://a.com", None),
                Bookmark::new("https://b.com", Some("notes".into())),
            ]
        );

        let outcome = api.delete_bookmark("https://a.com").await.expect("delete");
        assert_eq!(outcome.to_string(), "Deleted https://a.com");
        assert_eq!(
            api.find_for_selection().await.expect("urls"),
            vec!["https://b.com".to_string()]
        );
    }

    #[tokio::test]
    async fn added_outcome_names_the_stored_url() {
        let mut api = api();
        let outcome = api
            .add_bookmark(" https://a.com ", None)
            .await
            .expect("add");
        assert_eq!(outcome.to_string(), "Added https://a.com");
        assert_eq!(
            api.find_for_selection().await.expect("urls"),
            vec!["https://a.com".to_string()]
        );
    }

    #[tokio::test]
    async fn initialize_twice_reports_existing_store() {
        let mut api = api();
        assert!(matches!(
            api.initialize_if_absent().await,
            Ok(Outcome::Initialized { .. })
        ));
        assert!(matches!(
            api.initialize_if_absent().await,
            Ok(Outcome::AlreadyInitialized { .. })
        ));
        assert_eq!(api.reload(), Outcome::Reloaded);
        assert!(api.list_bookmarks().await.expect("list").is_empty());
    }

    #[test]
    fn outcome_messages_are_single_lines() {
        let outcomes = [
            Outcome::Added { url: "u".into() },
            Outcome::Edited { url: "u".into() },
            Outcome::Initialized { path: "p".into() },
        ];
        for outcome in outcomes {
            assert!(!outcome.to_string().contains('\n'));
        }
    }
}
