use color_eyre::Result;
use marks_cache::{BookmarkApi, CacheError};
use marks_core::bookmarks::Collection;

use crate::cli::{join_description, BookmarkCommand};

/// Execute a bookmark subcommand and return the text to print.
/// Recoverable failures become their message; a store that cannot be
/// decrypted is returned as an error.
pub async fn run<A: BookmarkApi>(cmd: BookmarkCommand, api: &mut A) -> Result<String> {
    let result = match cmd {
        BookmarkCommand::Init => api.initialize_if_absent().await.map(|o| o.to_string()),
        BookmarkCommand::Add { url, description } => api
            .add_bookmark(&url, join_description(description))
            .await
            .map(|o| o.to_string()),
        BookmarkCommand::Rm { url } => api.delete_bookmark(&url).await.map(|o| o.to_string()),
        BookmarkCommand::Edit { url, description } => api
            .edit_description(&url, join_description(description))
            .await
            .map(|o| o.to_string()),
        BookmarkCommand::List => api.list_bookmarks().await.map(|c| render_list(&c)),
        BookmarkCommand::Urls => api.find_for_selection().await.map(|urls| urls.join("\n")),
        BookmarkCommand::Reload => Ok(api.reload().to_string()),
    };

    report(result)
}

/// Map a cache result to printable text, keeping only decryption failures fatal.
pub fn report(result: Result<String, CacheError>) -> Result<String> {
    match result {
        Ok(message) => Ok(message),
        Err(err) if err.is_fatal() => Err(color_eyre::eyre::eyre!(err)),
        Err(err) => Ok(err.to_string()),
    }
}

fn render_list(collection: &Collection) -> String {
    if collection.is_empty() {
        return "No bookmarks yet. Add one with `marks add <url> [description]`.".to_string();
    }

    let mut out = Vec::with_capacity(collection.len());
    for (idx, bookmark) in collection.iter().enumerate() {
        let mut entry = format!("{:>3}. {}", idx + 1, bookmark.url);
        if let Some(desc) = bookmark.description() {
            entry.push_str(&format!("\n     {desc}"));
        }
        out.push(entry);
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use marks_cache::RecordCache;
    use marks_core::storage::{EncryptedStore, InMemoryProvider, StoreError};

    fn api(provider: &InMemoryProvider) -> RecordCache<InMemoryProvider> {
        RecordCache::new(EncryptedStore::new("/tmp/marks-cli.enc", provider.clone()))
    }

    #[tokio::test]
    async fn add_then_list_renders_in_order() {
        let provider = InMemoryProvider::new();
        let mut api = api(&provider);

        let added = run(
            BookmarkCommand::Add {
                url: "https://a.com".into(),
                description: vec![],
            },
            &mut api,
        )
        .await
        .expect("add");
        assert_eq!(added, "Added https://a.com");

        run(
            BookmarkCommand::Add {
                url: "https://b.com".into(),
                description: vec!["notes".into()],
            },
            &mut api,
        )
        .await
        .expect("add");

        let listed = run(BookmarkCommand::List, &mut api).await.expect("list");
        assert_eq!(
            listed,
            "  1. https://a.com\n  2. https://b.com\n     notes"
        );
    }

    #[tokio::test]
    async fn recoverable_errors_become_messages() {
        let provider = InMemoryProvider::new();
        let mut api = api(&provider);

        let message = run(
            BookmarkCommand::Rm {
                url: "https://missing".into(),
            },
            &mut api,
        )
        .await
        .expect("not fatal");
        assert_eq!(message, "no bookmark for https://missing");
    }

    #[tokio::test]
    async fn empty_list_has_a_hint() {
        let provider = InMemoryProvider::new();
        let mut api = api(&provider);
        let listed = run(BookmarkCommand::List, &mut api).await.expect("list");
        assert!(listed.starts_with("No bookmarks yet"));
    }

    #[test]
    fn decryption_failure_is_fatal() {
        let err = CacheError::Store(StoreError::DecryptionFailed {
            reason: "bad key".into(),
        });
        assert!(report(Err(err)).is_err());

        let write = CacheError::Store(StoreError::Write {
            reason: "disk full".into(),
        });
        assert!(report(Err(write)).expect("not fatal").contains("disk full"));
    }
}
