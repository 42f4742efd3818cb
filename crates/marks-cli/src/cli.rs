use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "marks",
    about = "Encrypted bookmarks you can commit anywhere",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Use this encrypted store instead of the configured one.
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Optional subcommand; defaults to launching the TUI when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Browse bookmarks interactively (Enter prints the selected url).
    Tui,
    #[command(flatten)]
    Bookmark(BookmarkCommand),
    /// Manage the data key.
    #[command(subcommand)]
    Key(KeyCommand),
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version and exit.
    Version,
    /// Encrypt and decrypt a sample file next to the store.
    Health,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum BookmarkCommand {
    /// Create an empty store if none exists.
    Init,
    /// Bookmark a url with an optional description.
    Add {
        url: String,
        description: Vec<String>,
    },
    /// Remove a bookmark.
    #[command(visible_alias = "delete")]
    Rm { url: String },
    /// Replace a bookmark's description; omit it to clear.
    Edit {
        url: String,
        description: Vec<String>,
    },
    /// Show all bookmarks in order.
    #[command(visible_alias = "ls")]
    List,
    /// Print one url per line, for piping into a picker.
    Urls,
    /// Discard the cached copy and read the store again.
    Reload,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KeyCommand {
    /// Print the data key as base64, for MARKS_KEY on another machine.
    Export,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

/// Words after the url form the description; none means absent.
pub fn join_description(words: Vec<String>) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}
