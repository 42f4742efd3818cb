use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

pub const DEFAULT_KEYRING_SERVICE: &str = "marks";
pub const DEFAULT_KEYRING_ACCOUNT: &str = "store-key";

/// User-level configuration loaded from `~/.config/marks/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the encrypted store file (default `~/.marks.enc`).
    pub store_path: Option<PathBuf>,
    /// Keychain service holding the data key.
    pub keyring_service: Option<String>,
    /// Keychain account holding the data key.
    pub keyring_account: Option<String>,
}

impl Config {
    pub fn keyring_service(&self) -> &str {
        self.keyring_service
            .as_deref()
            .unwrap_or(DEFAULT_KEYRING_SERVICE)
    }

    pub fn keyring_account(&self) -> &str {
        self.keyring_account
            .as_deref()
            .unwrap_or(DEFAULT_KEYRING_ACCOUNT)
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("marks").join("config.toml"))
}

/// Write the given config to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_to_path_if_missing(config, &default_path()?)
}

fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.keyring_service(), "marks");
        assert_eq!(cfg.keyring_account(), "store-key");
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            store_path = "/tmp/team-marks.enc"
            keyring_service = "work"
            keyring_account = "bookmarks"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load_from_path(&path).expect("load");
        assert_eq!(
            cfg,
            Config {
                store_path: Some(PathBuf::from("/tmp/team-marks.enc")),
                keyring_service: Some("work".into()),
                keyring_account: Some("bookmarks".into()),
            }
        );
    }

    #[test]
    fn write_default_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            store_path: Some(PathBuf::from("/tmp/marks.enc")),
            ..Config::default()
        };

        write_to_path_if_missing(&cfg, &path).expect("write should succeed");
        let other = Config::default();
        let second = write_to_path_if_missing(&other, &path).expect("second write ok");
        assert_eq!(second, path);
        let loaded = load_from_path(&path).expect("load");
        assert_eq!(loaded, cfg);
    }
}
