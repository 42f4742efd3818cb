use std::path::{Path, PathBuf};

use crate::config::Config;
use color_eyre::Result;
use dirs::home_dir;
use marks_cache::RecordCache;
use marks_core::storage::EncryptedStore;
use marks_storage::{
    file_provider::AesGcmFileProvider,
    key_provider::{KeyProvider, KeyringProvider, StaticKeyProvider},
};
use tracing::debug;

pub type Provider = AesGcmFileProvider<Box<dyn KeyProvider>>;

const DEFAULT_STORE_FILE: &str = ".marks.enc";

/// Resolve the default store file in the user's home directory.
pub fn default_store_path() -> Result<PathBuf> {
    let home = home_dir().ok_or_else(|| color_eyre::eyre::eyre!("no home dir available"))?;
    Ok(home.join(DEFAULT_STORE_FILE))
}

/// CLI flag wins over config, config over the default.
pub fn resolve_store_path(config: &Config, flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = &config.store_path {
        return Ok(path.clone());
    }
    default_store_path()
}

/// `MARKS_KEY` when set, otherwise the OS keychain entry from config.
pub fn key_provider(config: &Config) -> Result<Box<dyn KeyProvider>> {
    if let Some(provider) =
        StaticKeyProvider::from_env().map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?
    {
        debug!("using data key from environment");
        return Ok(Box::new(provider));
    }

    debug!(
        service = config.keyring_service(),
        account = config.keyring_account(),
        "using data key from keychain"
    );
    Ok(Box::new(KeyringProvider::new(
        config.keyring_service(),
        config.keyring_account(),
    )))
}

/// Build the process-wide bookmark cache from config overrides.
pub fn cache_from_config(config: &Config, flag: Option<&Path>) -> Result<RecordCache<Provider>> {
    let path = resolve_store_path(config, flag)?;
    debug!(?path, "initializing encrypted store");
    let provider = AesGcmFileProvider::new(key_provider(config)?);
    Ok(RecordCache::new(EncryptedStore::new(path, provider)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_overrides_config_path() {
        let cfg = Config {
            store_path: Some(PathBuf::from("/tmp/from-config.enc")),
            ..Config::default()
        };
        let resolved =
            resolve_store_path(&cfg, Some(Path::new("/tmp/from-flag.enc"))).expect("resolve");
        assert_eq!(resolved, PathBuf::from("/tmp/from-flag.enc"));

        let resolved = resolve_store_path(&cfg, None).expect("resolve");
        assert_eq!(resolved, PathBuf::from("/tmp/from-config.enc"));
    }

    #[test]
    fn default_store_is_a_dotfile() {
        if let Ok(path) = default_store_path() {
            assert_eq!(
                path.file_name().and_then(|n| n.to_str()),
                Some(".marks.enc")
            );
        }
    }
}
