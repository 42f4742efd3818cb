mod cli;
mod commands;
mod config;
mod storage;
mod tui;

use std::{fs, path::Path};

use crate::cli::{Command, ConfigCommand, KeyCommand};
use clap::Parser;
use color_eyre::Result;
use marks_cache::RecordCache;
use marks_core::storage::EncryptionProvider;
use marks_storage::{file_provider::AesGcmFileProvider, key_provider::KeyProvider};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Entry point: the composition root owning the single bookmark cache.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    let store_flag = cli.store.as_deref();
    match cli.command.unwrap_or(Command::Tui) {
        Command::Tui => {
            let mut cache = storage::cache_from_config(&config, store_flag)?;
            let selected = tui::launch(&mut cache).await?;
            finish(cache);
            if let Some(url) = selected {
                println!("{url}");
            }
        }
        Command::Bookmark(cmd) => {
            let mut cache = storage::cache_from_config(&config, store_flag)?;
            let output = commands::run(cmd, &mut cache).await?;
            for warning in cache.take_warnings() {
                eprintln!("warning: {warning}");
            }
            if !output.is_empty() {
                println!("{output}");
            }
            finish(cache);
        }
        Command::Key(KeyCommand::Export) => export_key(&config).await?,
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        Command::Version => print_version(),
        Command::Health => run_health_check(&config, store_flag).await?,
    }

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so `marks urls | picker` stays clean; quiet unless RUST_LOG says otherwise.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn finish<P: EncryptionProvider>(cache: RecordCache<P>) {
    if let Err(err) = cache.shutdown() {
        eprintln!("warning: {err}");
    }
}

fn print_version() {
    println!("marks {}", env!("CARGO_PKG_VERSION"));
}

async fn export_key(config: &config::Config) -> Result<()> {
    let provider = storage::key_provider(config)?;
    let material = provider
        .get()
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    println!("{}", material.export());
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

/// Runs a quick encrypt/decrypt round trip beside the configured store.
async fn run_health_check(config: &config::Config, flag: Option<&Path>) -> Result<()> {
    let store_path = storage::resolve_store_path(config, flag)?;
    let parent = store_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    let provider = AesGcmFileProvider::new(storage::key_provider(config)?);
    run_provider_health(&provider, parent).await?;
    println!("Storage: ok ({})", store_path.display());
    if !store_path.exists() {
        warn!("store file does not exist yet; run `marks init`");
    }
    Ok(())
}

async fn run_provider_health<P: EncryptionProvider>(provider: &P, dir: &Path) -> Result<()> {
    let check_dir = tempfile::Builder::new()
        .prefix(".marks-health")
        .tempdir_in(dir)?;
    let sample = check_dir.path().join("health.enc");
    let payload = b"ok";

    provider
        .encrypt_and_write(&sample, payload)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    let round_trip = provider
        .decrypt(&sample)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;

    if round_trip != payload {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use marks_storage::key_provider::InMemoryKeyProvider;

    #[tokio::test]
    async fn health_check_with_test_provider_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = AesGcmFileProvider::new(InMemoryKeyProvider::default());
        run_provider_health(&provider, dir.path())
            .await
            .expect("health check should succeed");

        let leftovers = fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 0, "health check directory must be cleaned up");
    }
}
