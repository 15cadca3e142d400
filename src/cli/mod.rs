//! Command-line interface for mastofm.
//!
//! Loads the config and checkpoint, wires the adapters into a `Bridge`,
//! and runs it until SIGINT/SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use crate::adapters::{http_client, LastFmClient, MastodonClient};
use crate::config::{Config, DEFAULT_CHECKPOINT_FILE, DEFAULT_CONFIG_FILE};
use crate::core::{
    ArtworkResolver, Bridge, Cancellation, CheckpointStore, HttpImageFetcher, TickOutcome,
};

/// mastofm - Announce Last.fm scrobbles on Mastodon
#[derive(Parser, Debug)]
#[command(name = "mastofm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, env = "MASTOFM_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Path to the checkpoint file
    #[arg(short = 'p', long, env = "MASTOFM_CHECKPOINT", default_value = DEFAULT_CHECKPOINT_FILE)]
    pub checkpoint: PathBuf,

    /// Never post, even if the config says otherwise
    #[arg(long)]
    pub dry_run: bool,

    /// Run a single tick immediately and exit
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = self.load_config()?;
        let mut bridge = build_bridge(&config, self.checkpoint)?;

        let cancel = Cancellation::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            trigger.cancel();
        });

        if self.once {
            match bridge.tick(&cancel).await {
                TickOutcome::FetchFailed(e) => warn!("Tick failed: {}", e),
                outcome => info!(?outcome, "Tick finished"),
            }
            return Ok(());
        }

        bridge.run(&cancel).await;
        Ok(())
    }

    /// Load the config file, apply flag overrides, then validate
    pub fn load_config(&self) -> Result<Config> {
        let context = || format!("Could not load config {}", self.config.display());

        let mut config = Config::load_unvalidated(&self.config).with_context(context)?;
        if self.dry_run {
            config.test_mode = true;
        }
        config.validate().with_context(context)?;
        Ok(config)
    }
}

/// Wire config into a ready-to-run bridge
fn build_bridge(config: &Config, checkpoint_path: PathBuf) -> Result<Bridge> {
    let client = http_client().context("Failed to build HTTP client")?;

    let source = LastFmClient::new(
        client.clone(),
        config.lfm_username.clone(),
        config.lfm_api_key.clone(),
    );
    let publisher = MastodonClient::new(client.clone(), config.mastodon());
    let artwork = ArtworkResolver::new(Box::new(HttpImageFetcher::new(client)));

    let store = CheckpointStore::new(checkpoint_path);
    let checkpoint = store.load_or_default();

    Ok(Bridge::new(
        Box::new(source),
        Box::new(publisher),
        artwork,
        store,
        checkpoint,
        config.bridge_settings(),
    ))
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["mastofm"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert_eq!(cli.checkpoint, PathBuf::from("persist.json"));
        assert!(!cli.dry_run);
        assert!(!cli.once);
    }

    #[test]
    fn test_path_overrides() {
        let cli = Cli::try_parse_from([
            "mastofm",
            "--config",
            "/etc/mastofm.json",
            "-p",
            "/var/lib/mastofm/persist.json",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/mastofm.json"));
        assert_eq!(cli.checkpoint, PathBuf::from("/var/lib/mastofm/persist.json"));
        assert!(cli.dry_run);
    }

    #[test]
    fn test_dry_run_needs_no_mastodon_credentials() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"lfm_username": "rj", "lfm_api_key": "k", "poll_rate": 10}"#,
        )
        .unwrap();
        let path = path.to_str().unwrap();

        let cli = Cli::try_parse_from(["mastofm", "--config", path, "--dry-run"]).unwrap();
        let config = cli.load_config().unwrap();
        assert!(config.test_mode);
        assert!(config.bridge_settings().dry_run);

        // Without the flag the same file is rejected
        let cli = Cli::try_parse_from(["mastofm", "--config", path]).unwrap();
        let err = cli.load_config().unwrap_err();
        assert!(format!("{:#}", err).contains("mastodon_server is empty"));
    }

    #[tokio::test]
    async fn test_missing_config_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        let cli = Cli::try_parse_from([
            "mastofm",
            "--config",
            temp.path().join("absent.json").to_str().unwrap(),
        ])
        .unwrap();

        let err = cli.execute().await.unwrap_err();
        assert!(format!("{:#}", err).contains("Config file not found"));
    }
}
