//! Configuration for the bridge.
//!
//! Configuration sources (highest priority first):
//! 1. CLI flags (`--dry-run`)
//! 2. Config file (JSON, default `config.json` in the working directory)
//!
//! The config is loaded once at startup and never changes afterwards.
//! Any problem with it is fatal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::mastodon::MastodonConfig;
use crate::core::{BridgeSettings, MAX_POLL_INTERVAL};

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default checkpoint file name
pub const DEFAULT_CHECKPOINT_FILE: &str = "persist.json";

/// Errors that can occur loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config JSON {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Config file schema (matches the JSON keys)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Mastodon instance base URL
    #[serde(default)]
    pub mastodon_server: String,

    /// Mastodon application client ID
    #[serde(default)]
    pub mastodon_client_id: String,

    /// Mastodon application client secret
    #[serde(default)]
    pub mastodon_secret: String,

    /// Mastodon user access token
    #[serde(default)]
    pub mastodon_token: String,

    /// Last.fm user to follow
    pub lfm_username: String,

    /// Last.fm API key
    pub lfm_api_key: String,

    /// Seconds between polls
    #[serde(rename = "poll_rate")]
    pub poll_rate_seconds: u64,

    /// Attach album covers to posts
    #[serde(default)]
    pub attach_artwork: bool,

    /// Dry run: never post
    #[serde(default)]
    pub test_mode: bool,
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file without validating it, so overrides can be
    /// applied first
    pub fn load_unvalidated(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse config JSON without validating it
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reject configs the bridge cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lfm_username.trim().is_empty() {
            return Err(ConfigError::Invalid("lfm_username is empty".to_string()));
        }
        if self.lfm_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("lfm_api_key is empty".to_string()));
        }
        if self.poll_rate_seconds == 0 {
            return Err(ConfigError::Invalid("poll_rate must be at least 1".to_string()));
        }
        if self.poll_rate_seconds > MAX_POLL_INTERVAL.as_secs() {
            return Err(ConfigError::Invalid(format!(
                "poll_rate must be at most {}",
                MAX_POLL_INTERVAL.as_secs()
            )));
        }

        // Test mode never talks to Mastodon
        if !self.test_mode {
            if self.mastodon_server.trim().is_empty() {
                return Err(ConfigError::Invalid("mastodon_server is empty".to_string()));
            }
            if self.mastodon_token.trim().is_empty() {
                return Err(ConfigError::Invalid("mastodon_token is empty".to_string()));
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_rate_seconds)
    }

    /// Mastodon credentials
    pub fn mastodon(&self) -> MastodonConfig {
        MastodonConfig {
            server: self.mastodon_server.clone(),
            client_id: self.mastodon_client_id.clone(),
            client_secret: self.mastodon_secret.clone(),
            access_token: self.mastodon_token.clone(),
        }
    }

    /// Loop settings
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            poll_interval: self.poll_interval(),
            attach_artwork: self.attach_artwork,
            dry_run: self.test_mode,
            username: self.lfm_username.clone(),
        }
    }
}
