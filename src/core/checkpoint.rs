//! Dedup checkpoint persisted between runs.
//!
//! The checkpoint is a single JSON object holding the marker of the last
//! announced track:
//!
//! ```json
//! {"last_uts": "1700000000"}
//! ```
//!
//! Saves go through a temporary file in the same directory that is then
//! renamed over the target, so a crash mid-write keeps the previous file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur reading or writing the checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error on checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed checkpoint {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode checkpoint: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Marker of the last announced track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "last_uts", default)]
    pub last_marker: String,
}

impl Checkpoint {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            last_marker: marker.into(),
        }
    }

    /// True when nothing has been announced yet
    pub fn is_empty(&self) -> bool {
        self.last_marker.is_empty()
    }
}

/// File-backed checkpoint store
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint. `Ok(None)` means the file does not exist.
    pub fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| CheckpointError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    /// Startup load: any problem is logged and yields an empty checkpoint
    pub fn load_or_default(&self) -> Checkpoint {
        match self.load() {
            Ok(Some(checkpoint)) => {
                info!(
                    path = %self.path.display(),
                    marker = %checkpoint.last_marker,
                    "Loaded checkpoint"
                );
                checkpoint
            }
            Ok(None) => {
                info!(path = %self.path.display(), "No checkpoint yet, starting fresh");
                Checkpoint::default()
            }
            Err(e) => {
                warn!("{}; starting with an empty checkpoint", e);
                Checkpoint::default()
            }
        }
    }

    /// Write the checkpoint with write-then-replace
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let io_err = |source: io::Error| CheckpointError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let json = serde_json::to_string(checkpoint).map_err(CheckpointError::Encode)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        writeln!(tmp, "{}", json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        Ok(())
    }
}
