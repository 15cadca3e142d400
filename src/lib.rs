//! mastofm - Announce Last.fm scrobbles on Mastodon
//!
//! A polling bridge: every few seconds it fetches the user's most recent
//! scrobble and, when it differs from the last one announced, posts it to
//! a Mastodon account.
//!
//! # Architecture
//!
//! One loop owns all state:
//! - The checkpoint (last announced marker) is loaded once and saved after
//!   every announcement
//! - Ticks run strictly one after another
//! - Every error is logged and the next tick is the only retry
//!
//! # Modules
//!
//! - `adapters`: External services (Last.fm, Mastodon)
//! - `core`: Loop logic (Bridge, Checkpoint, Novelty, Artwork, Cancellation)
//! - `domain`: Data structures (TrackRecord, Announcement)
//! - `config`: Config file loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run with ./config.json and ./persist.json
//! mastofm
//!
//! # Custom paths, never post
//! mastofm --config /etc/mastofm.json --checkpoint /var/lib/mastofm/persist.json --dry-run
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::config::{Config, ConfigError};
pub use crate::core::{Bridge, BridgeSettings, Cancellation, Checkpoint, CheckpointStore, TickOutcome};
pub use crate::domain::{Announcement, TrackRecord};
