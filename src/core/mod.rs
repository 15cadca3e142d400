//! Core bridge logic.
//!
//! This module contains:
//! - Checkpoint: Persisted dedup marker
//! - Novelty: The "is this track new" predicate
//! - Artwork: Cover selection and download
//! - Cancel: Shared cancellation signal
//! - Bridge: The poll/dedup/publish loop

pub mod artwork;
pub mod bridge;
pub mod cancel;
pub mod checkpoint;
pub mod novelty;

// Re-export commonly used types
pub use artwork::{
    select_best_image, Artwork, ArtworkError, ArtworkResolver, HttpImageFetcher, ImageSize,
};
pub use bridge::{
    Bridge, BridgeSettings, BridgeState, PublishStatus, TickOutcome, MAX_POLL_INTERVAL,
    MIN_POLL_INTERVAL,
};
pub use cancel::Cancellation;
pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
pub use novelty::is_new;
