//! The poll/dedup/publish loop.
//!
//! Each tick runs one straight-line sequence:
//!
//! ```text
//! fetch → is_new? → [artwork] → format → publish → save checkpoint
//! ```
//!
//! Every step returns an explicit result. A failed step is logged and only
//! the steps that depend on its value are skipped. Nothing here is fatal to
//! the process; the next tick is the only retry.

use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use super::artwork::{cover_description, ArtworkError, ArtworkResolver};
use super::cancel::Cancellation;
use super::checkpoint::{Checkpoint, CheckpointStore};
use super::novelty::is_new;
use crate::adapters::{FetchError, PublishError, Publisher, TrackSource};
use crate::domain::{Announcement, MediaAttachment, PublishedReceipt, TrackRecord};

/// Shortest period `run` will tick at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Longest period `run` will tick at
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Loop behaviour that does not depend on remote services
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Time between ticks
    pub poll_interval: Duration,

    /// Upload the album cover with each post
    pub attach_artwork: bool,

    /// Skip every call to the target account
    pub dry_run: bool,

    /// Source account name (used for idempotency keys)
    pub username: String,
}

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Between ticks
    Waiting,
    /// Running a tick
    Ticking,
    /// Cancelled; no more ticks will run
    Stopped,
}

/// How the publish step ended
#[derive(Debug)]
pub enum PublishStatus {
    /// Posted; the receipt came back from the server
    Posted(PublishedReceipt),
    /// Dry run; nothing was sent
    Skipped,
    /// Submission failed (checkpoint still advanced)
    Failed(PublishError),
}

/// Result of one tick
#[derive(Debug)]
pub enum TickOutcome {
    /// Fetch failed; nothing else ran
    FetchFailed(FetchError),

    /// Latest track was already announced (or is still playing)
    Unchanged { marker: String },

    /// A new track went through the publish path
    Announced {
        track: TrackRecord,
        announcement: Announcement,
        publish: PublishStatus,
        checkpoint_saved: bool,
    },

    /// Cancellation arrived before publishing began
    Cancelled,
}

/// The bridge: owns the checkpoint and sequences every component
pub struct Bridge {
    source: Box<dyn TrackSource>,
    publisher: Box<dyn Publisher>,
    artwork: ArtworkResolver,
    store: CheckpointStore,
    checkpoint: Checkpoint,
    settings: BridgeSettings,
    state: BridgeState,
}

impl Bridge {
    /// Create a bridge starting from an already loaded checkpoint
    pub fn new(
        source: Box<dyn TrackSource>,
        publisher: Box<dyn Publisher>,
        artwork: ArtworkResolver,
        store: CheckpointStore,
        checkpoint: Checkpoint,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            source,
            publisher,
            artwork,
            store,
            checkpoint,
            settings,
            state: BridgeState::Waiting,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Tick on a fixed interval until cancelled.
    ///
    /// The first tick fires one interval after start. Ticks never overlap;
    /// a slow tick pushes the next one back instead of queueing a burst.
    pub async fn run(&mut self, cancel: &Cancellation) {
        // interval_at panics on a zero period or a deadline past Instant's range
        let period = self
            .settings
            .poll_interval
            .clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        if period != self.settings.poll_interval {
            warn!(
                requested = ?self.settings.poll_interval,
                used = ?period,
                "Poll interval out of range, clamping"
            );
        }
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = period.as_secs(),
            dry_run = self.settings.dry_run,
            attach_artwork = self.settings.attach_artwork,
            source = self.source.name(),
            target = self.publisher.name(),
            "Bridge started"
        );

        loop {
            self.state = BridgeState::Waiting;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick(cancel).await {
                TickOutcome::Cancelled => break,
                outcome => debug!(?outcome, "Tick finished"),
            }

            if cancel.is_cancelled() {
                break;
            }
        }

        self.state = BridgeState::Stopped;
        info!("Bridge stopped");
    }

    /// Run one fetch → detect → enrich → publish → persist sequence
    #[instrument(skip(self, cancel))]
    pub async fn tick(&mut self, cancel: &Cancellation) -> TickOutcome {
        self.state = BridgeState::Ticking;
        let outcome = self.tick_inner(cancel).await;
        self.state = if cancel.is_cancelled() {
            BridgeState::Stopped
        } else {
            BridgeState::Waiting
        };
        outcome
    }

    async fn tick_inner(&mut self, cancel: &Cancellation) -> TickOutcome {
        // Fetch
        let track = match self.source.fetch_latest(cancel).await {
            Ok(track) => track,
            Err(FetchError::Cancelled) => return TickOutcome::Cancelled,
            Err(e) => {
                warn!("Error getting most recent track: {}", e);
                return TickOutcome::FetchFailed(e);
            }
        };

        // Detect
        if !is_new(Some(&track), &self.checkpoint) {
            debug!(marker = %track.marker, "No new track");
            return TickOutcome::Unchanged {
                marker: track.marker,
            };
        }

        info!(
            artist = %track.artist,
            track = %track.name,
            played_at = ?track.played_at(),
            "New track"
        );

        // Enrich
        let media = if self.settings.attach_artwork {
            self.attach_artwork(&track, cancel).await
        } else {
            None
        };

        if cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }

        let mut announcement = Announcement::for_track(&track, &self.settings.username);
        if let Some(media) = media {
            announcement = announcement.with_media(media);
        }

        // Publish
        let publish = if self.settings.dry_run {
            info!(text = %announcement.text, "Dry run, not posting");
            PublishStatus::Skipped
        } else {
            match self.publisher.post_status(&announcement, cancel).await {
                Ok(receipt) => {
                    info!(
                        id = %receipt.id,
                        url = receipt.url.as_deref().unwrap_or(""),
                        "Posted"
                    );
                    PublishStatus::Posted(receipt)
                }
                Err(PublishError::Cancelled) => {
                    warn!("Cancelled while posting; marking track as announced");
                    PublishStatus::Failed(PublishError::Cancelled)
                }
                Err(e) => {
                    error!("Error posting to {}: {}", self.publisher.name(), e);
                    PublishStatus::Failed(e)
                }
            }
        };

        // Persist
        let checkpoint_saved = self.advance_checkpoint(&track.marker);

        TickOutcome::Announced {
            track,
            announcement,
            publish,
            checkpoint_saved,
        }
    }

    /// Download and upload the cover. Any failure yields `None`.
    async fn attach_artwork(
        &self,
        track: &TrackRecord,
        cancel: &Cancellation,
    ) -> Option<MediaAttachment> {
        let artwork = match self.artwork.resolve(track, cancel).await {
            Ok(artwork) => artwork,
            Err(ArtworkError::NoImage) => {
                debug!("No cover art listed, posting text only");
                return None;
            }
            Err(e) => {
                warn!("Cover art unavailable, posting text only: {}", e);
                return None;
            }
        };

        if self.settings.dry_run {
            info!(bytes = artwork.bytes.len(), "Dry run, not uploading cover art");
            return None;
        }

        let description = cover_description(track);
        match self
            .publisher
            .upload_media(&artwork, &description, cancel)
            .await
        {
            Ok(media) => Some(media),
            Err(e) => {
                warn!(
                    "Cover art upload failed, posting text only: {}",
                    ArtworkError::from(e)
                );
                None
            }
        }
    }

    /// Move the checkpoint to `marker` and persist it.
    ///
    /// The in-memory checkpoint advances even if the write fails.
    fn advance_checkpoint(&mut self, marker: &str) -> bool {
        self.checkpoint = Checkpoint::new(marker);

        match self.store.save(&self.checkpoint) {
            Ok(()) => {
                debug!(%marker, path = %self.store.path().display(), "Checkpoint saved");
                true
            }
            Err(e) => {
                error!("Error when saving checkpoint: {}", e);
                false
            }
        }
    }
}
