//! Adapter interfaces for external systems.
//!
//! Adapters wrap the two remote services the bridge talks to:
//! - Last.fm: source of the most recent scrobble
//! - Mastodon: target account for announcements
//!
//! The loop only sees the traits below, so tests can swap in fakes.

pub mod lastfm;
pub mod mastodon;

use std::time::Duration;

use async_trait::async_trait;

use crate::core::artwork::{Artwork, ArtworkError};
use crate::core::Cancellation;
use crate::domain::{Announcement, MediaAttachment, PublishedReceipt, TrackRecord};

// Re-export the concrete adapters
pub use lastfm::{FetchError, LastFmClient};
pub use mastodon::{MastodonClient, PublishError};

/// User agent sent on every outbound request
pub const USER_AGENT: &str = concat!("mastofm/", env!("CARGO_PKG_VERSION"));

/// Upper bound for a single HTTP request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by all adapters
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

/// Source of play events
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Fetch the most recent play
    async fn fetch_latest(&self, cancel: &Cancellation) -> Result<TrackRecord, FetchError>;
}

/// Downloads cover images
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str, cancel: &Cancellation) -> Result<Artwork, ArtworkError>;
}

/// Target account that receives announcements
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Human-readable target name
    fn name(&self) -> &str;

    /// Upload an image so it can be attached to a post
    async fn upload_media(
        &self,
        artwork: &Artwork,
        description: &str,
        cancel: &Cancellation,
    ) -> Result<MediaAttachment, PublishError>;

    /// Submit a post
    async fn post_status(
        &self,
        announcement: &Announcement,
        cancel: &Cancellation,
    ) -> Result<PublishedReceipt, PublishError>;
}
