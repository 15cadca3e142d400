//! Play events fetched from the scrobbling service.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One cover image offered for a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    /// Image URL (may be empty when the service has no art)
    pub url: String,

    /// Coarse size label ("small", "medium", "large", ...)
    pub size: String,
}

impl ImageCandidate {
    pub fn new(url: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            size: size.into(),
        }
    }
}

/// The most recent play event for a user.
///
/// The `marker` is an opaque recency token. It is compared only for
/// equality against the checkpoint and never parsed for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Track title
    pub name: String,

    /// Artist display name
    pub artist: String,

    /// Album display name, if the service knows it
    pub album: Option<String>,

    /// Cover candidates in the order the service listed them
    pub images: Vec<ImageCandidate>,

    /// Opaque recency marker (empty for a track that is still playing)
    pub marker: String,
}

impl TrackRecord {
    /// Create a record with no album and no images
    pub fn new(
        artist: impl Into<String>,
        name: impl Into<String>,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
            album: None,
            images: Vec::new(),
            marker: marker.into(),
        }
    }

    /// Set the album; an empty name counts as unknown
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        let album = album.into();
        self.album = if album.is_empty() { None } else { Some(album) };
        self
    }

    /// Append an image candidate
    pub fn with_image(mut self, url: impl Into<String>, size: impl Into<String>) -> Self {
        self.images.push(ImageCandidate::new(url, size));
        self
    }

    /// Play time for display, when the marker is a Unix timestamp.
    ///
    /// Only used for logging. Novelty never looks at this.
    pub fn played_at(&self) -> Option<DateTime<Utc>> {
        let secs: i64 = self.marker.parse().ok()?;
        Utc.timestamp_opt(secs, 0).single()
    }
}
