//! Announcements posted for a newly played track.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::track::TrackRecord;

/// Album line text when the service has no album for a track
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Media already uploaded to the target account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Server-assigned media ID
    pub id: String,
}

/// A post ready to submit. Built per tick and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Formatted status text
    pub text: String,

    /// Attached cover, if one was uploaded
    pub media: Option<MediaAttachment>,

    /// Dedup key sent with the post
    pub idempotency_key: String,
}

impl Announcement {
    /// Build a text-only announcement for a track
    pub fn for_track(track: &TrackRecord, username: &str) -> Self {
        Self {
            text: format_announcement(track),
            media: None,
            idempotency_key: announcement_key(username, &track.marker),
        }
    }

    /// Attach uploaded media
    pub fn with_media(mut self, media: MediaAttachment) -> Self {
        self.media = Some(media);
        self
    }

    /// IDs of attached media, in submission order
    pub fn media_ids(&self) -> Vec<String> {
        self.media.iter().map(|m| m.id.clone()).collect()
    }
}

/// What the target service returned for a submitted post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedReceipt {
    pub id: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub content: String,
}

/// Render the announcement text.
///
/// Output is a fixed three-line template. The album line starts with a
/// single space before the disc.
pub fn format_announcement(track: &TrackRecord) -> String {
    let album = track
        .album
        .as_deref()
        .filter(|a| !a.is_empty())
        .unwrap_or(UNKNOWN_ALBUM);

    format!(
        "🎵 Now listening\n{} - {}\n 📀 {}",
        track.artist, track.name, album
    )
}

/// Idempotency key for one announcement (first 16 hex chars of SHA256)
pub fn announcement_key(username: &str, marker: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(b":");
    hasher.update(marker.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_album() {
        let track = TrackRecord::new("Boards of Canada", "Roygbiv", "1")
            .with_album("Music Has the Right to Children");

        assert_eq!(
            format_announcement(&track),
            "🎵 Now listening\nBoards of Canada - Roygbiv\n 📀 Music Has the Right to Children"
        );
    }

    #[test]
    fn test_format_without_album() {
        let track = TrackRecord::new("A", "T", "200");
        let text = format_announcement(&track);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "🎵 Now listening");
        assert_eq!(lines[1], "A - T");
        assert_eq!(lines[2], " 📀 Unknown Album");
    }

    #[test]
    fn test_announcement_key_stable_per_marker() {
        let a = announcement_key("rj", "1700000000");
        let b = announcement_key("rj", "1700000000");
        let c = announcement_key("rj", "1700000001");
        let d = announcement_key("other", "1700000000");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_media_ids() {
        let track = TrackRecord::new("A", "T", "1");
        let announcement = Announcement::for_track(&track, "rj");
        assert!(announcement.media_ids().is_empty());

        let announcement = announcement.with_media(MediaAttachment {
            id: "42".to_string(),
        });
        assert_eq!(announcement.media_ids(), vec!["42".to_string()]);
    }
}
