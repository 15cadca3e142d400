//! Domain types for the bridge.
//!
//! This module contains the core data structures:
//! - TrackRecord: The latest play event fetched from Last.fm
//! - Announcement: The post built for a new track

pub mod announcement;
pub mod track;

// Re-export commonly used types
pub use announcement::{
    announcement_key, format_announcement, Announcement, MediaAttachment, PublishedReceipt,
    UNKNOWN_ALBUM,
};
pub use track::{ImageCandidate, TrackRecord};
