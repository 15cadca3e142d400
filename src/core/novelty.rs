//! Decides whether a fetched track still needs announcing.

use crate::domain::TrackRecord;

use super::checkpoint::Checkpoint;

/// True when `track` differs from the last announced one.
///
/// Only equality matters: a marker older than the checkpoint still counts
/// as new if it differs. An empty marker (a track that is still playing)
/// is never new.
pub fn is_new(track: Option<&TrackRecord>, checkpoint: &Checkpoint) -> bool {
    let Some(track) = track else {
        return false;
    };

    if track.marker.is_empty() {
        return false;
    }

    track.marker != checkpoint.last_marker
}
