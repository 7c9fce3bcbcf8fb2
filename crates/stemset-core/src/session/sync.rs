//! SyncEngine - the timeline alignment math
//!
//! Pure functions over the current position/offset snapshot of the tracks.
//! Alignment is exact only at trigger points (play, seek, offset edit);
//! between triggers each source's clock runs free and positions drift,
//! which is accepted behavior rather than something to correct.

use crate::types::{Seconds, StemKey};

use super::registry::TrackRegistry;

/// Offset-normalized timeline coordinate shared by all tracks
///
/// For an anchor at source position `p` with offset `o`, project time is
/// `p - o`.
#[inline]
pub(crate) fn project_time(position: Seconds, offset: Seconds) -> Seconds {
    position - offset
}

/// Source position a track must take to sit at `project_time`
///
/// Clamped into `[0, duration]`; an offset that would put the track before
/// its start or past its end pins it to the boundary.
#[inline]
pub(crate) fn target_position(
    project_time: Seconds,
    offset: Seconds,
    duration: Seconds,
) -> Seconds {
    (project_time + offset).clamp(0.0, duration.max(0.0))
}

/// Pick the anchor among currently-playing tracks, excluding `exclude`
///
/// Deterministic tie-break: the first playing track in `StemKey::ALL`
/// declaration order wins. Returns `None` when no other track is playing,
/// in which case the triggering track stays its own anchor.
pub(crate) fn pick_anchor(registry: &TrackRegistry, exclude: StemKey) -> Option<StemKey> {
    registry.playing_keys().find(|key| *key != exclude)
}

/// Project time read from the anchor's live source position
pub(crate) fn project_time_from(registry: &TrackRegistry, anchor: StemKey) -> Option<Seconds> {
    let track = registry.get(anchor)?;
    Some(project_time(track.source.position(), track.offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_time_normalizes_offset() {
        assert_eq!(project_time(10.0, 0.0), 10.0);
        assert_eq!(project_time(10.0, 2.5), 7.5);
        assert_eq!(project_time(10.0, -1.5), 11.5);
    }

    #[test]
    fn test_target_position_applies_offset_and_clamps() {
        // Concrete scenario: anchor at 10s with zero offset, target offset -1.5
        assert_eq!(target_position(10.0, -1.5, 180.0), 8.5);
        // Clamped at the start
        assert_eq!(target_position(0.5, -2.0, 180.0), 0.0);
        // Clamped at the end
        assert_eq!(target_position(179.0, 5.0, 180.0), 180.0);
    }

    #[test]
    fn test_alignment_roundtrip() {
        // A track aligned to project time and read back as an anchor
        // reproduces the same project time.
        let pt = project_time(42.0, 3.0);
        let aligned = target_position(pt, -1.0, 300.0);
        assert_eq!(project_time(aligned, -1.0), pt);
    }
}
