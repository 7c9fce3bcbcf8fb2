//! OffsetManager - per-track signed timeline offsets
//!
//! Offsets are unbounded and stored unconditionally; only non-finite input
//! is rejected (the previous value is retained). Editing the offset of a
//! playing track re-aligns it against the other playing tracks without
//! touching its play state.

use crate::types::{Seconds, StemKey};

use super::registry::TrackRegistry;
use super::sync;

pub(crate) struct OffsetManager;

impl OffsetManager {
    /// Store a new offset for `key`
    ///
    /// If the track is playing and at least one other track is playing, the
    /// track's source is sought to its new aligned position, anchored on
    /// the other playing tracks. A track playing alone keeps its position:
    /// it remains its own anchor.
    pub(crate) fn set_offset(&self, registry: &mut TrackRegistry, key: StemKey, value: Seconds) {
        if !value.is_finite() {
            log::warn!("set_offset({key}): non-finite value {value}, keeping previous");
            return;
        }
        let Some(track) = registry.get_mut(key) else {
            log::debug!("set_offset({key}): not registered, ignoring");
            return;
        };
        track.offset = value;

        if !track.is_playing() {
            return;
        }
        let Some(duration) = track.duration else {
            return;
        };

        let aligned = sync::pick_anchor(registry, key)
            .and_then(|anchor| sync::project_time_from(registry, anchor))
            .map(|pt| sync::target_position(pt, value, duration));

        if let Some(position) = aligned {
            let Some(track) = registry.get_mut(key) else {
                return;
            };
            track.source.set_position(position);
            track.position = position;
            log::debug!("set_offset({key}): re-aligned to {position:.3}s");
        }
    }

    /// Shift the current offset by `delta` (the UI's +/- nudge buttons)
    pub(crate) fn nudge_offset(&self, registry: &mut TrackRegistry, key: StemKey, delta: Seconds) {
        let Some(current) = registry.get(key).map(|t| t.offset) else {
            return;
        };
        self.set_offset(registry, key, current + delta);
    }
}
