//! TransportController - per-track play/pause state machine
//!
//! Tracks move `Stopped -> Playing -> Stopped`, with `Stopped` also reached
//! when the source reports its natural end. Tracks are deliberately not
//! coupled on pause or end: stems have different durations and the user may
//! keep listening to some while stopping another.

use crate::types::{PlayState, Seconds, StemKey};

use super::registry::TrackRegistry;
use super::sync;

pub(crate) struct TransportController;

impl TransportController {
    /// Start playback of `key`, aligned to the current anchor if any
    ///
    /// No-op for unregistered keys and for tracks still awaiting metadata.
    /// When at least one other track is playing, the starting track is
    /// first sought to the anchor's project time.
    pub(crate) fn play(&self, registry: &mut TrackRegistry, key: StemKey) {
        let Some(track) = registry.get(key) else {
            log::debug!("play({key}): not registered, ignoring");
            return;
        };
        let Some(duration) = track.duration else {
            log::debug!("play({key}): metadata not loaded yet, ignoring");
            return;
        };
        if track.is_playing() {
            return;
        }
        let offset = track.offset;

        let aligned = sync::pick_anchor(registry, key)
            .and_then(|anchor| sync::project_time_from(registry, anchor))
            .map(|pt| sync::target_position(pt, offset, duration));

        let Some(track) = registry.get_mut(key) else {
            return;
        };
        if let Some(position) = aligned {
            track.source.set_position(position);
            track.position = position;
        }
        track.source.play();
        track.state = PlayState::Playing;
        match aligned {
            Some(p) => log::debug!("play({key}): started at {p:.3}s"),
            None => log::debug!("play({key}): started"),
        }
    }

    /// Pause `key` only; other tracks keep playing
    ///
    /// Idempotent: pausing a stopped or unregistered track changes nothing.
    pub(crate) fn pause(&self, registry: &mut TrackRegistry, key: StemKey) {
        let Some(track) = registry.get_mut(key) else {
            return;
        };
        track.source.pause();
        track.state = PlayState::Stopped;
    }

    /// Start every registered track, each aligning to the running anchor
    pub(crate) fn play_all(&self, registry: &mut TrackRegistry) {
        for key in StemKey::ALL {
            self.play(registry, key);
        }
    }

    /// Pause every registered track
    pub(crate) fn pause_all(&self, registry: &mut TrackRegistry) {
        for key in StemKey::ALL {
            self.pause(registry, key);
        }
    }

    /// Seek `key` to `t`, clamped into `[0, duration]`
    ///
    /// If `key` is playing it becomes the new anchor: every other playing
    /// track is repositioned to the seeked track's project time. Stopped
    /// tracks are left untouched.
    pub(crate) fn seek(&self, registry: &mut TrackRegistry, key: StemKey, t: Seconds) {
        if !t.is_finite() {
            log::warn!("seek({key}): non-finite target {t}, ignoring");
            return;
        }
        let Some(track) = registry.get(key) else {
            log::debug!("seek({key}): not registered, ignoring");
            return;
        };
        let Some(duration) = track.duration else {
            log::debug!("seek({key}): metadata not loaded yet, ignoring");
            return;
        };
        let clamped = t.clamp(0.0, duration);
        let was_playing = track.is_playing();
        let offset = track.offset;

        let Some(track) = registry.get_mut(key) else {
            return;
        };
        track.source.set_position(clamped);
        track.position = clamped;

        if !was_playing {
            return;
        }

        // The seeked track is the anchor for everyone else still playing.
        let pt = sync::project_time(clamped, offset);
        for other in StemKey::ALL {
            if other == key {
                continue;
            }
            let Some(track) = registry.get_mut(other) else {
                continue;
            };
            if !track.is_playing() {
                continue;
            }
            let Some(other_duration) = track.duration else {
                continue;
            };
            let aligned = sync::target_position(pt, track.offset, other_duration);
            track.source.set_position(aligned);
            track.position = aligned;
        }
    }

    /// React to a source-reported natural end: stop that track only
    pub(crate) fn on_ended(&self, registry: &mut TrackRegistry, key: StemKey) {
        let Some(track) = registry.get_mut(key) else {
            return;
        };
        track.state = PlayState::Stopped;
        if let Some(duration) = track.duration {
            track.position = duration;
        }
        log::debug!("on_ended({key}): stopped at natural end");
    }
}
