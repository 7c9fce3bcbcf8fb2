//! TrackRegistry - ownership of the per-stem playable-source handles
//!
//! One handle per stem key at most; registration is idempotent and a failed
//! load permanently marks the key unavailable for the session (no automatic
//! retries). Teardown releases every handle on every exit path.

use crossbeam::channel::Sender;

use crate::error::SourceError;
use crate::provider::StemUrls;
use crate::source::{PlayableSource, SourceFactory, SourceNotice, SourceObserver};
use crate::types::{PlayState, Seconds, StemKey, NUM_STEMS};

/// One stem track: the exclusively-owned source handle plus its mix state
pub(crate) struct Track {
    pub(crate) source: Box<dyn PlayableSource>,
    pub(crate) urls: StemUrls,
    /// Unknown until the source reports loaded metadata
    pub(crate) duration: Option<Seconds>,
    /// Signed timeline shift relative to project time; unbounded
    pub(crate) offset: Seconds,
    /// Stored volume in [0, 1]; survives muting
    pub(crate) volume: f32,
    pub(crate) muted: bool,
    pub(crate) state: PlayState,
    /// Display cache, refreshed by the position clock
    pub(crate) position: Seconds,
}

impl Track {
    pub(crate) fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Effective output gain: muting zeroes the gain without losing volume
    pub(crate) fn effective_gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    pub(crate) fn apply_gain(&mut self) {
        let gain = self.effective_gain();
        self.source.set_volume(gain);
    }
}

/// Owns the set of playable-source handles, one slot per stem key
pub(crate) struct TrackRegistry {
    slots: [Option<Track>; NUM_STEMS],
    /// Last known volume per key, restored when a key is re-registered
    remembered_volume: [f32; NUM_STEMS],
    /// Keys whose source failed to load; commands on them stay no-ops
    failed: [bool; NUM_STEMS],
    notice_tx: Sender<SourceNotice>,
}

impl TrackRegistry {
    pub(crate) fn new(notice_tx: Sender<SourceNotice>) -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            remembered_volume: [1.0; NUM_STEMS],
            failed: [false; NUM_STEMS],
            notice_tx,
        }
    }

    /// Create the handle for `key` exactly once
    ///
    /// Subsequent calls for the same key are no-ops, as are calls for keys
    /// whose load already failed. A load failure marks the key unavailable
    /// and leaves every other track untouched.
    pub(crate) fn register(&mut self, factory: &dyn SourceFactory, key: StemKey, urls: StemUrls) {
        let idx = key.index();
        if self.slots[idx].is_some() || self.failed[idx] {
            log::debug!("register({key}): already registered, ignoring");
            return;
        }

        let mut source = match factory.create(&urls.stream) {
            Ok(source) => source,
            Err(SourceError::Load { url, reason }) => {
                log::warn!("register({key}): load failed for {url}: {reason}");
                self.failed[idx] = true;
                return;
            }
            Err(err) => {
                log::warn!("register({key}): {err}");
                self.failed[idx] = true;
                return;
            }
        };

        source.set_observer(SourceObserver::new(key, self.notice_tx.clone()));
        source.set_volume(self.remembered_volume[idx]);

        self.slots[idx] = Some(Track {
            source,
            urls,
            duration: None,
            offset: 0.0,
            volume: self.remembered_volume[idx],
            muted: false,
            state: PlayState::Stopped,
            position: 0.0,
        });
        log::info!("register({key}): source created");
    }

    pub(crate) fn get(&self, key: StemKey) -> Option<&Track> {
        self.slots[key.index()].as_ref()
    }

    pub(crate) fn get_mut(&mut self, key: StemKey) -> Option<&mut Track> {
        self.slots[key.index()].as_mut()
    }

    #[cfg(test)]
    pub(crate) fn is_available(&self, key: StemKey) -> bool {
        self.slots[key.index()].is_some()
    }

    /// Keys of currently playing tracks, in anchor-selection order
    pub(crate) fn playing_keys(&self) -> impl Iterator<Item = StemKey> + '_ {
        StemKey::ALL
            .into_iter()
            .filter(|key| self.get(*key).is_some_and(Track::is_playing))
    }

    /// Store a clamped volume and apply the effective gain to the source
    ///
    /// Non-finite input is rejected with the previous value retained, the
    /// same contract as offsets. The stored value is also remembered for the
    /// key, so a re-registered track starts at the user's last setting
    /// rather than full volume.
    pub(crate) fn set_volume(&mut self, key: StemKey, volume: f32) {
        if !volume.is_finite() {
            log::warn!("set_volume({key}): non-finite value {volume}, keeping previous");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.remembered_volume[key.index()] = volume;
        if let Some(track) = self.get_mut(key) {
            track.volume = volume;
            track.apply_gain();
        }
    }

    pub(crate) fn toggle_mute(&mut self, key: StemKey) {
        if let Some(track) = self.get_mut(key) {
            track.muted = !track.muted;
            track.apply_gain();
        }
    }

    /// Record the duration reported by a source's metadata notice
    pub(crate) fn capture_metadata(&mut self, key: StemKey, duration: Seconds) {
        if let Some(track) = self.get_mut(key) {
            track.duration = Some(duration);
            log::debug!("capture_metadata({key}): duration {duration:.3}s");
        }
    }

    /// Refresh every track's display position from its live source
    ///
    /// Each track is sampled independently; there is no cross-track
    /// atomicity guarantee.
    pub(crate) fn sample_positions(&mut self) -> [Option<Seconds>; NUM_STEMS] {
        let mut positions = [None; NUM_STEMS];
        for key in StemKey::ALL {
            if let Some(track) = self.get_mut(key) {
                let raw = track.source.position();
                track.position = match track.duration {
                    Some(duration) => raw.clamp(0.0, duration),
                    None => raw.max(0.0),
                };
                positions[key.index()] = Some(track.position);
            }
        }
        positions
    }

    /// Give every live source a chance to flush pending notices
    pub(crate) fn pump_sources(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.source.pump();
        }
    }

    /// Pause every handle, detach observers, and release resources
    ///
    /// Safe to call repeatedly and when nothing was ever registered.
    pub(crate) fn teardown_all(&mut self) {
        for slot in &mut self.slots {
            if let Some(mut track) = slot.take() {
                track.source.pause();
                track.source.clear_observer();
                track.source.release();
            }
        }
    }

    /// Teardown plus a return to defaults for all per-key state
    pub(crate) fn reset(&mut self) {
        self.teardown_all();
        self.remembered_volume = [1.0; NUM_STEMS];
        self.failed = [false; NUM_STEMS];
    }
}
