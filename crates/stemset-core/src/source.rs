//! Playable-source abstraction
//!
//! A [`PlayableSource`] wraps one streamable audio resource. All of its
//! operations are fire-and-forget commands issued from the control thread;
//! their effects are observed later through [`SourceNotice`]s delivered over
//! the observer conduit, or by polling `position()`.
//!
//! Backends that run their own threads (or none at all) both fit this shape:
//! [`PlayableSource::pump`] is called from the control thread on every
//! session poll and is the backend's chance to flush pending notices.

use crossbeam::channel::Sender;

use crate::error::SourceResult;
use crate::types::{Seconds, StemKey};

/// Asynchronous notification emitted by a playable source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceEvent {
    /// The source reported its metadata; duration is now known
    MetadataLoaded(Seconds),
    /// The source's playback position moved
    PositionChanged(Seconds),
    /// The source reached its natural end
    Ended,
}

/// A source event tagged with the stem it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceNotice {
    pub key: StemKey,
    pub event: SourceEvent,
}

/// Observer conduit handed to a source at registration and dropped at
/// teardown
///
/// Sources send notices through it without knowing anything about the
/// session; the session drains the receiving end on its control thread.
#[derive(Clone)]
pub struct SourceObserver {
    key: StemKey,
    tx: Sender<SourceNotice>,
}

impl SourceObserver {
    pub fn new(key: StemKey, tx: Sender<SourceNotice>) -> Self {
        Self { key, tx }
    }

    /// Stem this observer reports for
    pub fn key(&self) -> StemKey {
        self.key
    }

    /// Send a notice; a disconnected session just drops it
    pub fn notify(&self, event: SourceEvent) {
        let _ = self.tx.send(SourceNotice { key: self.key, event });
    }
}

/// One independently-clocked playable audio resource
///
/// Implementations own the actual decode/output machinery. Every method is
/// non-blocking; `play`/`pause`/`set_position` merely command the backend.
pub trait PlayableSource {
    /// Start or resume playback
    fn play(&mut self);

    /// Pause playback, keeping the current position
    fn pause(&mut self);

    /// Current playback position on this source's own clock
    fn position(&self) -> Seconds;

    /// Move the playback position; callers clamp to `[0, duration]`
    fn set_position(&mut self, position: Seconds);

    /// Total duration, `None` until the source has loaded its metadata
    fn duration(&self) -> Option<Seconds>;

    /// Set the output gain in `[0, 1]`
    fn set_volume(&mut self, gain: f32);

    /// Attach the observer conduit for asynchronous notices
    fn set_observer(&mut self, observer: SourceObserver);

    /// Detach the observer; no notices are delivered afterwards
    fn clear_observer(&mut self);

    /// Drive the backend from the control thread, flushing pending notices
    fn pump(&mut self) {}

    /// Stop playback and free the underlying resource; idempotent
    fn release(&mut self);
}

/// Creates playable sources from stream URLs
///
/// The seam between the engine and whatever audio backend a host wires in.
pub trait SourceFactory {
    fn create(&self, url: &str) -> SourceResult<Box<dyn PlayableSource>>;
}
