//! Session layer - the explicit owner of all playback state
//!
//! A [`StemSession`] owns the track registry and the engine components and
//! exposes the command/read-model surface consumed by a presentation layer.
//! There is no ambient state: every command handler receives the session by
//! reference.
//!
//! All state transitions run on the single control thread that calls into
//! the session. Source notifications are drained from a channel inside
//! [`StemSession::poll`], so observer callbacks never interleave with
//! commands.

mod clock;
mod offset;
mod registry;
mod sync;
mod transport;

use std::time::Instant;

use crossbeam::channel::Receiver;

use crate::provider::{JobStatus, StemUrls};
use crate::source::{SourceEvent, SourceFactory, SourceNotice};
use crate::types::{Seconds, StemKey, NUM_STEMS};

pub use clock::{PositionSnapshot, DEFAULT_TICK_INTERVAL};

use clock::PositionClock;
use offset::OffsetManager;
use registry::TrackRegistry;
use transport::TransportController;

/// Per-track read model for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackView {
    pub key: StemKey,
    /// False for keys never registered and for keys whose source failed
    pub available: bool,
    pub is_playing: bool,
    pub volume: f32,
    pub muted: bool,
    pub offset: Seconds,
    pub position: Seconds,
    pub duration: Option<Seconds>,
}

impl TrackView {
    fn unavailable(key: StemKey) -> Self {
        Self {
            key,
            available: false,
            is_playing: false,
            volume: 1.0,
            muted: false,
            offset: 0.0,
            position: 0.0,
            duration: None,
        }
    }
}

/// Synchronized multi-stem playback session
pub struct StemSession {
    registry: TrackRegistry,
    transport: TransportController,
    offsets: OffsetManager,
    clock: PositionClock,
    factory: Box<dyn SourceFactory>,
    notice_rx: Receiver<SourceNotice>,
    last_snapshot: PositionSnapshot,
}

impl StemSession {
    pub fn new(factory: Box<dyn SourceFactory>) -> Self {
        Self::with_tick_interval(factory, clock::DEFAULT_TICK_INTERVAL)
    }

    pub fn with_tick_interval(
        factory: Box<dyn SourceFactory>,
        interval: std::time::Duration,
    ) -> Self {
        let (tx, rx) = crossbeam::channel::unbounded();
        Self {
            registry: TrackRegistry::new(tx),
            transport: TransportController,
            offsets: OffsetManager,
            clock: PositionClock::new(interval),
            factory,
            notice_rx: rx,
            last_snapshot: PositionSnapshot::default(),
        }
    }

    // ------------------------------------------------------------------
    // Track creation
    // ------------------------------------------------------------------

    /// Lazily create the track for `key`; idempotent per key
    pub fn register_stem(&mut self, key: StemKey, urls: StemUrls) {
        self.registry.register(self.factory.as_ref(), key, urls);
    }

    /// Register every stem a completed job reports
    pub fn load_job(&mut self, status: &JobStatus) {
        if !status.is_completed() {
            log::warn!(
                "load_job: job is {:?} ({}%), no stems to register",
                status.status,
                status.progress
            );
        }
        for key in StemKey::ALL {
            if let Some(urls) = status.stem(key) {
                self.register_stem(key, urls.clone());
            }
        }
    }

    // ------------------------------------------------------------------
    // Transport commands
    // ------------------------------------------------------------------

    pub fn play(&mut self, key: StemKey) {
        self.transport.play(&mut self.registry, key);
    }

    pub fn pause(&mut self, key: StemKey) {
        self.transport.pause(&mut self.registry, key);
    }

    pub fn play_all(&mut self) {
        self.transport.play_all(&mut self.registry);
    }

    pub fn pause_all(&mut self) {
        self.transport.pause_all(&mut self.registry);
    }

    pub fn seek(&mut self, key: StemKey, t: Seconds) {
        self.transport.seek(&mut self.registry, key, t);
    }

    // ------------------------------------------------------------------
    // Mix commands
    // ------------------------------------------------------------------

    /// Set the stored volume for `key`, clamped into `[0, 1]`
    pub fn set_volume(&mut self, key: StemKey, volume: f32) {
        self.registry.set_volume(key, volume);
    }

    pub fn toggle_mute(&mut self, key: StemKey) {
        self.registry.toggle_mute(key);
    }

    pub fn set_offset(&mut self, key: StemKey, value: Seconds) {
        self.offsets.set_offset(&mut self.registry, key, value);
    }

    /// Shift the offset by `delta` seconds
    pub fn nudge_offset(&mut self, key: StemKey, delta: Seconds) {
        self.offsets.nudge_offset(&mut self.registry, key, delta);
    }

    // ------------------------------------------------------------------
    // Read model
    // ------------------------------------------------------------------

    pub fn view(&self, key: StemKey) -> TrackView {
        match self.registry.get(key) {
            Some(track) => TrackView {
                key,
                available: true,
                is_playing: track.is_playing(),
                volume: track.volume,
                muted: track.muted,
                offset: track.offset,
                position: track.position,
                duration: track.duration,
            },
            None => TrackView::unavailable(key),
        }
    }

    pub fn views(&self) -> [TrackView; NUM_STEMS] {
        StemKey::ALL.map(|key| self.view(key))
    }

    /// Downloadable WAV URL for `key`, if the track exists
    pub fn download_url(&self, key: StemKey) -> Option<&str> {
        self.registry.get(key).map(|t| t.urls.wav.as_str())
    }

    /// Positions sampled on the most recent clock tick
    pub fn snapshot(&self) -> &PositionSnapshot {
        &self.last_snapshot
    }

    // ------------------------------------------------------------------
    // Control loop
    // ------------------------------------------------------------------

    /// One cooperative reaction step
    ///
    /// Pumps every source, drains pending source notices, re-evaluates the
    /// position clock's armed state against the "any track playing"
    /// predicate, and takes a display snapshot when a tick is due.
    pub fn poll(&mut self, now: Instant) {
        self.registry.pump_sources();

        while let Ok(notice) = self.notice_rx.try_recv() {
            match notice.event {
                SourceEvent::MetadataLoaded(duration) => {
                    self.registry.capture_metadata(notice.key, duration);
                }
                SourceEvent::PositionChanged(position) => {
                    if let Some(track) = self.registry.get_mut(notice.key) {
                        track.position = match track.duration {
                            Some(duration) => position.clamp(0.0, duration),
                            None => position.max(0.0),
                        };
                    }
                }
                SourceEvent::Ended => {
                    self.transport.on_ended(&mut self.registry, notice.key);
                }
            }
        }

        if self.registry.playing_keys().next().is_some() {
            self.clock.arm(now);
        } else {
            self.clock.disarm();
        }
        if self.clock.tick_due(now) {
            self.last_snapshot = PositionSnapshot {
                positions: self.registry.sample_positions(),
            };
        }
    }

    /// Release every track and return all per-track state to defaults
    ///
    /// Safe to call at any time, including before any track was created.
    pub fn reset_session(&mut self) {
        log::info!("reset_session");
        self.registry.reset();
        self.clock.disarm();
        self.last_snapshot = PositionSnapshot::default();
        // Drain notices from the released sources so a later job does not
        // see stale events.
        while self.notice_rx.try_recv().is_ok() {}
    }
}

impl Drop for StemSession {
    fn drop(&mut self) {
        self.registry.teardown_all();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::source::fake::{advance, FakeFactory, FakeHandle};

    const EPS: f64 = 1e-9;

    fn urls(key: StemKey) -> StemUrls {
        StemUrls {
            stream: format!("mem:{key}"),
            wav: format!("mem:{key}.wav"),
        }
    }

    /// Session with the given stems registered and metadata captured
    fn session_with(stems: &[(StemKey, Seconds)]) -> (StemSession, Rc<FakeFactory>) {
        let mut factory = FakeFactory::new();
        for (key, duration) in stems {
            factory = factory.with_duration(&format!("mem:{key}"), *duration);
        }
        let factory = Rc::new(factory);
        let mut session =
            StemSession::with_tick_interval(Box::new(Rc::clone(&factory)), Duration::from_millis(100));
        for (key, _) in stems {
            session.register_stem(*key, urls(*key));
        }
        session.poll(Instant::now());
        (session, factory)
    }

    fn handle(factory: &FakeFactory, key: StemKey) -> FakeHandle {
        factory.handle(&format!("mem:{key}"))
    }

    #[test]
    fn test_play_alone_starts_without_alignment() {
        let (mut session, factory) = session_with(&[(StemKey::Voz, 180.0)]);

        session.play(StemKey::Voz);

        let voz = handle(&factory, StemKey::Voz);
        assert!(voz.borrow().playing);
        assert!(voz.borrow().seeks.is_empty(), "no anchor, no seek");
        assert!(session.view(StemKey::Voz).is_playing);
    }

    #[test]
    fn test_play_aligns_to_running_anchor() {
        // Concrete scenario: voz (180s, offset 0) at 10s; bateria has
        // offset -1.5 and must start at 8.5s.
        let (mut session, factory) =
            session_with(&[(StemKey::Voz, 180.0), (StemKey::Bateria, 120.0)]);

        session.play(StemKey::Voz);
        advance(&handle(&factory, StemKey::Voz), 10.0);
        session.set_offset(StemKey::Bateria, -1.5);
        session.play(StemKey::Bateria);

        let bateria = handle(&factory, StemKey::Bateria);
        assert!((bateria.borrow().position - 8.5).abs() < EPS);
        assert!(bateria.borrow().playing);
        // position(B) == position(A) - oA + oB
        let voz = handle(&factory, StemKey::Voz);
        assert!(
            (bateria.borrow().position - (voz.borrow().position - 0.0 + (-1.5))).abs() < EPS
        );
    }

    #[test]
    fn test_anchor_is_first_playing_in_declaration_order() {
        let (mut session, factory) = session_with(&[
            (StemKey::Voz, 180.0),
            (StemKey::Baixo, 180.0),
            (StemKey::Teclado, 180.0),
        ]);

        session.play(StemKey::Baixo);
        session.play(StemKey::Teclado);
        advance(&handle(&factory, StemKey::Baixo), 20.0);
        advance(&handle(&factory, StemKey::Teclado), 35.0);

        // Voz must anchor on baixo (earlier in StemKey::ALL), not teclado.
        session.play(StemKey::Voz);
        assert!((handle(&factory, StemKey::Voz).borrow().position - 20.0).abs() < EPS);
    }

    #[test]
    fn test_seek_reanchors_playing_tracks_only() {
        let (mut session, factory) = session_with(&[
            (StemKey::Voz, 180.0),
            (StemKey::Bateria, 180.0),
            (StemKey::Outros, 180.0),
        ]);

        session.set_offset(StemKey::Voz, 2.0);
        session.set_offset(StemKey::Bateria, -1.0);
        session.play(StemKey::Voz);
        session.play(StemKey::Bateria);

        session.seek(StemKey::Voz, 50.0);

        assert!((handle(&factory, StemKey::Voz).borrow().position - 50.0).abs() < EPS);
        // position(B) = (t - oA) + oB = (50 - 2) + (-1) = 47
        assert!((handle(&factory, StemKey::Bateria).borrow().position - 47.0).abs() < EPS);
        // Stopped track untouched
        assert!(handle(&factory, StemKey::Outros).borrow().seeks.is_empty());
    }

    #[test]
    fn test_seek_clamps_out_of_range_targets() {
        let (mut session, factory) = session_with(&[(StemKey::Voz, 30.0)]);

        session.seek(StemKey::Voz, 100.0);
        assert!((handle(&factory, StemKey::Voz).borrow().position - 30.0).abs() < EPS);

        session.seek(StemKey::Voz, -5.0);
        assert!(handle(&factory, StemKey::Voz).borrow().position.abs() < EPS);
    }

    #[test]
    fn test_seek_on_stopped_track_moves_nothing_else() {
        let (mut session, factory) =
            session_with(&[(StemKey::Voz, 180.0), (StemKey::Baixo, 180.0)]);

        session.play(StemKey::Baixo);
        session.seek(StemKey::Voz, 12.0);

        assert!((handle(&factory, StemKey::Voz).borrow().position - 12.0).abs() < EPS);
        assert!(handle(&factory, StemKey::Baixo).borrow().seeks.is_empty());
    }

    #[test]
    fn test_offset_edit_while_alone_keeps_position() {
        let (mut session, factory) = session_with(&[(StemKey::Voz, 180.0)]);

        session.play(StemKey::Voz);
        advance(&handle(&factory, StemKey::Voz), 10.0);
        session.set_offset(StemKey::Voz, 4.0);

        let voz = handle(&factory, StemKey::Voz);
        assert!((voz.borrow().position - 10.0).abs() < EPS);
        assert!(voz.borrow().seeks.is_empty());
        assert_eq!(session.view(StemKey::Voz).offset, 4.0);
    }

    #[test]
    fn test_offset_edit_while_others_play_realigns() {
        let (mut session, factory) =
            session_with(&[(StemKey::Voz, 180.0), (StemKey::Guitarra, 180.0)]);

        session.play(StemKey::Voz);
        advance(&handle(&factory, StemKey::Voz), 10.0);
        session.play(StemKey::Guitarra); // starts at 10.0
        session.set_offset(StemKey::Guitarra, 2.5);

        let guitarra = handle(&factory, StemKey::Guitarra);
        assert!((guitarra.borrow().position - 12.5).abs() < EPS);
        assert!(guitarra.borrow().playing, "re-alignment keeps play state");
    }

    #[test]
    fn test_non_finite_offset_rejected() {
        let (mut session, _) = session_with(&[(StemKey::Voz, 180.0)]);

        session.set_offset(StemKey::Voz, 1.5);
        session.set_offset(StemKey::Voz, f64::NAN);
        assert_eq!(session.view(StemKey::Voz).offset, 1.5);
        session.set_offset(StemKey::Voz, f64::INFINITY);
        assert_eq!(session.view(StemKey::Voz).offset, 1.5);
    }

    #[test]
    fn test_nudge_offset_accumulates() {
        let (mut session, _) = session_with(&[(StemKey::Voz, 180.0)]);

        session.nudge_offset(StemKey::Voz, 0.5);
        session.nudge_offset(StemKey::Voz, 0.5);
        session.nudge_offset(StemKey::Voz, -0.25);
        assert!((session.view(StemKey::Voz).offset - 0.75).abs() < EPS);
    }

    #[test]
    fn test_pause_is_idempotent_and_uncoupled() {
        let (mut session, factory) =
            session_with(&[(StemKey::Voz, 180.0), (StemKey::Baixo, 180.0)]);

        session.play(StemKey::Voz);
        session.play(StemKey::Baixo);
        session.pause(StemKey::Voz);
        let after_first = session.views();
        session.pause(StemKey::Voz);
        assert_eq!(session.views(), after_first);

        assert!(!handle(&factory, StemKey::Voz).borrow().playing);
        assert!(session.view(StemKey::Baixo).is_playing, "pause is per-track");
    }

    #[test]
    fn test_volume_clamped_in_views() {
        let (mut session, _) = session_with(&[(StemKey::Voz, 180.0)]);

        session.set_volume(StemKey::Voz, -0.5);
        assert_eq!(session.view(StemKey::Voz).volume, 0.0);
        session.set_volume(StemKey::Voz, 1.5);
        assert_eq!(session.view(StemKey::Voz).volume, 1.0);
        session.set_volume(StemKey::Voz, f32::NAN);
        assert_eq!(session.view(StemKey::Voz).volume, 1.0);
    }

    #[test]
    fn test_asymmetric_natural_end() {
        let (mut session, factory) =
            session_with(&[(StemKey::Voz, 30.0), (StemKey::Baixo, 180.0)]);

        session.play(StemKey::Voz);
        session.play(StemKey::Baixo);
        advance(&handle(&factory, StemKey::Voz), 30.0);
        advance(&handle(&factory, StemKey::Baixo), 30.0);
        session.poll(Instant::now());

        assert!(!session.view(StemKey::Voz).is_playing);
        assert!(session.view(StemKey::Baixo).is_playing);
        assert_eq!(session.view(StemKey::Voz).position, 30.0);
    }

    #[test]
    fn test_commands_on_unregistered_keys_are_noops() {
        let (mut session, _) = session_with(&[(StemKey::Voz, 180.0)]);

        session.play(StemKey::Teclado);
        session.pause(StemKey::Teclado);
        session.seek(StemKey::Teclado, 10.0);
        session.set_offset(StemKey::Teclado, 1.0);
        session.set_volume(StemKey::Teclado, 0.5);
        session.toggle_mute(StemKey::Teclado);

        let view = session.view(StemKey::Teclado);
        assert!(!view.available);
        assert!(!view.is_playing);
        assert!(session.download_url(StemKey::Teclado).is_none());
    }

    #[test]
    fn test_commands_deferred_until_metadata_known() {
        // A source that never reports metadata leaves its track permanently
        // awaiting duration; play and seek stay no-ops.
        let factory = Rc::new(FakeFactory::new());
        let mut session = StemSession::new(Box::new(Rc::clone(&factory)));
        session.register_stem(StemKey::Voz, urls(StemKey::Voz));
        session.poll(Instant::now());

        session.play(StemKey::Voz);
        session.seek(StemKey::Voz, 10.0);

        let voz = handle(&factory, StemKey::Voz);
        assert!(!voz.borrow().playing);
        assert!(voz.borrow().seeks.is_empty());
        assert!(session.view(StemKey::Voz).available);
        assert!(session.view(StemKey::Voz).duration.is_none());
    }

    #[test]
    fn test_failed_load_marks_track_unavailable() {
        let factory = Rc::new(FakeFactory::new().with_failure("mem:baixo"));
        let mut session = StemSession::new(Box::new(Rc::clone(&factory)));
        session.register_stem(StemKey::Baixo, urls(StemKey::Baixo));

        assert!(!session.view(StemKey::Baixo).available);
        session.play(StemKey::Baixo); // absorbed
    }

    #[test]
    fn test_play_all_and_pause_all() {
        let (mut session, factory) =
            session_with(&[(StemKey::Voz, 180.0), (StemKey::Outros, 180.0)]);

        advance(&handle(&factory, StemKey::Voz), 0.0);
        session.play_all();
        assert!(session.view(StemKey::Voz).is_playing);
        assert!(session.view(StemKey::Outros).is_playing);

        session.pause_all();
        assert!(!session.view(StemKey::Voz).is_playing);
        assert!(!session.view(StemKey::Outros).is_playing);
    }

    #[test]
    fn test_clock_armed_only_while_playing() {
        let (mut session, factory) = session_with(&[(StemKey::Voz, 180.0)]);
        let t0 = Instant::now();

        session.poll(t0);
        assert!(!session.clock.is_armed());

        session.play(StemKey::Voz);
        advance(&handle(&factory, StemKey::Voz), 3.0);
        session.poll(t0 + Duration::from_millis(1));
        assert!(session.clock.is_armed());
        assert_eq!(
            session.snapshot().positions[StemKey::Voz.index()],
            Some(3.0)
        );

        session.pause(StemKey::Voz);
        session.poll(t0 + Duration::from_millis(2));
        assert!(!session.clock.is_armed());
    }

    #[test]
    fn test_reset_session_restores_defaults() {
        let (mut session, factory) = session_with(&[(StemKey::Voz, 180.0)]);

        session.set_volume(StemKey::Voz, 0.3);
        session.set_offset(StemKey::Voz, 2.0);
        session.play(StemKey::Voz);
        session.reset_session();

        assert!(factory.handle("mem:voz").borrow().released);
        assert!(!session.view(StemKey::Voz).available);

        // Re-registration after reset starts from defaults, not 0.3
        session.register_stem(StemKey::Voz, urls(StemKey::Voz));
        session.poll(Instant::now());
        assert_eq!(session.view(StemKey::Voz).volume, 1.0);
        assert_eq!(session.view(StemKey::Voz).offset, 0.0);
    }

    #[test]
    fn test_reset_session_safe_with_no_tracks() {
        let factory = Rc::new(FakeFactory::new());
        let mut session = StemSession::new(Box::new(factory));
        session.reset_session();
        session.reset_session();
    }

    #[test]
    fn test_drop_releases_sources() {
        let (session, factory) = session_with(&[(StemKey::Voz, 180.0)]);
        drop(session);
        assert!(factory.handle("mem:voz").borrow().released);
    }

    #[test]
    fn test_load_job_registers_reported_stems() {
        use crate::provider::{JobState, JobStatus};

        let factory = Rc::new(
            FakeFactory::new()
                .with_duration("/stream/j1/vocals.wav", 180.0)
                .with_duration("/stream/j1/drums.wav", 180.0),
        );
        let mut session = StemSession::new(Box::new(Rc::clone(&factory)));

        let status = JobStatus {
            status: JobState::Completed,
            progress: 100,
            stems: [
                (
                    StemKey::Voz,
                    StemUrls {
                        stream: "/stream/j1/vocals.wav".into(),
                        wav: "/download/j1/vocals.wav".into(),
                    },
                ),
                (
                    StemKey::Bateria,
                    StemUrls {
                        stream: "/stream/j1/drums.wav".into(),
                        wav: "/download/j1/drums.wav".into(),
                    },
                ),
            ]
            .into_iter()
            .collect(),
            error: None,
        };
        session.load_job(&status);

        assert!(session.view(StemKey::Voz).available);
        assert!(session.view(StemKey::Bateria).available);
        assert!(!session.view(StemKey::Baixo).available);
        assert_eq!(
            session.download_url(StemKey::Voz),
            Some("/download/j1/vocals.wav")
        );
    }
}
