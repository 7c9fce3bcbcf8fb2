//! Rodio-backed playback sources
//!
//! Each stem gets its own `Sink` so tracks can be started, paused and
//! seeked independently. The session never touches rodio directly; it
//! only sees the `PlayableSource` / `SourceFactory` traits.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use stemset_core::{
    PlayableSource, Seconds, SourceError, SourceEvent, SourceFactory, SourceObserver, SourceResult,
};

/// Factory that opens local audio files and plays them on the default
/// output device.
pub struct RodioFactory {
    // Keeps the output device alive for the lifetime of all sinks.
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioFactory {
    pub fn try_default() -> SourceResult<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| SourceError::OutputUnavailable(e.to_string()))?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }
}

impl SourceFactory for RodioFactory {
    fn create(&self, url: &str) -> SourceResult<Box<dyn PlayableSource>> {
        let path = path_from_url(url);

        let file = File::open(&path).map_err(|e| SourceError::Load {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| SourceError::Load {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let duration = decoder.total_duration().map(|d| d.as_secs_f64());

        let sink = Sink::try_new(&self.handle)
            .map_err(|e| SourceError::OutputUnavailable(e.to_string()))?;
        sink.pause();
        sink.append(decoder);

        Ok(Box::new(RodioSource {
            path,
            sink: Some(sink),
            duration,
            observer: None,
            metadata_announced: false,
            playing: false,
            pending_seek: None,
            ended_position: None,
        }))
    }
}

/// Strip an optional `file://` scheme; everything else is treated as a
/// plain filesystem path.
fn path_from_url(url: &str) -> PathBuf {
    PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
}

pub struct RodioSource {
    path: PathBuf,
    sink: Option<Sink>,
    duration: Option<Seconds>,
    observer: Option<SourceObserver>,
    metadata_announced: bool,
    playing: bool,
    // Seek requested while the sink was drained; applied on next play.
    pending_seek: Option<Seconds>,
    // Position frozen when playback ran off the end.
    ended_position: Option<Seconds>,
}

impl RodioSource {
    fn notify(&self, event: SourceEvent) {
        if let Some(obs) = &self.observer {
            obs.notify(event);
        }
    }

    /// Re-appends a fresh decoder after the sink drained at end of file.
    fn reload(&mut self) -> bool {
        let Some(sink) = &self.sink else {
            return false;
        };
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("reload: failed to reopen {:?}: {}", self.path, e);
                return false;
            }
        };
        let decoder = match Decoder::new(BufReader::new(file)) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("reload: failed to decode {:?}: {}", self.path, e);
                return false;
            }
        };
        sink.append(decoder);
        true
    }
}

impl PlayableSource for RodioSource {
    fn play(&mut self) {
        let needs_reload = match &self.sink {
            Some(sink) => sink.empty(),
            None => return,
        };
        if needs_reload {
            if !self.reload() {
                return;
            }
            self.ended_position = None;
        }

        let Some(sink) = &self.sink else { return };
        if let Some(target) = self.pending_seek.take() {
            if let Err(e) = sink.try_seek(Duration::from_secs_f64(target)) {
                log::warn!("play: deferred seek failed: {}", e);
            }
        }
        sink.play();
        self.playing = true;
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        self.playing = false;
    }

    fn position(&self) -> Seconds {
        if let Some(p) = self.ended_position {
            return p;
        }
        if let Some(p) = self.pending_seek {
            return p;
        }
        match &self.sink {
            Some(sink) => sink.get_pos().as_secs_f64(),
            None => 0.0,
        }
    }

    fn set_position(&mut self, position: Seconds) {
        let Some(sink) = &self.sink else { return };

        if sink.empty() {
            // Nothing queued to seek into; remember for the next play.
            self.pending_seek = Some(position);
            self.ended_position = None;
            return;
        }

        match sink.try_seek(Duration::from_secs_f64(position)) {
            Ok(()) => {
                self.ended_position = None;
            }
            Err(e) => log::warn!("set_position: seek to {:.3}s failed: {}", position, e),
        }
    }

    fn duration(&self) -> Option<Seconds> {
        self.duration
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn set_observer(&mut self, observer: SourceObserver) {
        self.observer = Some(observer);
    }

    fn clear_observer(&mut self) {
        self.observer = None;
    }

    fn pump(&mut self) {
        if !self.metadata_announced {
            self.metadata_announced = true;
            match self.duration {
                Some(d) => self.notify(SourceEvent::MetadataLoaded(d)),
                None => {
                    log::warn!("pump: {:?} has unknown duration", self.path);
                }
            }
        }

        if self.playing {
            if let Some(sink) = &self.sink {
                if sink.empty() {
                    self.playing = false;
                    self.ended_position = self.duration;
                    self.notify(SourceEvent::Ended);
                }
            }
        }
    }

    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.playing = false;
        self.observer = None;
    }
}
