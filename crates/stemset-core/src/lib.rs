//! Stemset Core - Synchronized multi-stem playback engine
//!
//! Keeps N independently-clocked audio sources aligned on a common timeline
//! while supporting live offset edits, per-track seeks, and asymmetric
//! per-track start/stop. Audio decoding and output are delegated to opaque
//! [`source::PlayableSource`] implementations; this crate only commands them
//! from a single control thread and reacts to their notifications.

pub mod error;
pub mod provider;
pub mod session;
pub mod source;
pub mod types;

pub use error::{SourceError, SourceResult};
pub use session::{PositionSnapshot, StemSession, TrackView};
pub use source::{PlayableSource, SourceEvent, SourceFactory, SourceObserver};
pub use types::*;
