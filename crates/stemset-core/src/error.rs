//! Engine error types
//!
//! Most faults in this engine are absorbed rather than raised: out-of-range
//! seeks are clamped, commands on unknown or metadata-less tracks are
//! no-ops, and a failed source load only marks that one track unavailable.
//! The errors below cover the cases that callers genuinely need to see.

use thiserror::Error;

/// Errors that can occur while creating or loading a playable source
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network or format failure while loading a stem
    #[error("failed to load stem source from {url}: {reason}")]
    Load { url: String, reason: String },

    /// The audio output backend could not be opened
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;
