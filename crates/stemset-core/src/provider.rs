//! Contract types for the upstream separation service
//!
//! The service is an opaque collaborator: it ingests a file or video URL,
//! runs source separation, and reports job status. Its only contract with
//! this engine is "produce six named, independently streamable/downloadable
//! audio tracks and report job status", captured by the types below.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::StemKey;

/// Lifecycle state of a separation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Streaming and download locations for one stem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemUrls {
    /// Streamable rendition, fed to the playable source
    pub stream: String,
    /// Downloadable WAV rendition
    pub wav: String,
}

/// Status report for a separation job, as polled from the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    /// Completion percentage, 0-100
    #[serde(default)]
    pub progress: u8,
    /// Stem locations; present once the job completes
    #[serde(default)]
    pub stems: HashMap<StemKey, StemUrls>,
    /// Failure description when `status` is `Failed`
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatus {
    pub fn is_completed(&self) -> bool {
        self.status == JobState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobState::Failed
    }

    /// Locations for one stem, if the job produced it
    pub fn stem(&self, key: StemKey) -> Option<&StemUrls> {
        self.stems.get(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completed_status() {
        let json = r#"{
            "status": "completed",
            "progress": 100,
            "stems": {
                "voz": { "wav": "/download/j1/vocals.wav", "stream": "/stream/j1/vocals.wav" },
                "bateria": { "wav": "/download/j1/drums.wav", "stream": "/stream/j1/drums.wav" }
            }
        }"#;

        let status: JobStatus = serde_json::from_str(json).unwrap();
        assert!(status.is_completed());
        assert_eq!(status.progress, 100);
        assert_eq!(
            status.stem(StemKey::Voz).unwrap().stream,
            "/stream/j1/vocals.wav"
        );
        assert!(status.stem(StemKey::Baixo).is_none());
    }

    #[test]
    fn test_parse_failed_status() {
        let json = r#"{ "status": "failed", "error": "demucs exited with code 1" }"#;

        let status: JobStatus = serde_json::from_str(json).unwrap();
        assert!(status.is_failed());
        assert!(status.stems.is_empty());
        assert_eq!(status.error.as_deref(), Some("demucs exited with code 1"));
    }
}
