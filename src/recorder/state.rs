//! Recording state management
//!
//! Defines the recording state machine and segment tracking.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current state of the recording controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
}

/// One uninterrupted stretch of recording
///
/// A new segment is created each time recording is resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSegment {
    /// Segment index (0, 1, 2, ...)
    pub index: usize,

    /// Duration of this segment in milliseconds
    pub duration_ms: f64,

    /// Time since the recording started when this segment began
    pub start_offset_ms: f64,

    /// Time since the recording started when this segment ended
    pub end_offset_ms: f64,

    /// Unix timestamp when the segment started
    pub unix_start_ms: u64,

    /// Unix timestamp when the segment ended
    pub unix_end_ms: u64,
}

impl RecordingSegment {
    /// Create a new segment starting now
    pub fn new(index: usize, offset_ms: f64) -> Self {
        let now = Utc::now().timestamp_millis() as u64;
        Self {
            index,
            duration_ms: 0.0,
            start_offset_ms: offset_ms,
            end_offset_ms: offset_ms,
            unix_start_ms: now,
            unix_end_ms: now,
        }
    }

    /// End the segment
    pub fn end(&mut self, offset_ms: f64) {
        self.end_offset_ms = offset_ms;
        self.duration_ms = self.end_offset_ms - self.start_offset_ms;
        self.unix_end_ms = Utc::now().timestamp_millis() as u64;
    }
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecording {
    /// Where the download sink put the file
    pub path: PathBuf,

    pub filename: String,

    pub mime_type: String,

    pub size_bytes: u64,

    /// Recorded time excluding pauses, in milliseconds
    pub duration_ms: f64,

    /// Number of segments (pause/resume cycles + 1)
    pub segment_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_duration() {
        let mut segment = RecordingSegment::new(1, 1500.0);
        segment.end(4000.0);
        assert_eq!(segment.duration_ms, 2500.0);
        assert!(segment.unix_end_ms >= segment.unix_start_ms);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&RecordingState::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
    }
}
