//! Recorder backend traits
//!
//! A `RecorderFactory` answers which formats it can produce and wraps a live
//! stream in a `MediaRecorder`. The recorder buffers encoded output
//! internally; the controller drains it on every flush tick.

use super::format::RecordingFormat;
use crate::capture::MediaStream;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Recording errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("No active camera stream to record")]
    NoActiveStream,

    #[error("No supported recording format available")]
    NoSupportedFormat,

    #[error("Recording already in progress")]
    AlreadyRecording,

    #[error("Not currently recording")]
    NotRecording,

    #[error("Invalid recording state: {0}")]
    InvalidState(String),

    #[error("Recorder error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordingError {
    /// Stable code reported to the frontend
    pub fn code(&self) -> &'static str {
        match self {
            RecordingError::NoSupportedFormat => "NO_SUPPORTED_FORMAT",
            RecordingError::NoActiveStream => "NO_ACTIVE_STREAM",
            RecordingError::AlreadyRecording
            | RecordingError::NotRecording
            | RecordingError::InvalidState(_) => "RECORDING_STATE",
            RecordingError::Backend(_) => "UNKNOWN",
            RecordingError::Io(_) => "IO_ERROR",
        }
    }

    /// Message shown in the error dialog
    pub fn user_message(&self) -> String {
        match self {
            RecordingError::NoActiveStream => {
                "No active camera stream. Start the camera before recording.".to_string()
            }
            RecordingError::NoSupportedFormat => {
                "Recording is not supported: no compatible video format is available.".to_string()
            }
            RecordingError::AlreadyRecording => "A recording is already in progress.".to_string(),
            RecordingError::NotRecording => "There is no recording in progress.".to_string(),
            RecordingError::InvalidState(detail) => {
                format!("The recording cannot change state right now: {detail}")
            }
            RecordingError::Backend(detail) => format!("Recording failed: {detail}"),
            RecordingError::Io(e) => format!("Failed to save the recording: {e}"),
        }
    }
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// An active recorder attached to a stream
#[async_trait]
pub trait MediaRecorder: Send {
    /// Take whatever encoded data has accumulated since the last call
    async fn request_data(&mut self) -> RecordingResult<Option<Vec<u8>>>;

    async fn pause(&mut self) -> RecordingResult<()>;

    async fn resume(&mut self) -> RecordingResult<()>;

    /// Finalize the recording and return the remaining data
    async fn stop(&mut self) -> RecordingResult<Option<Vec<u8>>>;
}

/// Creates recorders for a given stream and format
pub trait RecorderFactory: Send + Sync {
    /// Whether this backend can produce the given MIME type
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn create(
        &self,
        stream: Arc<MediaStream>,
        format: &RecordingFormat,
    ) -> RecordingResult<Box<dyn MediaRecorder>>;
}
