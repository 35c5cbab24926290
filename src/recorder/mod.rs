//! Recording system module
//!
//! - Format negotiation over the recorder backend
//! - RecordingController owning the single recording session
//! - Download sinks for finished files
//! - FFmpeg recorder backend

pub mod backend;
pub mod controller;
pub mod download;
pub mod ffmpeg;
pub mod format;
pub mod state;

pub use backend::{MediaRecorder, RecorderFactory, RecordingError, RecordingResult};
pub use controller::{RecordingController, RecordingEvent, DEFAULT_FLUSH_INTERVAL};
pub use download::{DirectoryDownloads, DownloadSink, RecordingFile};
pub use ffmpeg::{FfmpegRecorder, FfmpegRecorderFactory};
pub use format::{Container, RecordingFormat, PREFERRED_MIME_TYPES};
pub use state::{RecordingSegment, RecordingState, SavedRecording};
