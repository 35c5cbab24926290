//! Capture trait definitions
//!
//! Platform-agnostic traits for capture sources, the preview surface and the
//! shared capture types.

use super::stream::MediaStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Kind of a capture track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// A single live capture track (camera or microphone)
pub trait MediaTrack: Send + Sync {
    /// Kind of media this track carries
    fn kind(&self) -> TrackKind;

    /// Human readable device label
    fn label(&self) -> &str;

    /// Stop the track and release the underlying device.
    ///
    /// Must be idempotent.
    fn stop(&self);

    /// Whether the track is still delivering media
    fn is_live(&self) -> bool;
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Constraints passed to a device acquisition request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConstraints {
    /// Preferred (not exact) capture resolution
    pub preferred_resolution: Resolution,

    /// Preferred frame rate
    pub preferred_frame_rate: u32,

    /// Whether a microphone track is requested
    pub audio: bool,
}

/// Raw pixel layout of delivered video frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Yuyv,
    Nv12,
    Rgb,
    Rgba,
    Mjpeg,
}

impl PixelFormat {
    /// FFmpeg name of this pixel layout, `None` for compressed frames
    pub fn ffmpeg_pix_fmt(&self) -> Option<&'static str> {
        match self {
            PixelFormat::Yuyv => Some("yuyv422"),
            PixelFormat::Nv12 => Some("nv12"),
            PixelFormat::Rgb => Some("rgb24"),
            PixelFormat::Rgba => Some("rgba"),
            PixelFormat::Mjpeg => None,
        }
    }
}

/// Metadata that becomes available once the stream delivers media
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub pixel_format: PixelFormat,
    /// Sample rate of the audio track, if any
    pub sample_rate: Option<u32>,
    /// Channel count of the audio track, if any
    pub channels: Option<u16>,
}

/// One captured video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Arc<[u8]>,
}

/// A block of interleaved f32 audio samples
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Arc<[f32]>,
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Supported resolutions
    pub supported_resolutions: Vec<Resolution>,
}

/// Device acquisition errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device busy: {0}")]
    DeviceBusy(String),

    #[error("Capture not supported: {0}")]
    Unsupported(String),

    #[error("Capture error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Classify a backend failure message into the capture taxonomy
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("permission")
            || lower.contains("denied")
            || lower.contains("not authorized")
            || lower.contains("notallowed")
        {
            CaptureError::PermissionDenied(message)
        } else if lower.contains("not found")
            || lower.contains("no such device")
            || lower.contains("no device")
        {
            CaptureError::DeviceNotFound(message)
        } else if lower.contains("busy")
            || lower.contains("in use")
            || lower.contains("notreadable")
            || lower.contains("could not start")
        {
            CaptureError::DeviceBusy(message)
        } else if lower.contains("not supported") || lower.contains("unsupported") {
            CaptureError::Unsupported(message)
        } else {
            CaptureError::Unknown(message)
        }
    }

    /// Stable code reported to the frontend
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied(_) => "PERMISSION_DENIED",
            CaptureError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            CaptureError::DeviceBusy(_) => "DEVICE_BUSY",
            CaptureError::Unsupported(_) => "UNSUPPORTED",
            CaptureError::Unknown(_) => "UNKNOWN",
        }
    }

    /// Message shown in the error dialog
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::PermissionDenied(_) => {
                "Please grant camera/audio permission and try again.".to_string()
            }
            CaptureError::DeviceNotFound(_) => {
                "No camera or microphone found. Please connect a device and try again.".to_string()
            }
            CaptureError::DeviceBusy(_) => {
                "Camera or microphone is already in use by another application.".to_string()
            }
            CaptureError::Unsupported(_) => {
                "Camera access is not supported on this system.".to_string()
            }
            CaptureError::Unknown(detail) => format!("Failed to access camera: {detail}"),
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Source of capture streams
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire a camera stream (plus microphone when requested).
    ///
    /// Implementations release anything they opened before returning an
    /// error.
    async fn get_user_media(&self, constraints: &MediaConstraints) -> CaptureResult<MediaStream>;

    /// List the available cameras
    fn cameras(&self) -> Vec<CameraInfo> {
        Vec::new()
    }
}

/// Surface that renders the live stream
#[async_trait]
pub trait PreviewSurface: Send {
    /// Bind a stream to the surface
    fn attach(&mut self, stream: Arc<MediaStream>);

    /// Begin rendering the bound stream
    async fn play(&mut self) -> CaptureResult<()>;

    /// Unbind the current stream, if any
    fn detach(&mut self);

    fn is_attached(&self) -> bool;
}
