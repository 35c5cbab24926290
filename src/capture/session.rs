//! Device session management
//!
//! Owns the single live capture stream: acquires it, binds it to the
//! preview surface once its metadata is known, and releases it again.

use super::stream::MediaStream;
use super::traits::{
    CaptureResult, MediaConstraints, MediaDevices, PreviewSurface, Resolution, StreamMetadata,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default time to wait for a new stream to report its metadata
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of the device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Acquiring,
    Live,
    Failed,
}

pub struct DeviceSessionManager {
    devices: Arc<dyn MediaDevices>,
    preview: Box<dyn PreviewSurface>,
    preferred_resolution: Resolution,
    preferred_frame_rate: u32,
    metadata_timeout: Duration,
    stream: Option<Arc<MediaStream>>,
    state: SessionState,
}

impl DeviceSessionManager {
    pub fn new(devices: Arc<dyn MediaDevices>, preview: Box<dyn PreviewSurface>) -> Self {
        Self {
            devices,
            preview,
            preferred_resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            preferred_frame_rate: 30,
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            stream: None,
            state: SessionState::Idle,
        }
    }

    pub fn with_preferred_format(mut self, resolution: Resolution, frame_rate: u32) -> Self {
        self.preferred_resolution = resolution;
        self.preferred_frame_rate = frame_rate;
        self
    }

    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The live stream, if any
    pub fn stream(&self) -> Option<Arc<MediaStream>> {
        self.stream.clone()
    }

    pub fn metadata(&self) -> Option<StreamMetadata> {
        self.stream.as_ref().and_then(|s| s.metadata())
    }

    pub fn devices(&self) -> &Arc<dyn MediaDevices> {
        &self.devices
    }

    /// Acquire a fresh stream, releasing the previous one first
    pub async fn start(&mut self, audio: bool) -> CaptureResult<Arc<MediaStream>> {
        self.release();
        self.state = SessionState::Acquiring;

        let constraints = MediaConstraints {
            preferred_resolution: self.preferred_resolution,
            preferred_frame_rate: self.preferred_frame_rate,
            audio,
        };
        tracing::info!(
            "Requesting camera {}x{}@{} (audio: {})",
            constraints.preferred_resolution.width,
            constraints.preferred_resolution.height,
            constraints.preferred_frame_rate,
            audio
        );

        let stream = match self.devices.get_user_media(&constraints).await {
            Ok(stream) => Arc::new(stream),
            Err(e) => {
                tracing::warn!("Camera acquisition failed: {}", e);
                self.state = SessionState::Failed;
                return Err(e);
            }
        };

        if let Err(e) = self.bind(stream.clone()).await {
            tracing::warn!("Failed to start preview for stream {}: {}", stream.id(), e);
            self.preview.detach();
            stream.stop();
            self.state = SessionState::Failed;
            return Err(e);
        }

        tracing::info!(
            "Camera stream {} live ({} tracks)",
            stream.id(),
            stream.tracks().len()
        );
        self.stream = Some(stream.clone());
        self.state = SessionState::Live;
        Ok(stream)
    }

    /// Wait for metadata, then hand the stream to the preview and play it
    async fn bind(&mut self, stream: Arc<MediaStream>) -> CaptureResult<()> {
        let metadata = stream.wait_for_metadata(self.metadata_timeout).await?;
        tracing::debug!(
            "Stream metadata ready: {}x{}@{} {:?}",
            metadata.width,
            metadata.height,
            metadata.frame_rate,
            metadata.pixel_format
        );

        self.preview.attach(stream);
        self.preview.play().await
    }

    /// Release the stream and unbind the preview
    pub fn stop(&mut self) {
        self.release();
        self.state = SessionState::Idle;
    }

    fn release(&mut self) {
        self.preview.detach();
        if let Some(stream) = self.stream.take() {
            tracing::info!("Releasing camera stream {}", stream.id());
            stream.stop();
        }
    }
}

impl Drop for DeviceSessionManager {
    fn drop(&mut self) {
        self.release();
    }
}
