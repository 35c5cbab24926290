//! The camera viewfinder component
//!
//! Ties the device session, the recording controller, the overlay and the
//! status surface together. Owned behind one async mutex by the shell, so
//! every operation runs with exclusive access.

use super::status::{StatusSurface, ViewStatus};
use crate::capture::{
    CaptureResult, DeviceSessionManager, MediaDevices, PreviewSurface, SessionState,
    StreamMetadata,
};
use crate::config::ViewfinderConfig;
use crate::overlay::{OverlayCompositor, OverlaySnapshot};
use crate::recorder::{
    DownloadSink, RecorderFactory, RecordingController, RecordingEvent, RecordingResult,
    RecordingState, SavedRecording,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Platform services the viewfinder runs on
pub struct Backends {
    pub devices: Arc<dyn MediaDevices>,
    pub preview: Box<dyn PreviewSurface>,
    pub recorders: Arc<dyn RecorderFactory>,
    pub downloads: Arc<dyn DownloadSink>,
}

/// Everything the frontend renders
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub mounted: bool,
    pub session: SessionState,
    pub metadata: Option<StreamMetadata>,
    pub audio_enabled: bool,
    pub recording: RecordingState,
    pub recording_mime_type: Option<String>,
    pub recording_duration_ms: f64,
    /// Recording kept in memory after its save failed
    pub unsaved_recording: Option<String>,
    pub status: ViewStatus,
    pub overlay: OverlaySnapshot,
}

pub struct CameraViewfinder {
    session: DeviceSessionManager,
    recorder: RecordingController,
    overlay: OverlayCompositor,
    status: StatusSurface,
    audio_enabled: bool,
    /// Re-acquire once the current recording ends
    reacquire_pending: bool,
    mounted: bool,
}

impl CameraViewfinder {
    pub fn new(config: &ViewfinderConfig, backends: Backends) -> Self {
        let session = DeviceSessionManager::new(backends.devices, backends.preview)
            .with_preferred_format(config.preferred_resolution(), config.preferred_frame_rate)
            .with_metadata_timeout(config.metadata_timeout());
        let recorder = RecordingController::new(backends.recorders, backends.downloads)
            .with_flush_interval(config.flush_interval());

        Self {
            session,
            recorder,
            overlay: OverlayCompositor::new(config.strobe_interval_ms),
            status: StatusSurface::default(),
            audio_enabled: config.audio_enabled,
            reacquire_pending: false,
            mounted: false,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &DeviceSessionManager {
        &self.session
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recorder.state()
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn status(&self) -> ViewStatus {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ViewStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_recording(&self) -> broadcast::Receiver<RecordingEvent> {
        self.recorder.subscribe()
    }

    pub fn dismiss_error(&self) {
        self.status.dismiss();
    }

    pub fn overlay(&self) -> &OverlayCompositor {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut OverlayCompositor {
        &mut self.overlay
    }

    // Lifecycle

    /// Acquire the camera and start the preview
    pub async fn mount(&mut self) -> CaptureResult<()> {
        self.mounted = true;
        tracing::info!("Mounting viewfinder");
        self.reacquire().await
    }

    /// Discard any recording, release the camera and stop overlay timers
    pub async fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        tracing::info!("Unmounting viewfinder");

        self.mounted = false;
        self.reacquire_pending = false;
        self.recorder.discard().await;
        self.session.stop();
        self.overlay.shutdown();
    }

    /// Try acquisition again after a failure
    pub async fn retry(&mut self) -> CaptureResult<()> {
        tracing::info!("Retrying camera acquisition");
        self.status.dismiss();
        self.mounted = true;
        self.reacquire().await
    }

    /// Re-acquire the stream
    pub async fn refresh(&mut self) -> CaptureResult<()> {
        self.reacquire().await
    }

    /// Change whether the microphone is captured.
    ///
    /// During a recording the change is applied once the recording stops.
    pub async fn set_audio_enabled(&mut self, enabled: bool) -> CaptureResult<()> {
        if self.audio_enabled == enabled {
            return Ok(());
        }
        tracing::info!("Audio {}", if enabled { "enabled" } else { "disabled" });
        self.audio_enabled = enabled;

        if !self.mounted {
            return Ok(());
        }
        self.refresh().await
    }

    /// Acquire now, or once the current recording stops. The recorder
    /// holds the live stream, so it is never replaced mid-recording.
    async fn reacquire(&mut self) -> CaptureResult<()> {
        if self.recorder.is_active() {
            tracing::debug!("Re-acquisition deferred until recording stops");
            self.reacquire_pending = true;
            return Ok(());
        }
        self.acquire().await
    }

    async fn acquire(&mut self) -> CaptureResult<()> {
        self.reacquire_pending = false;
        self.status.begin_loading();

        match self.session.start(self.audio_enabled).await {
            Ok(_) => {
                self.status.succeed();
                Ok(())
            }
            Err(e) => {
                self.status.fail(&e);
                Err(e)
            }
        }
    }

    // Recording

    pub async fn start_recording(&mut self) -> RecordingResult<String> {
        let result = self.recorder.start(self.session.stream()).await;
        self.report(result.map(|format| format.mime_type))
    }

    /// Stop, save the file, then apply any deferred re-acquisition
    pub async fn stop_recording(&mut self) -> RecordingResult<SavedRecording> {
        let result = self.recorder.stop().await;
        let result = self.report(result);

        if self.reacquire_pending && self.mounted {
            // failures land on the status surface
            let _ = self.acquire().await;
        }
        result
    }

    /// Save again a recording whose save failed
    pub fn retry_save(&mut self) -> RecordingResult<SavedRecording> {
        let result = self.recorder.retry_save();
        self.report(result)
    }

    pub async fn toggle_pause(&mut self) -> RecordingResult<RecordingState> {
        let result = self.recorder.toggle_pause().await;
        self.report(result)
    }

    pub async fn pause_recording(&mut self) -> RecordingResult<RecordingState> {
        let result = self.recorder.pause().await;
        self.report(result)
    }

    pub async fn resume_recording(&mut self) -> RecordingResult<RecordingState> {
        let result = self.recorder.resume().await;
        self.report(result)
    }

    fn report<T>(&self, result: RecordingResult<T>) -> RecordingResult<T> {
        if let Err(e) = &result {
            self.status.fail(e);
        }
        result
    }

    pub fn view_state(&self) -> ViewState {
        ViewState {
            mounted: self.mounted,
            session: self.session.state(),
            metadata: self.session.metadata(),
            audio_enabled: self.audio_enabled,
            recording: self.recorder.state(),
            recording_mime_type: self.recorder.format().map(|f| f.mime_type.clone()),
            recording_duration_ms: self.recorder.duration_ms(),
            unsaved_recording: self.recorder.unsaved_filename().map(str::to_string),
            status: self.status.current(),
            overlay: self.overlay.snapshot(),
        }
    }
}

impl Drop for CameraViewfinder {
    fn drop(&mut self) {
        if self.mounted {
            tracing::debug!("Viewfinder dropped while mounted, releasing devices");
            self.session.stop();
            self.overlay.shutdown();
        }
    }
}
