//! Viewfinder Tauri commands

use crate::capture::native::NativeMediaDevices;
use crate::capture::{encode_frame, CameraInfo, FrameSurface, MediaDevices, VideoFrame};
use crate::config::ViewfinderConfig;
use crate::overlay::{catalog, FilterDescriptor, ImageFile, OverlayImage, OverlayStyle};
use crate::recorder::{DirectoryDownloads, FfmpegRecorderFactory, RecordingState, SavedRecording};
use crate::utils::error::ErrorResponse;
use crate::viewfinder::{Backends, CameraViewfinder, ViewState, ViewStatus};
use parking_lot::Mutex as ParkingMutex;
use std::path::PathBuf;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State};
use tauri_plugin_dialog::DialogExt;
use tokio::sync::{oneshot, Mutex};

pub const STATUS_EVENT: &str = "viewfinder://status";
pub const OVERLAY_VISIBLE_EVENT: &str = "viewfinder://overlay-visible";
pub const RECORDING_EVENT: &str = "viewfinder://recording";

const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "avif"];

type CommandResult<T> = Result<T, ErrorResponse>;

/// Application state for the viewfinder
pub struct ViewfinderState {
    pub viewfinder: Arc<Mutex<CameraViewfinder>>,
    pub devices: Arc<dyn MediaDevices>,
    preview: Arc<ParkingMutex<Option<VideoFrame>>>,
}

impl ViewfinderState {
    pub fn new(config: &ViewfinderConfig, downloads_dir: PathBuf) -> Self {
        let devices: Arc<dyn MediaDevices> = Arc::new(NativeMediaDevices::default());
        let surface = FrameSurface::new();
        let preview = surface.latest_frame_handle();

        tracing::info!("Recordings will be saved to {:?}", downloads_dir);
        let viewfinder = CameraViewfinder::new(
            config,
            Backends {
                devices: devices.clone(),
                preview: Box::new(surface),
                recorders: Arc::new(FfmpegRecorderFactory::probe()),
                downloads: Arc::new(DirectoryDownloads::new(downloads_dir)),
            },
        );

        Self {
            viewfinder: Arc::new(Mutex::new(viewfinder)),
            devices,
            preview,
        }
    }

    /// Forward status, overlay visibility and recording events to the webview
    pub async fn forward_events(&self, app: AppHandle) {
        let viewfinder = self.viewfinder.lock().await;
        let mut status = viewfinder.subscribe_status();
        let mut visible = viewfinder.overlay().subscribe_visibility();
        let mut recording = viewfinder.subscribe_recording();
        drop(viewfinder);

        let status_app = app.clone();
        tauri::async_runtime::spawn(async move {
            while status.changed().await.is_ok() {
                let current: ViewStatus = status.borrow_and_update().clone();
                if let Err(e) = status_app.emit(STATUS_EVENT, current) {
                    tracing::warn!("Failed to emit status: {}", e);
                }
            }
        });

        let visible_app = app.clone();
        tauri::async_runtime::spawn(async move {
            while visible.changed().await.is_ok() {
                let current = *visible.borrow_and_update();
                let _ = visible_app.emit(OVERLAY_VISIBLE_EVENT, current);
            }
        });

        tauri::async_runtime::spawn(async move {
            use tokio::sync::broadcast::error::RecvError;
            loop {
                match recording.recv().await {
                    Ok(event) => {
                        if let Err(e) = app.emit(RECORDING_EVENT, event) {
                            tracing::warn!("Failed to emit recording event: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

// Lifecycle

#[tauri::command]
pub async fn mount_viewfinder(state: State<'_, ViewfinderState>) -> CommandResult<ViewState> {
    let mut viewfinder = state.viewfinder.lock().await;
    viewfinder.mount().await?;
    Ok(viewfinder.view_state())
}

#[tauri::command]
pub async fn unmount_viewfinder(state: State<'_, ViewfinderState>) -> CommandResult<()> {
    state.viewfinder.lock().await.unmount().await;
    Ok(())
}

#[tauri::command]
pub async fn retry_camera(state: State<'_, ViewfinderState>) -> CommandResult<ViewState> {
    let mut viewfinder = state.viewfinder.lock().await;
    viewfinder.retry().await?;
    Ok(viewfinder.view_state())
}

#[tauri::command]
pub async fn refresh_camera(state: State<'_, ViewfinderState>) -> CommandResult<ViewState> {
    let mut viewfinder = state.viewfinder.lock().await;
    viewfinder.refresh().await?;
    Ok(viewfinder.view_state())
}

#[tauri::command]
pub async fn set_audio_enabled(
    state: State<'_, ViewfinderState>,
    enabled: bool,
) -> CommandResult<ViewState> {
    let mut viewfinder = state.viewfinder.lock().await;
    viewfinder.set_audio_enabled(enabled).await?;
    Ok(viewfinder.view_state())
}

#[tauri::command]
pub async fn dismiss_error(state: State<'_, ViewfinderState>) -> CommandResult<()> {
    state.viewfinder.lock().await.dismiss_error();
    Ok(())
}

#[tauri::command]
pub async fn get_view_state(state: State<'_, ViewfinderState>) -> CommandResult<ViewState> {
    Ok(state.viewfinder.lock().await.view_state())
}

/// Latest preview frame as a data URI
#[tauri::command]
pub async fn get_preview_frame(state: State<'_, ViewfinderState>) -> CommandResult<Option<String>> {
    let frame = state.preview.lock().clone();
    Ok(frame.as_ref().and_then(encode_frame).map(|f| f.data_uri()))
}

#[tauri::command]
pub async fn get_cameras(state: State<'_, ViewfinderState>) -> CommandResult<Vec<CameraInfo>> {
    let devices = state.devices.clone();
    tauri::async_runtime::spawn_blocking(move || devices.cameras())
        .await
        .map_err(|e| ErrorResponse {
            code: "UNKNOWN".to_string(),
            message: e.to_string(),
        })
}

// Recording

#[tauri::command]
pub async fn start_recording(state: State<'_, ViewfinderState>) -> CommandResult<String> {
    Ok(state.viewfinder.lock().await.start_recording().await?)
}

#[tauri::command]
pub async fn stop_recording(state: State<'_, ViewfinderState>) -> CommandResult<SavedRecording> {
    Ok(state.viewfinder.lock().await.stop_recording().await?)
}

#[tauri::command]
pub async fn retry_save_recording(
    state: State<'_, ViewfinderState>,
) -> CommandResult<SavedRecording> {
    Ok(state.viewfinder.lock().await.retry_save()?)
}

#[tauri::command]
pub async fn toggle_pause(state: State<'_, ViewfinderState>) -> CommandResult<RecordingState> {
    Ok(state.viewfinder.lock().await.toggle_pause().await?)
}

#[tauri::command]
pub async fn pause_recording(state: State<'_, ViewfinderState>) -> CommandResult<RecordingState> {
    Ok(state.viewfinder.lock().await.pause_recording().await?)
}

#[tauri::command]
pub async fn resume_recording(state: State<'_, ViewfinderState>) -> CommandResult<RecordingState> {
    Ok(state.viewfinder.lock().await.resume_recording().await?)
}

// Overlay

/// Show a file picker and load the chosen image
#[tauri::command]
pub async fn pick_overlay_image(
    app: AppHandle,
    state: State<'_, ViewfinderState>,
) -> CommandResult<Option<OverlayImage>> {
    let (tx, rx) = oneshot::channel();
    app.dialog()
        .file()
        .add_filter("Images", &IMAGE_EXTENSIONS)
        .pick_file(move |path| {
            let _ = tx.send(path);
        });

    let Some(path) = rx.await.ok().flatten() else {
        return Ok(None);
    };
    let Some(path) = path.as_path().map(PathBuf::from) else {
        return Err(ErrorResponse {
            code: "NOT_AN_IMAGE".to_string(),
            message: "The selected item is not a local file.".to_string(),
        });
    };

    let file = ImageFile::read(&path)?;
    load_into(&state, file).await.map(Some)
}

async fn load_into(state: &ViewfinderState, file: ImageFile) -> CommandResult<OverlayImage> {
    let mut viewfinder = state.viewfinder.lock().await;
    let image = viewfinder.overlay_mut().load_image(file)?;
    Ok(image.clone())
}

#[tauri::command]
pub async fn load_overlay_image(
    state: State<'_, ViewfinderState>,
    path: String,
) -> CommandResult<OverlayImage> {
    let file = ImageFile::read(&PathBuf::from(path))?;
    load_into(&state, file).await
}

/// Load an image the webview already read (drag and drop)
#[tauri::command]
pub async fn load_overlay_file(
    state: State<'_, ViewfinderState>,
    file: ImageFile,
) -> CommandResult<OverlayImage> {
    load_into(&state, file).await
}

#[tauri::command]
pub async fn remove_overlay_image(state: State<'_, ViewfinderState>) -> CommandResult<()> {
    state.viewfinder.lock().await.overlay_mut().remove_image();
    Ok(())
}

#[tauri::command]
pub async fn overlay_pointer_down(
    state: State<'_, ViewfinderState>,
    x: f64,
    y: f64,
) -> CommandResult<bool> {
    Ok(state.viewfinder.lock().await.overlay_mut().pointer_down(x, y))
}

#[tauri::command]
pub async fn overlay_pointer_move(
    state: State<'_, ViewfinderState>,
    x: f64,
    y: f64,
) -> CommandResult<OverlayStyle> {
    let mut viewfinder = state.viewfinder.lock().await;
    viewfinder.overlay_mut().pointer_move(x, y);
    Ok(viewfinder.overlay().style())
}

#[tauri::command]
pub async fn overlay_pointer_up(state: State<'_, ViewfinderState>) -> CommandResult<()> {
    state.viewfinder.lock().await.overlay_mut().pointer_up();
    Ok(())
}

#[tauri::command]
pub async fn overlay_wheel(state: State<'_, ViewfinderState>, delta_y: f64) -> CommandResult<f64> {
    Ok(state.viewfinder.lock().await.overlay_mut().wheel(delta_y))
}

#[tauri::command]
pub async fn overlay_zoom_in(state: State<'_, ViewfinderState>) -> CommandResult<f64> {
    Ok(state.viewfinder.lock().await.overlay_mut().zoom_in())
}

#[tauri::command]
pub async fn overlay_zoom_out(state: State<'_, ViewfinderState>) -> CommandResult<f64> {
    Ok(state.viewfinder.lock().await.overlay_mut().zoom_out())
}

#[tauri::command]
pub async fn reset_overlay_transform(state: State<'_, ViewfinderState>) -> CommandResult<()> {
    state.viewfinder.lock().await.overlay_mut().reset_transform();
    Ok(())
}

#[tauri::command]
pub async fn set_overlay_opacity(
    state: State<'_, ViewfinderState>,
    opacity: f64,
) -> CommandResult<f64> {
    Ok(state.viewfinder.lock().await.overlay_mut().set_opacity(opacity))
}

#[tauri::command]
pub async fn list_overlay_filters() -> CommandResult<Vec<FilterDescriptor>> {
    Ok(catalog())
}

#[tauri::command]
pub async fn set_overlay_filter(
    state: State<'_, ViewfinderState>,
    name: String,
) -> CommandResult<OverlayStyle> {
    let mut viewfinder = state.viewfinder.lock().await;
    if viewfinder.overlay_mut().select_filter(&name).is_none() {
        tracing::warn!("Unknown filter '{}'", name);
    }
    Ok(viewfinder.overlay().style())
}

#[tauri::command]
pub async fn set_strobe_enabled(
    state: State<'_, ViewfinderState>,
    enabled: bool,
) -> CommandResult<()> {
    state
        .viewfinder
        .lock()
        .await
        .overlay_mut()
        .set_strobe_enabled(enabled);
    Ok(())
}

#[tauri::command]
pub async fn set_strobe_interval(
    state: State<'_, ViewfinderState>,
    interval_ms: u64,
) -> CommandResult<u64> {
    Ok(state
        .viewfinder
        .lock()
        .await
        .overlay_mut()
        .set_strobe_interval(interval_ms))
}

#[tauri::command]
pub async fn get_overlay_style(state: State<'_, ViewfinderState>) -> CommandResult<OverlayStyle> {
    Ok(state.viewfinder.lock().await.overlay().style())
}
