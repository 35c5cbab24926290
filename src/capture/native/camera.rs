//! Camera capture using nokhwa

use super::ThreadTrack;
use crate::utils::task::join_thread;
use crate::capture::stream::FEED_CAPACITY;
use crate::capture::traits::{
    CameraInfo, CaptureError, CaptureResult, MediaConstraints, PixelFormat, Resolution,
    StreamMetadata, TrackKind, VideoFrame,
};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution as CameraResolution,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, watch};

/// Get list of available cameras
pub fn get_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };

                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                    supported_resolutions: vec![
                        Resolution { width: 1920, height: 1080 },
                        Resolution { width: 1280, height: 720 },
                        Resolution { width: 640, height: 480 },
                    ],
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

pub(super) struct OpenedCamera {
    pub track: Arc<ThreadTrack>,
    pub feed: broadcast::Sender<VideoFrame>,
    pub metadata: watch::Receiver<Option<StreamMetadata>>,
}

fn camera_index(camera_id: Option<String>) -> CameraIndex {
    match camera_id {
        Some(id) => match id.parse::<u32>() {
            Ok(idx) => CameraIndex::Index(idx),
            Err(_) => CameraIndex::String(id),
        },
        None => CameraIndex::Index(0),
    }
}

fn pixel_format(format: FrameFormat) -> PixelFormat {
    match format {
        FrameFormat::YUYV => PixelFormat::Yuyv,
        FrameFormat::NV12 => PixelFormat::Nv12,
        FrameFormat::RAWRGB => PixelFormat::Rgb,
        FrameFormat::MJPEG => PixelFormat::Mjpeg,
        other => {
            tracing::warn!("Unknown camera format {:?}, treating as yuyv422", other);
            PixelFormat::Yuyv
        }
    }
}

/// Open the camera on a capture thread.
///
/// Metadata is published with the first delivered frame. `audio` carries
/// the microphone's sample rate and channel count when one is open.
pub(super) async fn open_camera(
    camera_id: Option<String>,
    constraints: &MediaConstraints,
    audio: Option<(u32, u16)>,
) -> CaptureResult<OpenedCamera> {
    let index = camera_index(camera_id);
    let requested = CameraFormat::new(
        CameraResolution::new(
            constraints.preferred_resolution.width,
            constraints.preferred_resolution.height,
        ),
        FrameFormat::YUYV,
        constraints.preferred_frame_rate,
    );

    let live = Arc::new(AtomicBool::new(true));
    let (feed, _) = broadcast::channel(FEED_CAPACITY);
    let (metadata_tx, metadata_rx) = watch::channel(None);
    let (ready_tx, ready_rx) = oneshot::channel::<CaptureResult<String>>();

    let thread_live = live.clone();
    let thread_feed = feed.clone();
    let handle = std::thread::spawn(move || {
        let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(requested));
        let mut camera = match Camera::new(index.clone(), format) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Failed to open camera {:?}: {:?}", index, e);
                thread_live.store(false, Ordering::SeqCst);
                let _ = ready_tx.send(Err(CaptureError::classify(e.to_string())));
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            tracing::error!("Failed to open camera stream: {:?}", e);
            thread_live.store(false, Ordering::SeqCst);
            let _ = ready_tx.send(Err(CaptureError::classify(e.to_string())));
            return;
        }

        let camera_format = camera.camera_format();
        let width = camera_format.resolution().width();
        let height = camera_format.resolution().height();
        let frame_rate = camera_format.frame_rate();
        let format = pixel_format(camera_format.format());

        tracing::info!(
            "Camera opened: {}x{} @ {}fps, format={:?} (requested {}x{} @ {}fps)",
            width,
            height,
            frame_rate,
            format,
            requested.resolution().width(),
            requested.resolution().height(),
            requested.frame_rate()
        );
        let _ = ready_tx.send(Ok(camera.info().human_name().to_string()));

        let mut frame_count: u64 = 0;
        let capture_start = std::time::Instant::now();

        while thread_live.load(Ordering::SeqCst) {
            // blocks until the camera delivers the next frame
            match camera.frame() {
                Ok(buffer) => {
                    if frame_count == 0 {
                        tracing::debug!("First camera frame: {} bytes", buffer.buffer().len());
                        metadata_tx.send_replace(Some(StreamMetadata {
                            width,
                            height,
                            frame_rate,
                            pixel_format: format,
                            sample_rate: audio.map(|(rate, _)| rate),
                            channels: audio.map(|(_, channels)| channels),
                        }));
                    }
                    frame_count += 1;

                    // no receivers is fine
                    let _ = thread_feed.send(VideoFrame {
                        width,
                        height,
                        format,
                        data: Arc::from(buffer.buffer()),
                    });
                }
                Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
            }
        }

        let elapsed = capture_start.elapsed().as_secs_f64();
        tracing::info!(
            "Camera delivered {} frames in {:.2}s ({:.1} fps)",
            frame_count,
            elapsed,
            frame_count as f64 / elapsed.max(f64::EPSILON)
        );

        if let Err(e) = camera.stop_stream() {
            tracing::warn!("Error stopping camera stream: {:?}", e);
        }
    });

    let label = match ready_rx.await {
        Ok(Ok(label)) => label,
        Ok(Err(e)) => {
            let _ = join_thread(handle);
            return Err(e);
        }
        Err(_) => {
            let _ = join_thread(handle);
            return Err(CaptureError::Unknown(
                "camera thread exited before opening the device".to_string(),
            ));
        }
    };

    Ok(OpenedCamera {
        track: Arc::new(ThreadTrack::new(TrackKind::Video, label, live, handle)),
        feed,
        metadata: metadata_rx,
    })
}
