//! Native capture backends
//!
//! Camera frames come from nokhwa and microphone samples from cpal. Each
//! device runs on its own OS thread, which is stopped and joined when its
//! track is stopped.

mod camera;
mod microphone;

pub use camera::get_cameras;

use super::stream::MediaStream;
use crate::utils::task::join_thread;
use super::traits::{
    CameraInfo, CaptureError, CaptureResult, MediaConstraints, MediaDevices, MediaTrack,
    TrackKind,
};
use async_trait::async_trait;
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A track backed by a capture thread
pub struct ThreadTrack {
    kind: TrackKind,
    label: String,
    live: Arc<AtomicBool>,
    thread: ParkingMutex<Option<JoinHandle<()>>>,
}

impl ThreadTrack {
    fn new(kind: TrackKind, label: String, live: Arc<AtomicBool>, thread: JoinHandle<()>) -> Self {
        Self {
            kind,
            label,
            live,
            thread: ParkingMutex::new(Some(thread)),
        }
    }
}

impl MediaTrack for ThreadTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if join_thread(handle).is_err() {
                tracing::warn!("{:?} capture thread panicked", self.kind);
            }
            tracing::info!("{:?} track '{}' stopped", self.kind, self.label);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Camera + microphone through nokhwa and cpal
#[derive(Debug, Default, Clone)]
pub struct NativeMediaDevices {
    /// Camera index or name; first camera when unset
    camera_id: Option<String>,
}

impl NativeMediaDevices {
    pub fn new(camera_id: Option<String>) -> Self {
        Self { camera_id }
    }
}

#[async_trait]
impl MediaDevices for NativeMediaDevices {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> CaptureResult<MediaStream> {
        if get_cameras().is_empty() {
            return Err(CaptureError::DeviceNotFound("No cameras found".to_string()));
        }

        let microphone = if constraints.audio {
            Some(microphone::open_microphone().await?)
        } else {
            None
        };

        let audio_format = microphone
            .as_ref()
            .map(|mic| (mic.sample_rate, mic.channels));
        let camera = match camera::open_camera(self.camera_id.clone(), constraints, audio_format).await
        {
            Ok(camera) => camera,
            Err(e) => {
                if let Some(mic) = &microphone {
                    mic.track.stop();
                }
                return Err(e);
            }
        };

        let mut tracks: Vec<Arc<dyn MediaTrack>> = vec![camera.track as Arc<dyn MediaTrack>];
        let mut audio_feed = None;
        if let Some(mic) = microphone {
            tracks.push(mic.track);
            audio_feed = Some(mic.feed);
        }

        let mut stream = MediaStream::new(tracks, camera.metadata).with_video_feed(camera.feed);
        if let Some(feed) = audio_feed {
            stream = stream.with_audio_feed(feed);
        }
        Ok(stream)
    }

    fn cameras(&self) -> Vec<CameraInfo> {
        get_cameras()
    }
}
