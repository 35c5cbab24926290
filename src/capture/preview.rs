//! Preview surface backed by the stream's frame feed
//!
//! Keeps the most recent frame so the frontend can pull it for display.

use super::stream::MediaStream;
use super::traits::{CaptureError, CaptureResult, PreviewSurface, VideoFrame};
use crate::utils::task::ScheduledTask;
use async_trait::async_trait;
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Default)]
pub struct FrameSurface {
    stream: Option<Arc<MediaStream>>,
    latest: Arc<ParkingMutex<Option<VideoFrame>>>,
    frames_rendered: Arc<AtomicU64>,
    pump: Option<ScheduledTask>,
}

impl FrameSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the latest frame, shareable with the frontend bridge
    pub fn latest_frame_handle(&self) -> Arc<ParkingMutex<Option<VideoFrame>>> {
        self.latest.clone()
    }

    pub fn latest_frame(&self) -> Option<VideoFrame> {
        self.latest.lock().clone()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn is_playing(&self) -> bool {
        self.pump.as_ref().is_some_and(|p| p.is_active())
    }
}

#[async_trait]
impl PreviewSurface for FrameSurface {
    fn attach(&mut self, stream: Arc<MediaStream>) {
        self.detach();
        self.stream = Some(stream);
    }

    async fn play(&mut self) -> CaptureResult<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| CaptureError::Unknown("no stream attached to preview".to_string()))?;
        let mut frames = stream
            .subscribe_video()
            .ok_or_else(|| CaptureError::Unknown("stream has no video feed".to_string()))?;

        let latest = self.latest.clone();
        let rendered = self.frames_rendered.clone();
        let stream_id = stream.id().to_string();

        self.pump = Some(ScheduledTask::spawn("preview-pump", move |mut shutdown| async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    frame = frames.recv() => match frame {
                        Ok(frame) => {
                            *latest.lock() = Some(frame);
                            rendered.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!("Preview skipped {} frames", skipped);
                        }
                        Err(RecvError::Closed) => {
                            tracing::debug!("Video feed of stream {} closed", stream_id);
                            break;
                        }
                    }
                }
            }
        }));

        tracing::debug!("Preview playing");
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(mut pump) = self.pump.take() {
            pump.cancel();
        }
        if self.stream.take().is_some() {
            *self.latest.lock() = None;
            tracing::debug!("Preview detached");
        }
    }

    fn is_attached(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{PixelFormat, TrackKind, FEED_CAPACITY};
    use crate::testing::{dyn_tracks, sample_metadata, FakeTrack};
    use std::time::Duration;
    use tokio::sync::{broadcast, watch};

    #[tokio::test]
    async fn test_play_requires_video_feed() {
        let (_tx, rx) = watch::channel(Some(sample_metadata()));
        let stream = Arc::new(MediaStream::new(
            dyn_tracks(&[FakeTrack::new(TrackKind::Video)]),
            rx,
        ));

        let mut surface = FrameSurface::new();
        assert!(surface.play().await.is_err());

        surface.attach(stream);
        assert!(surface.play().await.is_err());
    }

    #[tokio::test]
    async fn test_keeps_latest_frame() {
        let (_tx, rx) = watch::channel(Some(sample_metadata()));
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        let stream = Arc::new(
            MediaStream::new(dyn_tracks(&[FakeTrack::new(TrackKind::Video)]), rx)
                .with_video_feed(feed.clone()),
        );

        let mut surface = FrameSurface::new();
        surface.attach(stream);
        surface.play().await.unwrap();
        assert!(surface.is_playing());

        for value in [1u8, 2, 3] {
            feed.send(VideoFrame {
                width: 2,
                height: 1,
                format: PixelFormat::Rgb,
                data: Arc::from(vec![value; 6]),
            })
            .unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(surface.frames_rendered(), 3);
        assert_eq!(surface.latest_frame().unwrap().data[0], 3);

        surface.detach();
        assert!(!surface.is_attached());
        assert!(surface.latest_frame().is_none());
    }
}
