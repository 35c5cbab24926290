//! Live capture stream
//!
//! A `MediaStream` owns its tracks: stopping the stream (or dropping the
//! last handle to it) stops every track.

use super::traits::{
    AudioChunk, CaptureError, CaptureResult, MediaTrack, StreamMetadata, TrackKind, VideoFrame,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Capacity of the frame/sample fan-out channels
pub const FEED_CAPACITY: usize = 8;

pub struct MediaStream {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
    metadata: watch::Receiver<Option<StreamMetadata>>,
    video_feed: Option<broadcast::Sender<VideoFrame>>,
    audio_feed: Option<broadcast::Sender<AudioChunk>>,
}

impl MediaStream {
    /// Create a stream from its tracks and a metadata channel that the
    /// backend fills once media starts flowing.
    pub fn new(
        tracks: Vec<Arc<dyn MediaTrack>>,
        metadata: watch::Receiver<Option<StreamMetadata>>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
            metadata,
            video_feed: None,
            audio_feed: None,
        }
    }

    pub fn with_video_feed(mut self, feed: broadcast::Sender<VideoFrame>) -> Self {
        self.video_feed = Some(feed);
        self
    }

    pub fn with_audio_feed(mut self, feed: broadcast::Sender<AudioChunk>) -> Self {
        self.audio_feed = Some(feed);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(|t| t.kind() == TrackKind::Audio)
    }

    pub fn has_video(&self) -> bool {
        self.tracks.iter().any(|t| t.kind() == TrackKind::Video)
    }

    /// Whether any track is still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(|t| t.is_live())
    }

    /// Metadata if already known
    pub fn metadata(&self) -> Option<StreamMetadata> {
        *self.metadata.borrow()
    }

    /// Wait until the stream reports its metadata
    pub async fn wait_for_metadata(&self, timeout: Duration) -> CaptureResult<StreamMetadata> {
        let mut rx = self.metadata.clone();
        let wait = async {
            loop {
                if let Some(metadata) = *rx.borrow_and_update() {
                    return Ok(metadata);
                }
                if rx.changed().await.is_err() {
                    return Err(CaptureError::Unknown(
                        "stream ended before metadata was available".to_string(),
                    ));
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(CaptureError::Unknown(format!(
                "timed out after {}ms waiting for stream metadata",
                timeout.as_millis()
            ))),
        }
    }

    /// Subscribe to video frames, if the backend provides a feed
    pub fn subscribe_video(&self) -> Option<broadcast::Receiver<VideoFrame>> {
        self.video_feed.as_ref().map(|f| f.subscribe())
    }

    /// Subscribe to audio samples, if the backend provides a feed
    pub fn subscribe_audio(&self) -> Option<broadcast::Receiver<AudioChunk>> {
        self.audio_feed.as_ref().map(|f| f.subscribe())
    }

    /// Stop every track
    pub fn stop(&self) {
        for track in &self.tracks {
            if track.is_live() {
                tracing::debug!("Stopping {:?} track '{}'", track.kind(), track.label());
            }
            track.stop();
        }
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("metadata", &self.metadata())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dyn_tracks, sample_metadata, FakeTrack};

    #[tokio::test]
    async fn test_drop_stops_tracks() {
        let video = FakeTrack::new(TrackKind::Video);
        let audio = FakeTrack::new(TrackKind::Audio);
        let (_tx, rx) = watch::channel(Some(sample_metadata()));
        let stream = MediaStream::new(dyn_tracks(&[video.clone(), audio.clone()]), rx);

        assert!(stream.has_audio());
        assert!(stream.is_active());
        drop(stream);

        assert!(!video.is_live());
        assert!(!audio.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_arrives_later() {
        let (tx, rx) = watch::channel(None);
        let stream = MediaStream::new(dyn_tracks(&[FakeTrack::new(TrackKind::Video)]), rx);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send(Some(sample_metadata()));
        });

        let metadata = stream
            .wait_for_metadata(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(metadata.width, 1280);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_timeout() {
        let (_tx, rx) = watch::channel(None);
        let stream = MediaStream::new(dyn_tracks(&[FakeTrack::new(TrackKind::Video)]), rx);

        let err = stream
            .wait_for_metadata(Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Unknown(_)));
    }
}
