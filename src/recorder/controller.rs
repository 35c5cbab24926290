//! Recording controller
//!
//! Wraps the live stream in a recording session, flushes recorder output
//! into a chunk buffer on a fixed interval and turns the buffer into one
//! downloadable file on stop.

use super::backend::{MediaRecorder, RecorderFactory, RecordingError, RecordingResult};
use super::download::{DownloadSink, RecordingFile};
use super::format::{negotiate, RecordingFormat};
use super::state::{RecordingSegment, RecordingState, SavedRecording};
use crate::capture::MediaStream;
use crate::utils::task::ScheduledTask;
use chrono::Utc;
use parking_lot::Mutex as ParkingMutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Default interval at which recorder output is moved into the buffer
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Events emitted during recording
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum RecordingEvent {
    /// Recording started with the given MIME type
    Started(String),
    /// Recording stopped and saved
    Stopped(SavedRecording),
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// Error occurred
    Error(String),
}

type SharedRecorder = Arc<Mutex<Box<dyn MediaRecorder>>>;
type ChunkBuffer = Arc<ParkingMutex<Vec<Vec<u8>>>>;

/// State of one in-progress recording
struct RecordingSession {
    format: RecordingFormat,
    recorder: SharedRecorder,
    chunks: ChunkBuffer,
    flush: ScheduledTask,
    state: RecordingState,
    segments: Vec<RecordingSegment>,
    started_at: Instant,
}

impl RecordingSession {
    fn offset_ms(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() * 1000.0
    }

    fn duration_ms(&self) -> f64 {
        let completed: f64 = self
            .segments
            .iter()
            .take(self.segments.len().saturating_sub(1))
            .map(|s| s.duration_ms)
            .sum();

        let current = match (self.state, self.segments.last()) {
            (RecordingState::Recording, Some(s)) => self.offset_ms() - s.start_offset_ms,
            (_, Some(s)) => s.duration_ms,
            (_, None) => 0.0,
        };

        completed + current
    }
}

/// A finished recording the sink has not accepted yet
struct UnsavedRecording {
    file: RecordingFile,
    duration_ms: f64,
    segment_count: usize,
}

pub struct RecordingController {
    factory: Arc<dyn RecorderFactory>,
    sink: Arc<dyn DownloadSink>,
    flush_interval: Duration,
    session: Option<RecordingSession>,
    /// Last recording whose save failed; replaced by the next failure
    unsaved: Option<UnsavedRecording>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingController {
    pub fn new(factory: Arc<dyn RecorderFactory>, sink: Arc<dyn DownloadSink>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            factory,
            sink,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            session: None,
            unsaved: None,
            event_tx,
        }
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(RecordingState::Idle)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Format of the active recording
    pub fn format(&self) -> Option<&RecordingFormat> {
        self.session.as_ref().map(|s| &s.format)
    }

    /// Recorded time so far, excluding pauses
    pub fn duration_ms(&self) -> f64 {
        self.session.as_ref().map(|s| s.duration_ms()).unwrap_or(0.0)
    }

    /// Number of chunks flushed into the buffer so far
    pub fn buffered_chunks(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.chunks.lock().len())
            .unwrap_or(0)
    }

    /// File name of a recording still waiting to be saved
    pub fn unsaved_filename(&self) -> Option<&str> {
        self.unsaved.as_ref().map(|u| u.file.filename.as_str())
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Start recording the given stream
    pub async fn start(&mut self, stream: Option<Arc<MediaStream>>) -> RecordingResult<RecordingFormat> {
        if self.session.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let stream = stream
            .filter(|s| s.is_active())
            .ok_or(RecordingError::NoActiveStream)?;

        let format = negotiate(self.factory.as_ref()).ok_or(RecordingError::NoSupportedFormat)?;

        tracing::info!(
            "Starting recording of stream {} as {}",
            stream.id(),
            format.mime_type
        );

        let recorder: SharedRecorder = Arc::new(Mutex::new(self.factory.create(stream, &format)?));
        let chunks: ChunkBuffer = Arc::new(ParkingMutex::new(Vec::new()));
        let flush = spawn_flush(recorder.clone(), chunks.clone(), self.flush_interval);

        let started_at = Instant::now();
        self.session = Some(RecordingSession {
            format: format.clone(),
            recorder,
            chunks,
            flush,
            state: RecordingState::Recording,
            segments: vec![RecordingSegment::new(0, 0.0)],
            started_at,
        });

        let _ = self
            .event_tx
            .send(RecordingEvent::Started(format.mime_type.clone()));
        Ok(format)
    }

    /// Stop recording and save the file.
    ///
    /// When the sink fails the file is kept in memory and can be saved
    /// again with `retry_save`.
    pub async fn stop(&mut self) -> RecordingResult<SavedRecording> {
        let mut session = self.session.take().ok_or(RecordingError::NotRecording)?;

        tracing::info!("Stopping recording");

        if session.state == RecordingState::Recording {
            let end = session.offset_ms();
            if let Some(segment) = session.segments.last_mut() {
                segment.end(end);
            }
        }
        let duration_ms = session.duration_ms();

        let RecordingSession {
            format,
            recorder,
            chunks,
            flush,
            segments,
            ..
        } = session;

        flush.shutdown().await;

        let stopped = recorder.lock().await.stop().await;
        match stopped {
            Ok(Some(tail)) if !tail.is_empty() => chunks.lock().push(tail),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Recorder failed to finalize, keeping buffered data: {}", e);
                let _ = self.event_tx.send(RecordingEvent::Error(e.to_string()));
            }
        }

        let buffered = std::mem::take(&mut *chunks.lock());
        self.save(UnsavedRecording {
            file: RecordingFile::assemble(buffered, &format, Utc::now()),
            duration_ms,
            segment_count: segments.len(),
        })
    }

    /// Save the recording whose previous save failed
    pub fn retry_save(&mut self) -> RecordingResult<SavedRecording> {
        let unsaved = self
            .unsaved
            .take()
            .ok_or_else(|| RecordingError::InvalidState("no unsaved recording".to_string()))?;
        tracing::info!("Retrying save of {}", unsaved.file.filename);
        self.save(unsaved)
    }

    fn save(&mut self, unsaved: UnsavedRecording) -> RecordingResult<SavedRecording> {
        let path = match self.sink.save(&unsaved.file) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(
                    "Failed to save recording {}, keeping it in memory: {}",
                    unsaved.file.filename,
                    e
                );
                if let Some(lost) = self.unsaved.replace(unsaved) {
                    tracing::warn!("Dropping earlier unsaved recording {}", lost.file.filename);
                }
                let _ = self.event_tx.send(RecordingEvent::Error(e.to_string()));
                return Err(RecordingError::Io(e));
            }
        };

        let UnsavedRecording {
            file,
            duration_ms,
            segment_count,
        } = unsaved;
        let saved = SavedRecording {
            path,
            filename: file.filename,
            mime_type: file.mime_type,
            size_bytes: file.data.len() as u64,
            duration_ms,
            segment_count,
        };

        tracing::info!(
            "Recording stopped. Duration: {:.0}ms, {} bytes",
            saved.duration_ms,
            saved.size_bytes
        );
        let _ = self.event_tx.send(RecordingEvent::Stopped(saved.clone()));
        Ok(saved)
    }

    /// Pause when recording; no-op otherwise
    pub async fn pause(&mut self) -> RecordingResult<RecordingState> {
        let Some(session) = self.session.as_mut() else {
            tracing::debug!("Pause requested with no active recording");
            return Ok(RecordingState::Idle);
        };
        if session.state != RecordingState::Recording {
            return Ok(session.state);
        }

        session
            .recorder
            .lock()
            .await
            .pause()
            .await
            .map_err(|e| RecordingError::InvalidState(format!("pause failed: {e}")))?;

        let end = session.offset_ms();
        if let Some(segment) = session.segments.last_mut() {
            segment.end(end);
        }
        session.state = RecordingState::Paused;

        tracing::info!("Recording paused");
        let _ = self.event_tx.send(RecordingEvent::Paused);
        Ok(RecordingState::Paused)
    }

    /// Resume when paused; no-op otherwise
    pub async fn resume(&mut self) -> RecordingResult<RecordingState> {
        let Some(session) = self.session.as_mut() else {
            tracing::debug!("Resume requested with no active recording");
            return Ok(RecordingState::Idle);
        };
        if session.state != RecordingState::Paused {
            return Ok(session.state);
        }

        session
            .recorder
            .lock()
            .await
            .resume()
            .await
            .map_err(|e| RecordingError::InvalidState(format!("resume failed: {e}")))?;

        let index = session.segments.len();
        let offset = session.offset_ms();
        session.segments.push(RecordingSegment::new(index, offset));
        session.state = RecordingState::Recording;

        tracing::info!("Recording resumed");
        let _ = self.event_tx.send(RecordingEvent::Resumed);
        Ok(RecordingState::Recording)
    }

    /// Flip between recording and paused; no-op when idle
    pub async fn toggle_pause(&mut self) -> RecordingResult<RecordingState> {
        match self.state() {
            RecordingState::Recording => self.pause().await,
            RecordingState::Paused => self.resume().await,
            RecordingState::Idle => Ok(RecordingState::Idle),
        }
    }

    /// Tear down the active recording without producing a file
    pub async fn discard(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        tracing::info!("Discarding in-progress recording");
        session.flush.shutdown().await;
        let stopped = session.recorder.lock().await.stop().await;
        if let Err(e) = stopped {
            tracing::warn!("Recorder failed to stop while discarding: {}", e);
        }
    }
}

/// Periodically move recorder output into the chunk buffer
fn spawn_flush(recorder: SharedRecorder, chunks: ChunkBuffer, period: Duration) -> ScheduledTask {
    ScheduledTask::spawn("recording-flush", move |mut shutdown| async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let data = recorder.lock().await.request_data().await;
                    match data {
                        Ok(Some(chunk)) if !chunk.is_empty() => {
                            tracing::debug!("Flushed {} bytes of recording data", chunk.len());
                            chunks.lock().push(chunk);
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!("Failed to flush recording data: {}", e),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{live_stream, FakeRecorderFactory, MemoryDownloads};

    fn controller(factory: Arc<FakeRecorderFactory>, sink: Arc<MemoryDownloads>) -> RecordingController {
        RecordingController::new(factory, sink)
    }

    #[tokio::test]
    async fn test_start_without_stream_creates_no_recorder() {
        let factory = Arc::new(FakeRecorderFactory::default());
        let mut controller = controller(factory.clone(), Arc::new(MemoryDownloads::default()));

        let err = controller.start(None).await.unwrap_err();
        assert!(matches!(err, RecordingError::NoActiveStream));
        assert_eq!(factory.created(), 0);
        assert_eq!(controller.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn test_start_with_stopped_stream_fails() {
        let factory = Arc::new(FakeRecorderFactory::default());
        let mut controller = controller(factory.clone(), Arc::new(MemoryDownloads::default()));
        let (stream, _tracks) = live_stream(false);
        stream.stop();

        let err = controller.start(Some(stream)).await.unwrap_err();
        assert!(matches!(err, RecordingError::NoActiveStream));
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_no_supported_format() {
        let factory = Arc::new(FakeRecorderFactory::supporting(&[]));
        let mut controller = controller(factory.clone(), Arc::new(MemoryDownloads::default()));
        let (stream, _tracks) = live_stream(false);

        let err = controller.start(Some(stream)).await.unwrap_err();
        assert!(matches!(err, RecordingError::NoSupportedFormat));
        assert_eq!(factory.created(), 0);
        assert!(!controller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_then_stop_produces_one_file() {
        let factory = Arc::new(FakeRecorderFactory::default());
        let sink = Arc::new(MemoryDownloads::default());
        let mut controller = controller(factory.clone(), sink.clone());
        let (stream, _tracks) = live_stream(true);

        let format = controller.start(Some(stream)).await.unwrap();
        assert_eq!(format.mime_type, "video/webm;codecs=vp9,opus");
        assert!(controller.start(None).await.is_err());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(controller.buffered_chunks(), 3);

        let saved = controller.stop().await.unwrap();
        let files = sink.files();
        assert_eq!(files.len(), 1);
        assert!(saved.filename.starts_with("recording-"));
        assert!(saved.filename.ends_with(".webm"));
        // three flushed chunks plus the tail returned by stop
        assert_eq!(files[0].data, b"chunkchunkchunktail");
        assert_eq!(saved.size_bytes, 19);
        assert!((saved.duration_ms - 3500.0).abs() < 1.0);
        assert_eq!(controller.state(), RecordingState::Idle);
        assert_eq!(controller.buffered_chunks(), 0);
    }

    #[tokio::test]
    async fn test_mp4_extension() {
        let factory = Arc::new(FakeRecorderFactory::supporting(&["video/mp4"]));
        let sink = Arc::new(MemoryDownloads::default());
        let mut controller = controller(factory, sink.clone());
        let (stream, _tracks) = live_stream(false);

        controller.start(Some(stream)).await.unwrap();
        let saved = controller.stop().await.unwrap();
        assert!(saved.filename.ends_with(".mp4"));
        assert_eq!(sink.files().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_cycle() {
        let factory = Arc::new(FakeRecorderFactory::default());
        let mut controller = controller(factory, Arc::new(MemoryDownloads::default()));
        let (stream, _tracks) = live_stream(false);

        assert_eq!(controller.toggle_pause().await.unwrap(), RecordingState::Idle);
        assert_eq!(controller.resume().await.unwrap(), RecordingState::Idle);

        controller.start(Some(stream)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(controller.toggle_pause().await.unwrap(), RecordingState::Paused);
        assert_eq!(controller.pause().await.unwrap(), RecordingState::Paused);
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(controller.toggle_pause().await.unwrap(), RecordingState::Recording);
        assert_eq!(controller.resume().await.unwrap(), RecordingState::Recording);
        tokio::time::sleep(Duration::from_millis(500)).await;

        let saved = controller.stop().await.unwrap();
        assert_eq!(saved.segment_count, 2);
        assert!((saved.duration_ms - 1500.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_recorder_pause_failure_is_state_error() {
        let factory = Arc::new(FakeRecorderFactory::default().failing_pause());
        let mut controller = controller(factory, Arc::new(MemoryDownloads::default()));
        let (stream, _tracks) = live_stream(false);

        controller.start(Some(stream)).await.unwrap();
        let err = controller.toggle_pause().await.unwrap_err();
        assert!(matches!(err, RecordingError::InvalidState(_)));
        assert_eq!(controller.state(), RecordingState::Recording);
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let mut controller = controller(
            Arc::new(FakeRecorderFactory::default()),
            Arc::new(MemoryDownloads::default()),
        );
        assert!(matches!(
            controller.stop().await.unwrap_err(),
            RecordingError::NotRecording
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_file_for_retry() {
        let sink = Arc::new(MemoryDownloads::default());
        let mut controller = controller(Arc::new(FakeRecorderFactory::default()), sink.clone());
        let (stream, _tracks) = live_stream(false);

        controller.start(Some(stream)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        sink.set_full(true);

        let err = controller.stop().await.unwrap_err();
        assert!(matches!(err, RecordingError::Io(_)));
        assert_eq!(controller.state(), RecordingState::Idle);
        let filename = controller.unsaved_filename().unwrap().to_string();
        assert!(filename.ends_with(".webm"));

        // still full: the file stays around
        assert!(controller.retry_save().is_err());
        assert!(controller.unsaved_filename().is_some());

        sink.set_full(false);
        let saved = controller.retry_save().unwrap();
        assert_eq!(saved.filename, filename);
        assert_eq!(sink.files()[0].data, b"chunkchunktail");
        assert!(controller.unsaved_filename().is_none());
        assert!(matches!(
            controller.retry_save().unwrap_err(),
            RecordingError::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn test_discard_saves_nothing() {
        let sink = Arc::new(MemoryDownloads::default());
        let mut controller = controller(Arc::new(FakeRecorderFactory::default()), sink.clone());
        let (stream, _tracks) = live_stream(false);

        controller.start(Some(stream)).await.unwrap();
        controller.discard().await;
        assert!(!controller.is_active());
        assert!(sink.files().is_empty());
    }

    #[tokio::test]
    async fn test_events() {
        let mut controller = controller(
            Arc::new(FakeRecorderFactory::default()),
            Arc::new(MemoryDownloads::default()),
        );
        let mut events = controller.subscribe();
        let (stream, _tracks) = live_stream(false);

        controller.start(Some(stream)).await.unwrap();
        controller.stop().await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), RecordingEvent::Started(_)));
        assert!(matches!(events.recv().await.unwrap(), RecordingEvent::Stopped(_)));
    }
}
