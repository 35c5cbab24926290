//! In-memory devices, recorders and sinks for unit tests

use crate::capture::{
    CaptureError, CaptureResult, MediaConstraints, MediaDevices, MediaStream, MediaTrack,
    PixelFormat, PreviewSurface, StreamMetadata, TrackKind,
};
use crate::recorder::{
    DownloadSink, MediaRecorder, RecorderFactory, RecordingError, RecordingFile, RecordingFormat,
    RecordingResult, PREFERRED_MIME_TYPES,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

pub fn sample_metadata() -> StreamMetadata {
    StreamMetadata {
        width: 1280,
        height: 720,
        frame_rate: 30,
        pixel_format: PixelFormat::Yuyv,
        sample_rate: None,
        channels: None,
    }
}

pub struct FakeTrack {
    kind: TrackKind,
    live: AtomicBool,
}

impl FakeTrack {
    pub fn new(kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            live: AtomicBool::new(true),
        })
    }
}

impl MediaTrack for FakeTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> &str {
        match self.kind {
            TrackKind::Video => "Fake Camera",
            TrackKind::Audio => "Fake Microphone",
        }
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

pub fn dyn_tracks(tracks: &[Arc<FakeTrack>]) -> Vec<Arc<dyn MediaTrack>> {
    tracks
        .iter()
        .map(|t| t.clone() as Arc<dyn MediaTrack>)
        .collect()
}

/// A live stream with metadata already available
pub fn live_stream(audio: bool) -> (Arc<MediaStream>, Vec<Arc<FakeTrack>>) {
    let mut tracks = vec![FakeTrack::new(TrackKind::Video)];
    if audio {
        tracks.push(FakeTrack::new(TrackKind::Audio));
    }
    let (_tx, rx) = watch::channel(Some(sample_metadata()));
    let stream = MediaStream::new(dyn_tracks(&tracks), rx);
    (Arc::new(stream), tracks)
}

/// Device source whose outcome is scripted by the test
#[derive(Default)]
pub struct FakeDevices {
    failure: Mutex<Option<CaptureError>>,
    withhold_metadata: AtomicBool,
    requests: Mutex<Vec<MediaConstraints>>,
    issued: Mutex<Vec<Arc<FakeTrack>>>,
}

impl FakeDevices {
    pub fn fail_with(&self, error: CaptureError) {
        *self.failure.lock() = Some(error);
    }

    pub fn succeed(&self) {
        *self.failure.lock() = None;
    }

    /// Streams never report metadata
    pub fn withhold_metadata(&self) {
        self.withhold_metadata.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<MediaConstraints> {
        self.requests.lock().clone()
    }

    pub fn issued_tracks(&self) -> Vec<Arc<FakeTrack>> {
        self.issued.lock().clone()
    }

    pub fn live_tracks(&self) -> usize {
        self.issued.lock().iter().filter(|t| t.is_live()).count()
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> CaptureResult<MediaStream> {
        self.requests.lock().push(constraints.clone());
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        let mut tracks = vec![FakeTrack::new(TrackKind::Video)];
        if constraints.audio {
            tracks.push(FakeTrack::new(TrackKind::Audio));
        }
        self.issued.lock().extend(tracks.iter().cloned());

        let rx = if self.withhold_metadata.load(Ordering::SeqCst) {
            // sender dropped: the stream ends before metadata arrives
            watch::channel(None).1
        } else {
            watch::channel(Some(sample_metadata())).1
        };
        Ok(MediaStream::new(dyn_tracks(&tracks), rx))
    }
}

/// What a `FakeSurface` has been asked to do
#[derive(Debug, Default)]
pub struct SurfaceProbe {
    pub attached: Option<String>,
    pub plays: usize,
    pub detaches: usize,
}

#[derive(Default)]
pub struct FakeSurface {
    stream: Option<Arc<MediaStream>>,
    pub probe: Arc<Mutex<SurfaceProbe>>,
}

#[async_trait]
impl PreviewSurface for FakeSurface {
    fn attach(&mut self, stream: Arc<MediaStream>) {
        self.probe.lock().attached = Some(stream.id().to_string());
        self.stream = Some(stream);
    }

    async fn play(&mut self) -> CaptureResult<()> {
        if self.stream.is_none() {
            return Err(CaptureError::Unknown("nothing attached".into()));
        }
        self.probe.lock().plays += 1;
        Ok(())
    }

    fn detach(&mut self) {
        if self.stream.take().is_some() {
            let mut probe = self.probe.lock();
            probe.attached = None;
            probe.detaches += 1;
        }
    }

    fn is_attached(&self) -> bool {
        self.stream.is_some()
    }
}

pub struct FakeRecorderFactory {
    supported: Vec<String>,
    created: AtomicUsize,
    fail_pause: bool,
}

impl Default for FakeRecorderFactory {
    fn default() -> Self {
        Self::supporting(&PREFERRED_MIME_TYPES)
    }
}

impl FakeRecorderFactory {
    pub fn supporting(mime_types: &[&str]) -> Self {
        Self {
            supported: mime_types.iter().map(|m| m.to_string()).collect(),
            created: AtomicUsize::new(0),
            fail_pause: false,
        }
    }

    pub fn failing_pause(mut self) -> Self {
        self.fail_pause = true;
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RecorderFactory for FakeRecorderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    fn create(
        &self,
        _stream: Arc<MediaStream>,
        _format: &RecordingFormat,
    ) -> RecordingResult<Box<dyn MediaRecorder>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeRecorder {
            paused: false,
            stopped: false,
            fail_pause: self.fail_pause,
        }))
    }
}

/// Emits `chunk` per flush while recording and `tail` on stop
pub struct FakeRecorder {
    paused: bool,
    stopped: bool,
    fail_pause: bool,
}

#[async_trait]
impl MediaRecorder for FakeRecorder {
    async fn request_data(&mut self) -> RecordingResult<Option<Vec<u8>>> {
        if self.paused || self.stopped {
            return Ok(None);
        }
        Ok(Some(b"chunk".to_vec()))
    }

    async fn pause(&mut self) -> RecordingResult<()> {
        if self.fail_pause {
            return Err(RecordingError::Backend("pause rejected".into()));
        }
        self.paused = true;
        Ok(())
    }

    async fn resume(&mut self) -> RecordingResult<()> {
        self.paused = false;
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<Option<Vec<u8>>> {
        self.stopped = true;
        Ok(Some(b"tail".to_vec()))
    }
}

#[derive(Default)]
pub struct MemoryDownloads {
    files: Mutex<Vec<RecordingFile>>,
    full: AtomicBool,
}

impl MemoryDownloads {
    pub fn files(&self) -> Vec<RecordingFile> {
        self.files.lock().clone()
    }

    /// Make saves fail as if the disk were full
    pub fn set_full(&self, full: bool) {
        self.full.store(full, Ordering::SeqCst);
    }
}

impl DownloadSink for MemoryDownloads {
    fn save(&self, file: &RecordingFile) -> std::io::Result<PathBuf> {
        if self.full.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no space left on device",
            ));
        }
        self.files.lock().push(file.clone());
        Ok(PathBuf::from("/downloads").join(&file.filename))
    }
}
