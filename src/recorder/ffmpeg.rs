//! FFmpeg recorder backend
//!
//! Raw camera frames are written to FFmpeg's stdin and microphone samples
//! (f32le) are streamed over a loopback TCP socket FFmpeg connects to. The
//! encoded container is read from stdout and handed out on every flush.

use super::backend::{MediaRecorder, RecorderFactory, RecordingError, RecordingResult};
use super::format::{Container, RecordingFormat};
use crate::capture::{AudioChunk, MediaStream, StreamMetadata, VideoFrame};
use crate::utils::task::ScheduledTask;
use async_trait::async_trait;
use parking_lot::Mutex as ParkingMutex;
use std::collections::{HashSet, VecDeque};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

const FFMPEG: &str = "ffmpeg";
const EXIT_TIMEOUT: Duration = Duration::from_secs(10);
const STDERR_TAIL_LINES: usize = 20;

/// Encoders and muxer used for one MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderPlan {
    pub video: &'static str,
    pub audio: &'static str,
    pub muxer: &'static str,
}

impl EncoderPlan {
    pub fn for_format(format: &RecordingFormat) -> Option<Self> {
        let video_codec = format.video_codec();
        let audio_codec = format.audio_codec();

        match format.container() {
            Container::Mp4 => {
                let video = match video_codec.as_deref() {
                    None | Some("h264") => "libx264",
                    Some(c) if c.starts_with("avc1") => "libx264",
                    Some(_) => return None,
                };
                let audio = match audio_codec.as_deref() {
                    None | Some("aac") | Some("mp4a") => "aac",
                    Some("opus") => "libopus",
                    Some(_) => return None,
                };
                Some(Self {
                    video,
                    audio,
                    muxer: "mp4",
                })
            }
            Container::Webm => {
                let (video, muxer) = match video_codec.as_deref() {
                    Some("vp9") => ("libvpx-vp9", "webm"),
                    None | Some("vp8") => ("libvpx", "webm"),
                    // the webm muxer only takes VP8/VP9/AV1
                    Some("h264") => ("libx264", "matroska"),
                    Some(_) => return None,
                };
                let audio = match audio_codec.as_deref() {
                    None | Some("opus") => "libopus",
                    Some("vorbis") => "libvorbis",
                    Some(_) => return None,
                };
                Some(Self { video, audio, muxer })
            }
        }
    }
}

/// Encoder names from `ffmpeg -encoders` output
pub fn parse_encoders(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            (flags.len() == 6).then(|| name.to_string())
        })
        .collect()
}

/// FFmpeg command line for one recording
pub fn build_args(
    plan: &EncoderPlan,
    metadata: &StreamMetadata,
    audio_port: Option<u16>,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner", "-loglevel", "error", "-nostats"]
        .into_iter()
        .map(String::from)
        .collect();

    let fps = metadata.frame_rate.max(1).to_string();
    match metadata.pixel_format.ffmpeg_pix_fmt() {
        Some(pix_fmt) => args.extend([
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            pix_fmt.into(),
            "-video_size".into(),
            format!("{}x{}", metadata.width, metadata.height),
            "-framerate".into(),
            fps.clone(),
        ]),
        None => args.extend(["-f".into(), "mjpeg".into(), "-framerate".into(), fps.clone()]),
    }
    args.extend(["-i".into(), "pipe:0".into()]);

    if let (Some(port), Some(rate), Some(channels)) =
        (audio_port, metadata.sample_rate, metadata.channels)
    {
        args.extend([
            "-f".into(),
            "f32le".into(),
            "-ar".into(),
            rate.to_string(),
            "-ac".into(),
            channels.to_string(),
            "-i".into(),
            format!("tcp://127.0.0.1:{port}"),
        ]);
    }

    args.extend(["-c:v".into(), plan.video.into()]);
    match plan.video {
        "libvpx-vp9" => args.extend(
            ["-deadline", "realtime", "-cpu-used", "8", "-row-mt", "1", "-b:v", "2M"]
                .map(String::from),
        ),
        "libvpx" => args.extend(["-deadline", "realtime", "-cpu-used", "8", "-b:v", "2M"].map(String::from)),
        _ => args.extend(["-preset", "veryfast", "-crf", "23"].map(String::from)),
    }
    args.extend([
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-g".into(),
        (metadata.frame_rate.max(1) * 2).to_string(),
    ]);

    if audio_port.is_some() {
        args.extend(["-c:a".into(), plan.audio.into(), "-b:a".into(), "128k".into()]);
    } else {
        args.push("-an".into());
    }

    args.extend(["-f".into(), plan.muxer.into()]);
    if plan.muxer == "mp4" {
        // fragmented so the file can be streamed out before it is finished
        args.extend(["-movflags".into(), "frag_keyframe+empty_moov+default_base_moof".into()]);
    }
    args.push("pipe:1".into());
    args
}

/// Creates FFmpeg recorders for the encoders the local FFmpeg has
pub struct FfmpegRecorderFactory {
    encoders: HashSet<String>,
}

impl FfmpegRecorderFactory {
    /// Ask the installed FFmpeg which encoders it supports
    pub fn probe() -> Self {
        let encoders = match std::process::Command::new(FFMPEG)
            .args(["-hide_banner", "-encoders"])
            .output()
        {
            Ok(output) if output.status.success() => {
                parse_encoders(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::warn!("ffmpeg -encoders exited with {}", output.status);
                HashSet::new()
            }
            Err(e) => {
                tracing::warn!("FFmpeg not found, recording unavailable: {}", e);
                HashSet::new()
            }
        };

        tracing::info!("FFmpeg offers {} encoders", encoders.len());
        Self { encoders }
    }

    pub fn with_encoders<I, S>(encoders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            encoders: encoders.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_available(&self) -> bool {
        !self.encoders.is_empty()
    }

    fn has(&self, encoder: &str) -> bool {
        self.encoders.contains(encoder)
    }
}

impl RecorderFactory for FfmpegRecorderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        EncoderPlan::for_format(&RecordingFormat::new(mime_type))
            .is_some_and(|plan| self.has(plan.video) && self.has(plan.audio))
    }

    fn create(
        &self,
        stream: Arc<MediaStream>,
        format: &RecordingFormat,
    ) -> RecordingResult<Box<dyn MediaRecorder>> {
        let plan = EncoderPlan::for_format(format).ok_or_else(|| {
            RecordingError::Backend(format!("no encoder for {}", format.mime_type))
        })?;
        let metadata = stream
            .metadata()
            .ok_or_else(|| RecordingError::Backend("stream metadata not available".to_string()))?;
        let frames = stream
            .subscribe_video()
            .ok_or_else(|| RecordingError::Backend("stream has no video feed".to_string()))?;

        let audio = match stream.subscribe_audio() {
            Some(samples) if metadata.sample_rate.is_some() => {
                let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
                listener.set_nonblocking(true)?;
                let port = listener.local_addr()?.port();
                Some((TcpListener::from_std(listener)?, port, samples))
            }
            _ => None,
        };

        let args = build_args(&plan, &metadata, audio.as_ref().map(|(_, port, _)| *port));
        tracing::info!(
            "Starting FFmpeg recorder: {} {}x{} @ {}fps via {}/{}",
            format.mime_type,
            metadata.width,
            metadata.height,
            metadata.frame_rate,
            plan.video,
            plan.audio
        );
        tracing::debug!("ffmpeg {}", args.join(" "));

        let mut child = Command::new(FFMPEG)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecordingError::Backend("ffmpeg stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RecordingError::Backend("ffmpeg stdout unavailable".to_string()))?;

        let pending = Arc::new(ParkingMutex::new(Vec::new()));
        let paused = Arc::new(AtomicBool::new(false));
        let stderr_tail = Arc::new(ParkingMutex::new(VecDeque::new()));

        let output = tokio::spawn({
            let pending = pending.clone();
            async move {
                let mut stdout = stdout;
                let mut buf = vec![0u8; 64 * 1024];
                loop {
                    match stdout.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => pending.lock().extend_from_slice(&buf[..n]),
                        Err(e) => {
                            tracing::warn!("Failed to read ffmpeg output: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        if let Some(stderr) = child.stderr.take() {
            let tail = stderr_tail.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!("ffmpeg: {}", line);
                    let mut tail = tail.lock();
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            });
        }

        let video = spawn_video_feeder(frames, stdin, paused.clone());
        let audio = audio.map(|(listener, _, samples)| {
            spawn_audio_feeder(listener, samples, paused.clone())
        });

        Ok(Box::new(FfmpegRecorder {
            child,
            pending,
            paused,
            video: Some(video),
            audio,
            output: Some(output),
            stderr_tail,
        }))
    }
}

fn spawn_video_feeder(
    mut frames: broadcast::Receiver<VideoFrame>,
    mut stdin: ChildStdin,
    paused: Arc<AtomicBool>,
) -> ScheduledTask {
    ScheduledTask::spawn("ffmpeg-video", move |mut shutdown| async move {
        let mut written: u64 = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                frame = frames.recv() => match frame {
                    Ok(frame) => {
                        // dropped frames keep paused time out of the output
                        if paused.load(Ordering::Relaxed) {
                            continue;
                        }
                        if let Err(e) = stdin.write_all(&frame.data).await {
                            tracing::warn!("FFmpeg stopped accepting frames: {}", e);
                            break;
                        }
                        written += 1;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Recorder skipped {} frames", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }

        // EOF tells ffmpeg to finalize
        let _ = stdin.shutdown().await;
        tracing::debug!("Video feeder wrote {} frames", written);
    })
}

fn spawn_audio_feeder(
    listener: TcpListener,
    mut samples: broadcast::Receiver<AudioChunk>,
    paused: Arc<AtomicBool>,
) -> ScheduledTask {
    ScheduledTask::spawn("ffmpeg-audio", move |mut shutdown| async move {
        let mut socket = tokio::select! {
            _ = &mut shutdown => return,
            accepted = listener.accept() => match accepted {
                Ok((socket, _)) => socket,
                Err(e) => {
                    tracing::warn!("FFmpeg audio connection failed: {}", e);
                    return;
                }
            }
        };
        tracing::debug!("FFmpeg connected for audio");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                chunk = samples.recv() => match chunk {
                    Ok(chunk) => {
                        if paused.load(Ordering::Relaxed) {
                            continue;
                        }
                        let bytes: Vec<u8> = chunk
                            .samples
                            .iter()
                            .flat_map(|sample| sample.to_le_bytes())
                            .collect();
                        if let Err(e) = socket.write_all(&bytes).await {
                            tracing::warn!("FFmpeg stopped accepting audio: {}", e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Recorder skipped {} audio chunks", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }

        let _ = socket.shutdown().await;
    })
}

/// A running FFmpeg encode
pub struct FfmpegRecorder {
    child: Child,
    pending: Arc<ParkingMutex<Vec<u8>>>,
    paused: Arc<AtomicBool>,
    video: Option<ScheduledTask>,
    audio: Option<ScheduledTask>,
    output: Option<JoinHandle<()>>,
    stderr_tail: Arc<ParkingMutex<VecDeque<String>>>,
}

impl FfmpegRecorder {
    fn take_pending(&self) -> Option<Vec<u8>> {
        let mut pending = self.pending.lock();
        (!pending.is_empty()).then(|| std::mem::take(&mut *pending))
    }

    fn stderr_summary(&self) -> String {
        self.stderr_tail
            .lock()
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl MediaRecorder for FfmpegRecorder {
    async fn request_data(&mut self) -> RecordingResult<Option<Vec<u8>>> {
        Ok(self.take_pending())
    }

    async fn pause(&mut self) -> RecordingResult<()> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> RecordingResult<()> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<Option<Vec<u8>>> {
        if let Some(video) = self.video.take() {
            video.shutdown().await;
        }
        if let Some(audio) = self.audio.take() {
            audio.shutdown().await;
        }

        let status = match tokio::time::timeout(EXIT_TIMEOUT, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                tracing::warn!("FFmpeg did not exit in time, killing it");
                self.child.kill().await?;
                self.child.wait().await?
            }
        };

        if let Some(output) = self.output.take() {
            let _ = output.await;
        }

        if !status.success() {
            return Err(RecordingError::Backend(format!(
                "ffmpeg exited with {}: {}",
                status,
                self.stderr_summary()
            )));
        }

        tracing::info!("FFmpeg recorder finished");
        Ok(self.take_pending())
    }
}
