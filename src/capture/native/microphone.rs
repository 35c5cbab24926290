//! Microphone capture using cpal

use super::ThreadTrack;
use crate::utils::task::join_thread;
use crate::capture::stream::FEED_CAPACITY;
use crate::capture::traits::{AudioChunk, CaptureError, CaptureResult, TrackKind};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

pub(super) struct OpenedMicrophone {
    pub track: Arc<ThreadTrack>,
    pub feed: broadcast::Sender<AudioChunk>,
    pub sample_rate: u32,
    pub channels: u16,
}

struct MicrophoneInfo {
    name: String,
    sample_rate: u32,
    channels: u16,
}

fn publish(
    feed: broadcast::Sender<AudioChunk>,
    live: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
) -> impl Fn(Vec<f32>) + Send + 'static {
    move |samples| {
        if live.load(Ordering::Relaxed) {
            let _ = feed.send(AudioChunk {
                sample_rate,
                channels,
                samples: Arc::from(samples),
            });
        }
    }
}

/// Open the default input device on a capture thread
pub(super) async fn open_microphone() -> CaptureResult<OpenedMicrophone> {
    let live = Arc::new(AtomicBool::new(true));
    let (feed, _) = broadcast::channel(FEED_CAPACITY * 8);
    let (ready_tx, ready_rx) = oneshot::channel::<CaptureResult<MicrophoneInfo>>();

    let thread_live = live.clone();
    let thread_feed = feed.clone();
    let handle = std::thread::spawn(move || {
        let fail = |ready_tx: oneshot::Sender<_>, error: CaptureError| {
            tracing::error!("Failed to open microphone: {}", error);
            thread_live.store(false, Ordering::SeqCst);
            let _ = ready_tx.send(Err(error));
        };

        let host = cpal::default_host();
        let Some(device) = host.default_input_device() else {
            fail(
                ready_tx,
                CaptureError::DeviceNotFound("No default input device".to_string()),
            );
            return;
        };
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = match device.default_input_config() {
            Ok(config) => config,
            Err(e) => {
                fail(ready_tx, CaptureError::classify(e.to_string()));
                return;
            }
        };
        let sample_format = config.sample_format();
        let stream_config: StreamConfig = config.into();
        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels;

        let push = publish(thread_feed, thread_live.clone(), sample_rate, channels);
        let on_error = |err: cpal::StreamError| tracing::error!("Microphone stream error: {}", err);

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| push(data.to_vec()),
                on_error,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    push(data.iter().map(|&s| s as f32 / i16::MAX as f32).collect())
                },
                on_error,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    push(data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0).collect())
                },
                on_error,
                None,
            ),
            other => {
                fail(
                    ready_tx,
                    CaptureError::Unsupported(format!("microphone sample format {other:?}")),
                );
                return;
            }
        };

        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                fail(ready_tx, CaptureError::classify(e.to_string()));
                return;
            }
        };
        if let Err(e) = stream.play() {
            fail(ready_tx, CaptureError::classify(e.to_string()));
            return;
        }

        tracing::info!(
            "Microphone opened: {} ({}Hz, {}ch, {:?})",
            name,
            sample_rate,
            channels,
            sample_format
        );
        let _ = ready_tx.send(Ok(MicrophoneInfo {
            name,
            sample_rate,
            channels,
        }));

        // the cpal stream lives as long as this thread
        while thread_live.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(50));
        }
        drop(stream);
        tracing::info!("Microphone stream stopped");
    });

    let info = match ready_rx.await {
        Ok(Ok(info)) => info,
        Ok(Err(e)) => {
            let _ = join_thread(handle);
            return Err(e);
        }
        Err(_) => {
            let _ = join_thread(handle);
            return Err(CaptureError::Unknown(
                "microphone thread exited before opening the device".to_string(),
            ));
        }
    };

    Ok(OpenedMicrophone {
        track: Arc::new(ThreadTrack::new(TrackKind::Audio, info.name, live, handle)),
        feed,
        sample_rate: info.sample_rate,
        channels: info.channels,
    })
}
