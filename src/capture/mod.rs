//! Camera and microphone capture
//!
//! Traits at the device and preview seams, the owned `MediaStream`, the
//! device session state machine and (with the `native` feature) the
//! nokhwa/cpal backends.

pub mod frame;
pub mod preview;
pub mod session;
pub mod stream;
pub mod traits;

#[cfg(feature = "native")]
pub mod native;

pub use frame::{encode_frame, EncodedFrame};
pub use preview::FrameSurface;
pub use session::{DeviceSessionManager, SessionState};
pub use stream::{MediaStream, FEED_CAPACITY};
pub use traits::{
    AudioChunk, CameraInfo, CaptureError, CaptureResult, MediaConstraints, MediaDevices,
    MediaTrack, PixelFormat, PreviewSurface, Resolution, StreamMetadata, TrackKind, VideoFrame,
};
