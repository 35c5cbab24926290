//! Recording format negotiation
//!
//! Formats are described by MIME type strings such as
//! `video/webm;codecs=vp9,opus`. The first entry of the preference list the
//! recorder backend supports wins.

use super::backend::RecorderFactory;
use serde::{Deserialize, Serialize};

/// Formats to try, most preferred first
pub const PREFERRED_MIME_TYPES: [&str; 5] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm;codecs=h264,opus",
    "video/webm",
    "video/mp4",
];

/// Container family of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Webm,
    Mp4,
}

impl Container {
    /// Get the file extension for this container
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Webm => "webm",
            Container::Mp4 => "mp4",
        }
    }
}

/// A negotiated recording format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingFormat {
    pub mime_type: String,
}

impl RecordingFormat {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }

    /// Container family; anything mentioning mp4 is MP4 flavoured
    pub fn container(&self) -> Container {
        if self.mime_type.to_ascii_lowercase().contains("mp4") {
            Container::Mp4
        } else {
            Container::Webm
        }
    }

    pub fn extension(&self) -> &'static str {
        self.container().extension()
    }

    /// Codec names listed in the `codecs=` parameter, lowercased
    pub fn codecs(&self) -> Vec<String> {
        self.mime_type
            .split(';')
            .skip(1)
            .filter_map(|param| {
                let (key, value) = param.split_once('=')?;
                (key.trim().eq_ignore_ascii_case("codecs")).then_some(value)
            })
            .flat_map(|value| value.trim_matches('"').split(','))
            .map(|codec| codec.trim().to_ascii_lowercase())
            .filter(|codec| !codec.is_empty())
            .collect()
    }

    /// Explicit video codec, if the MIME type names one
    pub fn video_codec(&self) -> Option<String> {
        self.codecs()
            .into_iter()
            .find(|c| !matches!(c.as_str(), "opus" | "vorbis" | "aac" | "mp4a"))
    }

    /// Explicit audio codec, if the MIME type names one
    pub fn audio_codec(&self) -> Option<String> {
        self.codecs()
            .into_iter()
            .find(|c| matches!(c.as_str(), "opus" | "vorbis" | "aac" | "mp4a"))
    }
}

/// Pick the first supported format from the preference list
pub fn negotiate(factory: &dyn RecorderFactory) -> Option<RecordingFormat> {
    let format = PREFERRED_MIME_TYPES
        .iter()
        .find(|mime| factory.is_type_supported(mime))
        .map(|mime| RecordingFormat::new(*mime));

    match &format {
        Some(f) => tracing::debug!("Negotiated recording format: {}", f.mime_type),
        None => tracing::warn!("No supported recording format among {:?}", PREFERRED_MIME_TYPES),
    }

    format
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRecorderFactory;

    #[test]
    fn test_first_supported_wins() {
        let factory = FakeRecorderFactory::supporting(&["video/mp4", "video/webm;codecs=vp8,opus"]);
        let format = negotiate(&factory).unwrap();
        assert_eq!(format.mime_type, "video/webm;codecs=vp8,opus");
        assert_eq!(format.extension(), "webm");
    }

    #[test]
    fn test_mp4_fallback() {
        let factory = FakeRecorderFactory::supporting(&["video/mp4"]);
        let format = negotiate(&factory).unwrap();
        assert_eq!(format.container(), Container::Mp4);
        assert_eq!(format.extension(), "mp4");
    }

    #[test]
    fn test_nothing_supported() {
        let factory = FakeRecorderFactory::supporting(&[]);
        assert!(negotiate(&factory).is_none());
    }

    #[test]
    fn test_codec_parsing() {
        let format = RecordingFormat::new("video/webm;codecs=h264,opus");
        assert_eq!(format.codecs(), vec!["h264", "opus"]);
        assert_eq!(format.video_codec().as_deref(), Some("h264"));
        assert_eq!(format.audio_codec().as_deref(), Some("opus"));
        // H.264 in a WebM-like container is still a webm download
        assert_eq!(format.extension(), "webm");

        let generic = RecordingFormat::new("video/webm");
        assert!(generic.codecs().is_empty());
        assert_eq!(generic.video_codec(), None);
    }
}
