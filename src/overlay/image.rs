//! Overlay image loading
//!
//! Accepts any `image/*` file and turns it into a data URI the webview can
//! display directly. PNG headers are decoded to learn the pixel size.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Overlay errors
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Not an image: {0}")]
    NotAnImage(String),

    #[error("Image file is empty: {0}")]
    Empty(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OverlayError {
    pub fn code(&self) -> &'static str {
        match self {
            OverlayError::NotAnImage(_) => "NOT_AN_IMAGE",
            OverlayError::Empty(_) | OverlayError::Decode(_) => "IMAGE_DECODE",
            OverlayError::Io(_) => "IO_ERROR",
        }
    }

    /// Message shown in the error dialog
    pub fn user_message(&self) -> String {
        match self {
            OverlayError::NotAnImage(name) => format!("\"{name}\" is not an image file."),
            OverlayError::Empty(name) => format!("\"{name}\" is empty."),
            OverlayError::Decode(detail) => format!("The image could not be read: {detail}"),
            OverlayError::Io(e) => format!("The image could not be opened: {e}"),
        }
    }
}

pub type OverlayResult<T> = Result<T, OverlayError>;

/// A user-selected file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    /// Read a file from disk, inferring the MIME type from its extension
    pub fn read(path: &Path) -> OverlayResult<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            mime_type: mime_from_extension(path).to_string(),
            name,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// MIME type for common image extensions, `application/octet-stream`
/// otherwise
pub fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// A decoded overlay image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayImage {
    pub name: String,
    pub mime_type: String,
    pub data_uri: String,
    /// Pixel size when known
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl OverlayImage {
    pub fn decode(file: ImageFile) -> OverlayResult<Self> {
        if !file.is_image() {
            return Err(OverlayError::NotAnImage(file.name));
        }
        if file.bytes.is_empty() {
            return Err(OverlayError::Empty(file.name));
        }

        let mime_type = file.mime_type.trim().to_ascii_lowercase();
        let (width, height) = if mime_type == "image/png" {
            let (w, h) = png_dimensions(&file.bytes)?;
            (Some(w), Some(h))
        } else {
            (None, None)
        };

        let data_uri = format!(
            "data:{};base64,{}",
            mime_type,
            BASE64_STANDARD.encode(&file.bytes)
        );

        tracing::debug!(
            "Decoded overlay image '{}' ({}, {} bytes)",
            file.name,
            mime_type,
            file.bytes.len()
        );

        Ok(Self {
            name: file.name,
            mime_type,
            data_uri,
            width,
            height,
        })
    }
}

fn png_dimensions(bytes: &[u8]) -> OverlayResult<(u32, u32)> {
    let decoder = png::Decoder::new(bytes);
    let reader = decoder
        .read_info()
        .map_err(|e| OverlayError::Decode(e.to_string()))?;
    let info = reader.info();
    Ok((info.width, info.height))
}

#[cfg(test)]
pub(crate) fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer
            .write_image_data(&vec![0u8; (width * height * 4) as usize])
            .unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_decodes_with_dimensions() {
        let file = ImageFile {
            name: "photo.png".into(),
            mime_type: "image/png".into(),
            bytes: tiny_png(3, 2),
        };

        let image = OverlayImage::decode(file).unwrap();
        assert_eq!(image.width, Some(3));
        assert_eq!(image.height, Some(2));
        assert!(image.data_uri.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_rejects_non_images() {
        let file = ImageFile {
            name: "notes.txt".into(),
            mime_type: "text/plain".into(),
            bytes: b"hello".to_vec(),
        };
        assert!(matches!(
            OverlayImage::decode(file),
            Err(OverlayError::NotAnImage(_))
        ));
    }

    #[test]
    fn test_rejects_corrupt_png() {
        let file = ImageFile {
            name: "broken.png".into(),
            mime_type: "image/png".into(),
            bytes: b"definitely not a png".to_vec(),
        };
        assert!(matches!(
            OverlayImage::decode(file),
            Err(OverlayError::Decode(_))
        ));
    }

    #[test]
    fn test_other_image_types_pass_through() {
        let file = ImageFile {
            name: "sketch.svg".into(),
            mime_type: "image/svg+xml".into(),
            bytes: b"<svg/>".to_vec(),
        };
        let image = OverlayImage::decode(file).unwrap();
        assert_eq!(image.width, None);
        assert_eq!(image.data_uri, "data:image/svg+xml;base64,PHN2Zy8+");
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_from_extension(Path::new("a/b/photo.JPG")), "image/jpeg");
        assert_eq!(mime_from_extension(Path::new("clip.mov")), "application/octet-stream");
    }
}
