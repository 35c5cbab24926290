//! Preview frame encoding
//!
//! Turns a raw camera frame into an image the webview can show: MJPEG frames
//! are already JPEG, everything else is converted to RGBA and written as PNG.

use super::traits::{PixelFormat, VideoFrame};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// A preview frame ready for an `<img>` element
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedFrame {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedFrame {
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            BASE64_STANDARD.encode(&self.bytes)
        )
    }
}

pub fn encode_frame(frame: &VideoFrame) -> Option<EncodedFrame> {
    if frame.format == PixelFormat::Mjpeg {
        return Some(EncodedFrame {
            width: frame.width,
            height: frame.height,
            mime_type: "image/jpeg".to_string(),
            bytes: frame.data.to_vec(),
        });
    }

    let Some(rgba) = to_rgba(frame) else {
        tracing::debug!(
            "Dropping short {:?} frame ({} bytes for {}x{})",
            frame.format,
            frame.data.len(),
            frame.width,
            frame.height
        );
        return None;
    };

    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);

        let written = encoder
            .write_header()
            .and_then(|mut writer| writer.write_image_data(&rgba));
        if let Err(e) = written {
            tracing::warn!("Failed to encode preview frame: {}", e);
            return None;
        }
    }

    Some(EncodedFrame {
        width: frame.width,
        height: frame.height,
        mime_type: "image/png".to_string(),
        bytes,
    })
}

/// Convert an uncompressed frame to packed RGBA
pub fn to_rgba(frame: &VideoFrame) -> Option<Vec<u8>> {
    let (w, h) = (frame.width as usize, frame.height as usize);
    let pixels = w * h;
    let data = &frame.data[..];

    match frame.format {
        PixelFormat::Rgba => (data.len() >= pixels * 4).then(|| data[..pixels * 4].to_vec()),
        PixelFormat::Rgb => {
            if data.len() < pixels * 3 {
                return None;
            }
            let mut out = Vec::with_capacity(pixels * 4);
            for px in data[..pixels * 3].chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
            Some(out)
        }
        PixelFormat::Yuyv => {
            if w % 2 != 0 || data.len() < pixels * 2 {
                return None;
            }
            let mut out = Vec::with_capacity(pixels * 4);
            for quad in data[..pixels * 2].chunks_exact(4) {
                let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
                out.extend_from_slice(&yuv_to_rgba(y0, u, v));
                out.extend_from_slice(&yuv_to_rgba(y1, u, v));
            }
            Some(out)
        }
        PixelFormat::Nv12 => {
            if data.len() < pixels + pixels / 2 {
                return None;
            }
            let (luma, chroma) = data.split_at(pixels);
            let mut out = Vec::with_capacity(pixels * 4);
            for row in 0..h {
                for col in 0..w {
                    let uv = (row / 2) * w + (col / 2) * 2;
                    let (u, v) = (*chroma.get(uv)?, *chroma.get(uv + 1)?);
                    out.extend_from_slice(&yuv_to_rgba(luma[row * w + col], u, v));
                }
            }
            Some(out)
        }
        PixelFormat::Mjpeg => None,
    }
}

/// BT.601 full-range
fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344_136 * u - 0.714_136 * v;
    let b = y + 1.772 * u;

    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
        255,
    ]
}
