//! Overlay image compositing
//!
//! - Image loading and data URI encoding
//! - Filter presets
//! - Strobe timer
//! - OverlayCompositor tying them together with drag and zoom

pub mod compositor;
pub mod filter;
pub mod image;
pub mod strobe;

pub use compositor::{
    OverlayCompositor, OverlaySnapshot, OverlayStyle, Position, DEFAULT_OPACITY, MAX_OPACITY,
    MAX_SCALE, MIN_OPACITY, MIN_SCALE, SCALE_STEP,
};
pub use filter::{catalog, FilterDescriptor, FilterOp, FilterPreset};
pub use image::{ImageFile, OverlayError, OverlayImage, OverlayResult};
pub use strobe::{
    Strobe, DEFAULT_STROBE_INTERVAL_MS, MAX_STROBE_INTERVAL_MS, MIN_STROBE_INTERVAL_MS,
};
