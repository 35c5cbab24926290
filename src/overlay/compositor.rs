//! Overlay compositor
//!
//! Holds the overlay image and everything that affects how it is drawn over
//! the preview: position, scale, opacity, filter preset and strobe.

use super::filter::FilterPreset;
use super::image::{ImageFile, OverlayImage, OverlayResult};
use super::strobe::{Strobe, DEFAULT_STROBE_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 5.0;
pub const SCALE_STEP: f64 = 0.1;
pub const MIN_OPACITY: f64 = 0.2;
pub const MAX_OPACITY: f64 = 1.0;
pub const DEFAULT_OPACITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Offset between the pointer and the overlay origin at drag start
#[derive(Debug, Clone, Copy)]
struct DragAnchor {
    dx: f64,
    dy: f64,
}

/// How the frontend should draw the overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayStyle {
    pub transform: String,
    pub opacity: f64,
    pub filter: String,
    pub visible: bool,
}

/// Serializable overlay state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySnapshot {
    pub image: Option<OverlayImage>,
    pub position: Position,
    pub scale: f64,
    pub opacity: f64,
    pub filter: FilterPreset,
    pub dragging: bool,
    pub strobe_enabled: bool,
    pub strobe_interval_ms: u64,
    pub visible: bool,
}

pub struct OverlayCompositor {
    image: Option<OverlayImage>,
    position: Position,
    scale: f64,
    opacity: f64,
    filter: FilterPreset,
    drag: Option<DragAnchor>,
    strobe: Strobe,
}

impl Default for OverlayCompositor {
    fn default() -> Self {
        Self::new(DEFAULT_STROBE_INTERVAL_MS)
    }
}

impl OverlayCompositor {
    pub fn new(strobe_interval_ms: u64) -> Self {
        Self {
            image: None,
            position: Position::default(),
            scale: 1.0,
            opacity: DEFAULT_OPACITY,
            filter: FilterPreset::default(),
            drag: None,
            strobe: Strobe::new(strobe_interval_ms),
        }
    }

    pub fn image(&self) -> Option<&OverlayImage> {
        self.image.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn filter(&self) -> FilterPreset {
        self.filter
    }

    /// Replace the overlay image; position and scale reset, filter is kept
    pub fn load_image(&mut self, file: ImageFile) -> OverlayResult<&OverlayImage> {
        let image = OverlayImage::decode(file)?;
        tracing::info!("Loaded overlay image '{}'", image.name);

        self.drag = None;
        self.reset_transform();
        Ok(self.image.insert(image))
    }

    pub fn remove_image(&mut self) {
        if let Some(image) = self.image.take() {
            tracing::info!("Removed overlay image '{}'", image.name);
        }
        self.drag = None;
        self.strobe.set_enabled(false);
    }

    pub fn reset_transform(&mut self) {
        self.position = Position::default();
        self.scale = 1.0;
    }

    // Dragging

    /// Begin a drag at the pointer location; ignored without an image
    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        if self.image.is_none() {
            return false;
        }
        self.drag = Some(DragAnchor {
            dx: x - self.position.x,
            dy: y - self.position.y,
        });
        true
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if let Some(anchor) = self.drag {
            self.position = Position {
                x: x - anchor.dx,
                y: y - anchor.dy,
            };
        }
    }

    /// End the drag; may come from anywhere in the document
    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Whether document-wide pointer move/up listeners should be installed
    pub fn tracks_document_pointer(&self) -> bool {
        self.is_dragging()
    }

    // Zoom

    pub fn set_scale(&mut self, scale: f64) -> f64 {
        if scale.is_finite() {
            self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        }
        self.scale
    }

    pub fn zoom_by(&mut self, delta: f64) -> f64 {
        if !delta.is_finite() {
            return self.scale;
        }
        // round away accumulated float error from repeated steps
        let next = ((self.scale + delta) * 1000.0).round() / 1000.0;
        self.set_scale(next)
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.zoom_by(SCALE_STEP)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.zoom_by(-SCALE_STEP)
    }

    /// Scroll wheel: negative delta zooms in, one step per event
    pub fn wheel(&mut self, delta_y: f64) -> f64 {
        if delta_y < 0.0 {
            self.zoom_in()
        } else if delta_y > 0.0 {
            self.zoom_out()
        } else {
            self.scale
        }
    }

    // Appearance

    pub fn set_opacity(&mut self, opacity: f64) -> f64 {
        if opacity.is_finite() {
            self.opacity = opacity.clamp(MIN_OPACITY, MAX_OPACITY);
        }
        self.opacity
    }

    pub fn set_filter(&mut self, filter: FilterPreset) {
        tracing::debug!("Overlay filter: {}", filter.name());
        self.filter = filter;
    }

    /// Select a preset by name; unknown names leave the selection unchanged
    pub fn select_filter(&mut self, name: &str) -> Option<FilterPreset> {
        let preset = FilterPreset::from_name(name)?;
        self.set_filter(preset);
        Some(preset)
    }

    // Strobe

    pub fn set_strobe_enabled(&mut self, enabled: bool) {
        self.strobe.set_enabled(enabled);
    }

    pub fn set_strobe_interval(&mut self, ms: u64) -> u64 {
        self.strobe.set_interval_ms(ms)
    }

    pub fn strobe(&self) -> &Strobe {
        &self.strobe
    }

    pub fn is_visible(&self) -> bool {
        self.strobe.is_visible()
    }

    pub fn subscribe_visibility(&self) -> watch::Receiver<bool> {
        self.strobe.subscribe()
    }

    pub fn style(&self) -> OverlayStyle {
        OverlayStyle {
            transform: format!(
                "translate({}px, {}px) scale({})",
                self.position.x, self.position.y, self.scale
            ),
            opacity: self.opacity,
            filter: self.filter.css(),
            visible: self.is_visible(),
        }
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        OverlaySnapshot {
            image: self.image.clone(),
            position: self.position,
            scale: self.scale,
            opacity: self.opacity,
            filter: self.filter,
            dragging: self.is_dragging(),
            strobe_enabled: self.strobe.is_enabled(),
            strobe_interval_ms: self.strobe.interval_ms(),
            visible: self.is_visible(),
        }
    }

    /// Stop timers and drags on teardown
    pub fn shutdown(&mut self) {
        self.drag = None;
        self.strobe.set_enabled(false);
    }
}
