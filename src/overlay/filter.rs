//! Overlay filter presets
//!
//! A fixed table of ten presets. Filters only affect how the overlay is
//! drawn; the stored image data is never touched.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// A single filter operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    /// Amount 0.0-1.0
    Grayscale(f32),
    /// Multiplier, 1.0 = unchanged
    Contrast(f32),
    /// Amount 0.0-1.0
    Sepia(f32),
    /// Radius in pixels
    Blur(f32),
    /// Amount 0.0-1.0
    Invert(f32),
    /// Multiplier, 1.0 = unchanged
    Brightness(f32),
    /// Multiplier, 1.0 = unchanged
    Saturate(f32),
}

impl FilterOp {
    fn write_css(&self, out: &mut String) {
        let _ = match self {
            FilterOp::Grayscale(v) => write!(out, "grayscale({}%)", v * 100.0),
            FilterOp::Contrast(v) => write!(out, "contrast({}%)", v * 100.0),
            FilterOp::Sepia(v) => write!(out, "sepia({}%)", v * 100.0),
            FilterOp::Blur(px) => write!(out, "blur({px}px)"),
            FilterOp::Invert(v) => write!(out, "invert({}%)", v * 100.0),
            FilterOp::Brightness(v) => write!(out, "brightness({}%)", v * 100.0),
            FilterOp::Saturate(v) => write!(out, "saturate({}%)", v * 100.0),
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterPreset {
    #[default]
    Normal,
    Grayscale,
    HighContrast,
    LowContrast,
    Sepia,
    Blur,
    Invert,
    Brighten,
    Saturate,
    Sketch,
}

impl FilterPreset {
    pub const ALL: [FilterPreset; 10] = [
        FilterPreset::Normal,
        FilterPreset::Grayscale,
        FilterPreset::HighContrast,
        FilterPreset::LowContrast,
        FilterPreset::Sepia,
        FilterPreset::Blur,
        FilterPreset::Invert,
        FilterPreset::Brighten,
        FilterPreset::Saturate,
        FilterPreset::Sketch,
    ];

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            FilterPreset::Normal => "Normal",
            FilterPreset::Grayscale => "Grayscale",
            FilterPreset::HighContrast => "High Contrast",
            FilterPreset::LowContrast => "Low Contrast",
            FilterPreset::Sepia => "Sepia",
            FilterPreset::Blur => "Blur",
            FilterPreset::Invert => "Invert",
            FilterPreset::Brighten => "Brighten",
            FilterPreset::Saturate => "Saturate",
            FilterPreset::Sketch => "Sketch",
        }
    }

    /// Operations applied, in order
    pub fn ops(&self) -> &'static [FilterOp] {
        match self {
            FilterPreset::Normal => &[],
            FilterPreset::Grayscale => &[FilterOp::Grayscale(1.0)],
            FilterPreset::HighContrast => &[FilterOp::Contrast(2.0)],
            FilterPreset::LowContrast => &[FilterOp::Contrast(0.5)],
            FilterPreset::Sepia => &[FilterOp::Sepia(1.0)],
            FilterPreset::Blur => &[FilterOp::Blur(2.0)],
            FilterPreset::Invert => &[FilterOp::Invert(1.0)],
            FilterPreset::Brighten => &[FilterOp::Brightness(1.5)],
            FilterPreset::Saturate => &[FilterOp::Saturate(2.0)],
            FilterPreset::Sketch => &[FilterOp::Grayscale(1.0), FilterOp::Contrast(2.0)],
        }
    }

    /// CSS `filter` value
    pub fn css(&self) -> String {
        let ops = self.ops();
        if ops.is_empty() {
            return "none".to_string();
        }

        let mut css = String::new();
        for (i, op) in ops.iter().enumerate() {
            if i > 0 {
                css.push(' ');
            }
            op.write_css(&mut css);
        }
        css
    }

    /// Look up a preset by display name or kebab-case id, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim();
        Self::ALL.into_iter().find(|preset| {
            preset.name().eq_ignore_ascii_case(wanted)
                || preset.name().replace(' ', "-").eq_ignore_ascii_case(wanted)
        })
    }
}

/// Preset entry as listed to the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDescriptor {
    pub id: FilterPreset,
    pub name: String,
    pub css: String,
}

/// The full preset table
pub fn catalog() -> Vec<FilterDescriptor> {
    FilterPreset::ALL
        .iter()
        .map(|preset| FilterDescriptor {
            id: *preset,
            name: preset.name().to_string(),
            css: preset.css(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_distinct_presets() {
        let table = catalog();
        assert_eq!(table.len(), 10);

        let mut css: Vec<_> = table.iter().map(|d| d.css.clone()).collect();
        css.sort();
        css.dedup();
        assert_eq!(css.len(), 10);
    }

    #[test]
    fn test_css_rendering() {
        assert_eq!(FilterPreset::Normal.css(), "none");
        assert_eq!(FilterPreset::Grayscale.css(), "grayscale(100%)");
        assert_eq!(FilterPreset::Blur.css(), "blur(2px)");
        assert_eq!(FilterPreset::Sketch.css(), "grayscale(100%) contrast(200%)");
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(FilterPreset::from_name("High Contrast"), Some(FilterPreset::HighContrast));
        assert_eq!(FilterPreset::from_name("high-contrast"), Some(FilterPreset::HighContrast));
        assert_eq!(FilterPreset::from_name("sepia"), Some(FilterPreset::Sepia));
        assert_eq!(FilterPreset::from_name("vintage"), None);
    }

    #[test]
    fn test_serde_id() {
        let json = serde_json::to_string(&FilterPreset::LowContrast).unwrap();
        assert_eq!(json, "\"low-contrast\"");
    }
}
