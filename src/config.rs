//! Viewfinder configuration
//!
//! Loaded from the JSON file named by `VIEWFINDER_CONFIG`, falling back to
//! defaults. Out-of-range values are clamped rather than rejected.

use crate::capture::Resolution;
use crate::overlay::strobe::{clamp_interval_ms, DEFAULT_STROBE_INTERVAL_MS};
use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV_VAR: &str = "VIEWFINDER_CONFIG";

const MIN_FLUSH_INTERVAL_MS: u64 = 100;
const MAX_FLUSH_INTERVAL_MS: u64 = 10_000;
const MIN_METADATA_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewfinderConfig {
    pub preferred_width: u32,
    pub preferred_height: u32,
    pub preferred_frame_rate: u32,
    /// Whether the microphone is requested on mount
    pub audio_enabled: bool,
    pub flush_interval_ms: u64,
    pub strobe_interval_ms: u64,
    pub metadata_timeout_ms: u64,
    /// Where finished recordings are saved; the user's download dir if unset
    pub downloads_dir: Option<PathBuf>,
}

impl Default for ViewfinderConfig {
    fn default() -> Self {
        Self {
            preferred_width: 1920,
            preferred_height: 1080,
            preferred_frame_rate: 30,
            audio_enabled: false,
            flush_interval_ms: 1000,
            strobe_interval_ms: DEFAULT_STROBE_INTERVAL_MS,
            metadata_timeout_ms: 10_000,
            downloads_dir: None,
        }
    }
}

impl ViewfinderConfig {
    /// Load a config file
    pub fn load(path: &Path) -> AppResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: ViewfinderConfig = serde_json::from_str(&json)?;
        Ok(config.validated())
    }

    /// Config from `VIEWFINDER_CONFIG`, or defaults when unset
    pub fn from_env() -> AppResult<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => {
                let path = PathBuf::from(path);
                tracing::info!("Loading config from {:?}", path);
                Self::load(&path).map_err(|e| {
                    AppError::Config(format!("{}: {}", path.display(), e))
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Clamp every value into its usable range
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.preferred_width == 0 || self.preferred_height == 0 {
            tracing::warn!(
                "Invalid preferred resolution {}x{}, using default",
                self.preferred_width,
                self.preferred_height
            );
            self.preferred_width = defaults.preferred_width;
            self.preferred_height = defaults.preferred_height;
        }
        if self.preferred_frame_rate == 0 {
            self.preferred_frame_rate = defaults.preferred_frame_rate;
        }

        self.flush_interval_ms = self
            .flush_interval_ms
            .clamp(MIN_FLUSH_INTERVAL_MS, MAX_FLUSH_INTERVAL_MS);
        self.strobe_interval_ms = clamp_interval_ms(self.strobe_interval_ms);
        self.metadata_timeout_ms = self.metadata_timeout_ms.max(MIN_METADATA_TIMEOUT_MS);
        self
    }

    pub fn preferred_resolution(&self) -> Resolution {
        Resolution {
            width: self.preferred_width,
            height: self.preferred_height,
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ViewfinderConfig::default();
        assert_eq!(config.preferred_resolution(), Resolution { width: 1920, height: 1080 });
        assert!(!config.audio_enabled);
        assert_eq!(config.flush_interval(), Duration::from_secs(1));
        assert_eq!(config.strobe_interval_ms, 1000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"audioEnabled": true, "preferredWidth": 1280, "preferredHeight": 720}}"#)
            .unwrap();

        let config = ViewfinderConfig::load(file.path()).unwrap();
        assert!(config.audio_enabled);
        assert_eq!(config.preferred_width, 1280);
        assert_eq!(config.preferred_frame_rate, 30);
        assert_eq!(config.downloads_dir, None);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let config = ViewfinderConfig {
            preferred_width: 0,
            flush_interval_ms: 5,
            strobe_interval_ms: 60_000,
            metadata_timeout_ms: 0,
            ..Default::default()
        }
        .validated();

        assert_eq!(config.preferred_width, 1920);
        assert_eq!(config.flush_interval_ms, 100);
        assert_eq!(config.strobe_interval_ms, 2000);
        assert_eq!(config.metadata_timeout_ms, 500);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ViewfinderConfig::load(file.path()),
            Err(AppError::Serialization(_))
        ));
    }
}
