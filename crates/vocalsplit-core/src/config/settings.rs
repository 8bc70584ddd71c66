//! Application settings
//!
//! Stored as YAML, default location `~/.config/vocalsplit/config.yaml`.
//! Every section is `#[serde(default)]` so partial files are valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::default_download_dir;
use crate::audio::AudioConfig;
use crate::source::DEFAULT_SERVICE_URL;
use crate::transport::DEFAULT_FRAME_RATE;
use crate::types::StemRole;
use crate::waveform::{WaveColor, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VocalSplitConfig {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub waveform: WaveformConfig,
    pub transport: TransportConfig,
    pub loader: LoaderConfig,
    pub download: DownloadConfig,
}

/// Separation service section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL that relative stem paths in service replies are resolved against
    pub base_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
        }
    }
}

/// Waveform preview section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Canvas width in pixels (one envelope column per pixel)
    pub width: u32,
    pub height: u32,
    /// `#rrggbb`
    pub vocals_color: String,
    /// `#rrggbb`
    pub accompaniment_color: String,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
            vocals_color: "#4a90e2".to_string(),
            accompaniment_color: "#50e3c2".to_string(),
        }
    }
}

impl WaveformConfig {
    /// Parsed color for a stem, falling back to the built-in color on a bad value
    pub fn color(&self, role: StemRole) -> WaveColor {
        let (configured, fallback) = match role {
            StemRole::Vocals => (&self.vocals_color, WaveColor::VOCALS),
            StemRole::Accompaniment => (&self.accompaniment_color, WaveColor::ACCOMPANIMENT),
        };
        WaveColor::from_hex(configured).unwrap_or_else(|| {
            log::warn!(
                "config: invalid {} waveform color {:?}, using default",
                role,
                configured
            );
            fallback
        })
    }
}

/// Transport clock section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Position readout refresh rate while playing (Hz)
    pub frame_rate: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

/// Asset loader section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
    /// Allowed difference between the two stem durations before warning
    pub duration_tolerance_ms: u64,
    /// Fail the load (instead of warning) when durations differ by more than the tolerance
    pub strict_duration_check: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            duration_tolerance_ms: 50,
            strict_duration_check: false,
        }
    }
}

impl LoaderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn duration_tolerance_seconds(&self) -> f64 {
        self.duration_tolerance_ms as f64 / 1000.0
    }
}

/// Stem download section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory downloaded stems are written to
    pub directory: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
        }
    }
}
