//! Audio output configuration

use serde::{Deserialize, Serialize};

/// Largest block the callback's working buffer is sized for (frames)
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Smallest fixed buffer size accepted (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Block size for outputs that need one when the host would choose (frames)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Output rate requested when none is configured
///
/// Stems at other rates are interpolated by the mixer, so this only has to be
/// something the device supports.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Preferred buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the audio host choose
    #[default]
    Default,
    /// Request a specific size in frames (clamped to MIN..=MAX_BUFFER_SIZE)
    Fixed(u32),
}

impl BufferSize {
    /// Frames to request from the device; `None` leaves it to the host
    pub fn fixed_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => {
                Some((*frames).clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE as u32))
            }
        }
    }

    /// Output latency in milliseconds at `sample_rate`, when known up front
    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.fixed_frames()
            .map(|frames| frames as f32 / sample_rate as f32 * 1000.0)
    }
}

/// Audio device identifier
///
/// Name plus the host backend it was found on (ALSA, PulseAudio, CoreAudio,
/// ...). Without a host every available host is searched by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Label including the host when known, e.g. `[ALSA] hw:0,0`
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Audio output section of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,

    pub buffer_size: BufferSize,

    /// Preferred output rate (None = [`DEFAULT_SAMPLE_RATE`])
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}
