//! Audio output for VocalSplit
//!
//! The cpal backend opens one stereo output stream per load cycle. Its
//! callback owns a [`StemMixer`](crate::engine::StemMixer) and talks to the
//! control thread only through the engine's command queue and atomics.
//!
//! ```ignore
//! use vocalsplit_core::audio::{AudioConfig, CpalOutputFactory};
//! use vocalsplit_core::engine::PlaybackEngine;
//!
//! let factory = CpalOutputFactory::new(AudioConfig::default());
//! let mut engine = PlaybackEngine::new(Box::new(factory));
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{
    AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE,
    MIN_BUFFER_SIZE,
};
pub use cpal_backend::CpalOutputFactory;
pub use device::{get_output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
