//! VocalSplit Core - Synchronized dual-stem playback
//!
//! Loading, decoding, waveform preview and transport.

pub mod audio;
pub mod config;
pub mod decode;
pub mod download;
pub mod engine;
pub mod fetch;
pub mod loader;
pub mod source;
pub mod transport;
pub mod types;
pub mod waveform;

pub use types::*;
