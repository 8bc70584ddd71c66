//! Static waveform previews
//!
//! Each stem gets one fixed-size RGBA canvas showing its full-length min/max
//! envelope. Previews are drawn once per load and redrawn only to change the
//! muted styling.

mod canvas;
mod peaks;

pub use canvas::{
    render, StemWaveforms, WaveColor, WaveformCanvas, DEFAULT_CANVAS_HEIGHT,
    DEFAULT_CANVAS_WIDTH, MUTED_ALPHA,
};
pub use peaks::compute_envelope;
