//! Waveform canvas rendering
//!
//! Draws a stem's envelope onto an RGBA surface: one vertical line per column
//! from `(1 + min) * amp` to `(1 + max) * amp`, `amp = height / 2`.

use std::path::{Path, PathBuf};

use image::{ImageFormat, ImageResult, Rgba, RgbaImage};

use super::peaks::compute_envelope;
use crate::config::WaveformConfig;
use crate::decode::DecodedStem;
use crate::loader::LoadedStems;
use crate::types::{StemRole, NUM_STEMS};

pub const DEFAULT_CANVAS_WIDTH: u32 = 320;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 80;

/// Alpha of a muted stem's waveform (`0x40` of `0xFF`)
pub const MUTED_ALPHA: u8 = 0x40;

/// Opaque stroke color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl WaveColor {
    pub const VOCALS: WaveColor = WaveColor::new(0x4a, 0x90, 0xe2);
    pub const ACCOMPANIMENT: WaveColor = WaveColor::new(0x50, 0xe3, 0xc2);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (leading `#` optional)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Default color for a stem
    pub fn for_role(role: StemRole) -> Self {
        match role {
            StemRole::Vocals => Self::VOCALS,
            StemRole::Accompaniment => Self::ACCOMPANIMENT,
        }
    }

    /// Pixel value; muting only lowers alpha
    pub fn pixel(&self, muted: bool) -> Rgba<u8> {
        let alpha = if muted { MUTED_ALPHA } else { u8::MAX };
        Rgba([self.r, self.g, self.b, alpha])
    }
}

/// Fixed-size RGBA drawing surface
#[derive(Debug, Clone)]
pub struct WaveformCanvas {
    image: RgbaImage,
}

impl WaveformCanvas {
    /// Transparent canvas; zero dimensions are bumped to 1
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Reset every pixel to transparent
    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    /// Raw RGBA bytes, row-major
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Whether nothing has been drawn since the last clear
    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|p| p.0[3] == 0)
    }

    pub fn save_png(&self, path: &Path) -> ImageResult<()> {
        self.image.save_with_format(path, ImageFormat::Png)
    }

    fn draw_column(&mut self, x: u32, from: f32, to: f32, pixel: Rgba<u8>) {
        let height = self.image.height() as i64;
        let top = (from.floor() as i64).clamp(0, height);
        let mut bottom = (to.ceil() as i64).clamp(0, height);
        if bottom <= top {
            // Flat window: still one pixel tall
            bottom = (top + 1).min(height);
        }
        let top = top.min(height - 1);
        for y in top..bottom {
            self.image.put_pixel(x, y as u32, pixel);
        }
    }
}

/// Draw a stem's waveform, replacing whatever the canvas held
pub fn render(stem: &DecodedStem, canvas: &mut WaveformCanvas, color: WaveColor, muted: bool) {
    canvas.clear();

    let amp = canvas.height() as f32 / 2.0;
    let pixel = color.pixel(muted);
    let envelope = compute_envelope(stem.first_channel(), canvas.width() as usize);

    for (x, &(min, max)) in envelope.iter().enumerate() {
        canvas.draw_column(x as u32, (1.0 + min) * amp, (1.0 + max) * amp, pixel);
    }
}

/// The pair of preview canvases shown for a loaded session
#[derive(Debug, Clone)]
pub struct StemWaveforms {
    canvases: [WaveformCanvas; NUM_STEMS],
    colors: [WaveColor; NUM_STEMS],
}

impl StemWaveforms {
    pub fn new(width: u32, height: u32, colors: [WaveColor; NUM_STEMS]) -> Self {
        Self {
            canvases: [
                WaveformCanvas::new(width, height),
                WaveformCanvas::new(width, height),
            ],
            colors,
        }
    }

    pub fn from_config(config: &WaveformConfig) -> Self {
        Self::new(
            config.width,
            config.height,
            [
                config.color(StemRole::Vocals),
                config.color(StemRole::Accompaniment),
            ],
        )
    }

    /// Draw both stems
    pub fn draw(&mut self, stems: &LoadedStems, muted: [bool; NUM_STEMS]) {
        for role in StemRole::ALL {
            self.redraw(role, stems, muted[role.index()]);
        }
    }

    /// Redraw one stem (e.g. after its mute flag changed)
    pub fn redraw(&mut self, role: StemRole, stems: &LoadedStems, muted: bool) {
        let color = self.colors[role.index()];
        render(stems.get(role), &mut self.canvases[role.index()], color, muted);
    }

    /// Blank both canvases (failed load)
    pub fn clear(&mut self) {
        for canvas in &mut self.canvases {
            canvas.clear();
        }
    }

    pub fn get(&self, role: StemRole) -> &WaveformCanvas {
        &self.canvases[role.index()]
    }

    /// Write both canvases as `<base>_<vocals|instrumental>_waveform.png`
    pub fn save_png(&self, dir: &Path, base_name: &str) -> ImageResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(NUM_STEMS);
        for role in StemRole::ALL {
            let path = dir.join(format!("{}_{}_waveform.png", base_name, role.file_suffix()));
            self.get(role).save_png(&path)?;
            log::debug!("waveform: wrote {:?}", path);
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stem(samples: Vec<f32>) -> DecodedStem {
        DecodedStem::from_channels(StemRole::Vocals, vec![samples], 44100)
    }

    #[test]
    fn test_hex_colors() {
        assert_eq!(WaveColor::from_hex("#4a90e2"), Some(WaveColor::VOCALS));
        assert_eq!(WaveColor::from_hex("50E3C2"), Some(WaveColor::ACCOMPANIMENT));
        assert_eq!(WaveColor::from_hex("#4a90e"), None);
        assert_eq!(WaveColor::from_hex("#zz90e2"), None);
    }

    #[test]
    fn test_full_scale_column_fills_height() {
        let mut canvas = WaveformCanvas::new(2, 80);
        render(&stem(vec![-1.0, 1.0, 0.0]), &mut canvas, WaveColor::VOCALS, false);

        for y in 0..80 {
            assert_eq!(canvas.pixel(0, y), Rgba([0x4a, 0x90, 0xe2, 0xff]));
        }
        assert_eq!(canvas.pixel(1, 0).0[3], 0);
        assert_eq!(canvas.pixel(1, 40).0[3], 0xff);
    }

    #[test]
    fn test_short_stem_leaves_trailing_columns_empty() {
        let mut canvas = WaveformCanvas::new(4, 80);
        render(&stem(vec![0.5]), &mut canvas, WaveColor::VOCALS, false);
        assert_eq!(canvas.pixel(0, 60).0[3], 0xff);
        assert!((0..80).all(|y| canvas.pixel(3, y).0[3] == 0));
    }

    #[test]
    fn test_muted_changes_alpha_only() {
        let samples: Vec<f32> = (0..2000).map(|i| ((i as f32) * 0.05).sin() * 0.7).collect();
        let stem = stem(samples);

        let mut normal = WaveformCanvas::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT);
        let mut muted = WaveformCanvas::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT);
        render(&stem, &mut normal, WaveColor::VOCALS, false);
        render(&stem, &mut muted, WaveColor::VOCALS, true);

        for (a, b) in normal.image().pixels().zip(muted.image().pixels()) {
            assert_eq!(a.0[3] == 0, b.0[3] == 0);
            if a.0[3] != 0 {
                assert_eq!(a.0[3], 0xff);
                assert_eq!(b.0[3], MUTED_ALPHA);
                assert_eq!(a.0[..3], b.0[..3]);
            }
        }
    }

    #[test]
    fn test_render_is_deterministic_and_clears() {
        let stem_a = stem((0..5000).map(|i| ((i % 97) as f32 / 97.0) - 0.5).collect());
        let mut first = WaveformCanvas::new(320, 80);
        let mut second = WaveformCanvas::new(320, 80);
        render(&stem_a, &mut first, WaveColor::ACCOMPANIMENT, false);
        render(&stem_a, &mut second, WaveColor::ACCOMPANIMENT, false);
        assert_eq!(first.as_raw(), second.as_raw());

        // Drawing silence over a busy canvas leaves only the center line
        render(&stem(vec![0.0; 5000]), &mut first, WaveColor::ACCOMPANIMENT, false);
        assert_eq!(first.pixel(10, 0).0[3], 0);
        assert_ne!(first.pixel(10, 40).0[3], 0);
    }

    #[test]
    fn test_stem_waveforms_save_and_clear() {
        let stems = LoadedStems::new(
            DecodedStem::from_channels(StemRole::Vocals, vec![vec![0.5, -0.5, 0.25]], 8000),
            DecodedStem::from_channels(StemRole::Accompaniment, vec![vec![-0.9, 0.9]], 8000),
        );
        let mut waveforms = StemWaveforms::from_config(&WaveformConfig::default());
        waveforms.draw(&stems, [false, true]);
        assert!(!waveforms.get(StemRole::Vocals).is_blank());

        let dir = tempfile::tempdir().unwrap();
        let paths = waveforms.save_png(dir.path(), "song").unwrap();
        assert!(paths[0].ends_with("song_vocals_waveform.png"));
        assert!(paths[1].exists());

        waveforms.clear();
        assert!(waveforms.get(StemRole::Vocals).is_blank());
        assert!(waveforms.get(StemRole::Accompaniment).is_blank());
    }
}
