//! Shared fixtures for the session tests

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use vocalsplit_core::config::LoaderConfig;
use vocalsplit_core::engine::{OfflineOutputFactory, OfflineRenderer, PlaybackEngine};
use vocalsplit_core::fetch::MemoryFetcher;
use vocalsplit_core::loader::AssetLoader;
use vocalsplit_core::source::StemPair;

/// Low rate keeps three-minute fixtures small
pub const RATE: u32 = 1000;

pub const VOCALS_URL: &str = "http://127.0.0.1:5000/output/song/vocals.wav";
pub const ACCOMPANIMENT_URL: &str = "http://127.0.0.1:5000/output/song/accompaniment.wav";

/// Mono 16-bit WAV of `seconds` with a repeating ramp
pub fn wav(seconds: f64, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (seconds * sample_rate as f64).round() as usize;
        for i in 0..frames {
            writer.write_sample(((i % 200) as i16 - 100) * 200).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn pair() -> StemPair {
    StemPair::new(VOCALS_URL, ACCOMPANIMENT_URL, "song.mp3")
}

/// Fetcher serving both stems of [`pair`] at `seconds` long
pub fn fetcher_with_stems(seconds: f64) -> Arc<MemoryFetcher> {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert(VOCALS_URL, wav(seconds, RATE));
    fetcher.insert(ACCOMPANIMENT_URL, wav(seconds, RATE));
    fetcher
}

pub fn loader(fetcher: Arc<MemoryFetcher>) -> AssetLoader {
    AssetLoader::new(fetcher, LoaderConfig::default())
}

pub fn engine() -> (PlaybackEngine, OfflineRenderer) {
    let factory = OfflineOutputFactory::new(RATE);
    let renderer = factory.renderer();
    (PlaybackEngine::new(Box::new(factory)), renderer)
}

/// Advance the offline output by `seconds` in 10 ms blocks
pub fn advance(renderer: &OfflineRenderer, seconds: f64) {
    renderer
        .render_seconds(seconds, RATE, (RATE / 100) as usize)
        .expect("output context open");
}
