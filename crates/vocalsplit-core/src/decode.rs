//! Stem decoding (Symphonia)
//!
//! Fetched bytes are decoded completely into planar f32 channels before
//! playback; nothing is streamed.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::{StemRole, StereoSample};

/// Errors that can occur while decoding a stem
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Container or codec not recognized
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("no decodable audio track")]
    NoAudioTrack,

    /// Stream decoded to zero frames
    #[error("audio stream contains no samples")]
    Empty,

    #[error("corrupt audio data: {0}")]
    Corrupt(String),
}

/// A fully decoded stem
///
/// Immutable once built; the engine and the waveform renderer share it
/// through an `Arc`.
#[derive(Debug, Clone)]
pub struct DecodedStem {
    role: StemRole,
    /// Planar samples, one Vec per channel, all the same length
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl DecodedStem {
    /// Build a stem from planar channel data
    ///
    /// Channels are truncated to the shortest one.
    pub fn from_channels(role: StemRole, mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut channels {
            channel.truncate(frames);
        }
        Self {
            role,
            channels,
            sample_rate,
        }
    }

    pub fn role(&self) -> StemRole {
        self.role
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// First channel (what the waveform preview draws)
    pub fn first_channel(&self) -> &[f32] {
        self.channels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Stereo frame at `index`; mono is duplicated, extra channels ignored
    #[inline]
    pub fn frame(&self, index: usize) -> StereoSample {
        match self.channels.as_slice() {
            [] => StereoSample::silence(),
            [mono] => mono
                .get(index)
                .map(|&s| StereoSample::mono(s))
                .unwrap_or_default(),
            [left, right, ..] => match (left.get(index), right.get(index)) {
                (Some(&l), Some(&r)) => StereoSample::new(l, r),
                _ => StereoSample::silence(),
            },
        }
    }
}

/// Decode a complete audio file held in memory
///
/// `extension` (from the locator path) is only a format hint; the container is
/// detected from the data itself.
pub fn decode_stem(
    role: StemRole,
    bytes: Vec<u8>,
    extension: Option<&str>,
) -> Result<DecodedStem, DecodeError> {
    let byte_len = bytes.len();
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut bad_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // A damaged frame in an otherwise valid stream
                bad_packets += 1;
                log::debug!("decode: skipping bad {} packet: {}", role, e);
                continue;
            }
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        if channel_count == 0 {
            channel_count = spec.channels.count();
        }

        let needs_buffer = sample_buf
            .as_ref()
            .map_or(true, |buf| buf.capacity() < decoded.capacity());
        if needs_buffer {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    if bad_packets > 0 {
        log::warn!("decode: {} stem had {} undecodable packets", role, bad_packets);
    }

    if interleaved.is_empty() || channel_count == 0 || sample_rate == 0 {
        return Err(DecodeError::Empty);
    }

    let channels = deinterleave(&interleaved, channel_count);
    let stem = DecodedStem::from_channels(role, channels, sample_rate);

    log::info!(
        "decode: {} stem {} bytes -> {} frames, {} ch, {}Hz ({:.2}s)",
        role,
        byte_len,
        stem.frames(),
        stem.channel_count(),
        stem.sample_rate(),
        stem.duration_seconds()
    );

    Ok(stem)
}

fn deinterleave(interleaved: &[f32], channel_count: usize) -> Vec<Vec<f32>> {
    let frames = interleaved.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    channels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                for ch in 0..channels {
                    let value = if ch == 0 { (i % 100) as i16 * 100 } else { -1000 };
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_stereo_wav() {
        let bytes = wav_bytes(2, 22050, 22050);
        let stem = decode_stem(StemRole::Vocals, bytes, Some("wav")).unwrap();

        assert_eq!(stem.role(), StemRole::Vocals);
        assert_eq!(stem.sample_rate(), 22050);
        assert_eq!(stem.channel_count(), 2);
        assert_eq!(stem.frames(), 22050);
        assert!((stem.duration_seconds() - 1.0).abs() < 1e-9);
        assert!(stem.channel(1).unwrap().iter().all(|&s| s < 0.0));
    }

    #[test]
    fn test_decode_mono_duplicates_to_stereo() {
        let bytes = wav_bytes(1, 8000, 400);
        let stem = decode_stem(StemRole::Accompaniment, bytes, None).unwrap();
        let frame = stem.frame(50);
        assert_eq!(frame.left, frame.right);
        assert_eq!(stem.frame(10_000), StereoSample::silence());
    }

    #[test]
    fn test_decode_garbage_is_error() {
        let result = decode_stem(StemRole::Vocals, b"definitely not audio".to_vec(), Some("mp3"));
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_empty_wav_is_error() {
        let bytes = wav_bytes(2, 44100, 0);
        assert!(decode_stem(StemRole::Vocals, bytes, Some("wav")).is_err());
    }

    #[test]
    fn test_from_channels_truncates_to_shortest() {
        let stem = DecodedStem::from_channels(
            StemRole::Vocals,
            vec![vec![0.1; 10], vec![0.2; 8]],
            1000,
        );
        assert_eq!(stem.frames(), 8);
        assert_eq!(stem.frame(7), StereoSample::new(0.1, 0.2));
    }
}
