//! cpal output backend
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Control Thread  │───push()───────────►│   Command Queue     │
//! │ (PlaybackEngine) │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         │                                           │
//!         │ Relaxed atomics                           │ pop()
//!         ▼                                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │   MixerAtomics   │◄────────────────────│  cpal Audio Thread  │
//! │   (lock-free)    │   clock, end flag   │  (owns StemMixer)   │
//! └──────────────────┘                     └─────────────────────┘
//! ```

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::{AudioConfig, BufferSize, MAX_BUFFER_SIZE};
use super::device::{find_device_by_id, get_cpal_default_device};
use super::error::{AudioError, AudioResult};
use crate::engine::{
    command_channel, EngineCommand, MixerAtomics, OutputBackend, OutputContext, OutputFactory,
    StemMixer,
};
use crate::types::StereoBuffer;

/// Opens a cpal output stream per load cycle
pub struct CpalOutputFactory {
    config: AudioConfig,
}

impl CpalOutputFactory {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }
}

impl OutputFactory for CpalOutputFactory {
    fn open(&self) -> AudioResult<OutputContext> {
        let device = match &self.config.device {
            Some(id) => find_device_by_id(id)?,
            None => get_cpal_default_device()?,
        };
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = get_output_config(&device, &self.config)?;
        let sample_rate = supported.sample_rate().0;
        let buffer_size = self.config.buffer_size;
        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: stream_buffer_size(buffer_size),
        };

        let buffer_label = match (buffer_size.fixed_frames(), buffer_size.latency_ms(sample_rate)) {
            (Some(frames), Some(latency)) => format!("{} frames ({:.1}ms)", frames, latency),
            _ => "host buffer size".to_string(),
        };
        log::info!(
            "Opening output '{}': {}Hz, {} channels, {}",
            device_name,
            sample_rate,
            stream_config.channels,
            buffer_label
        );

        let atomics = Arc::new(MixerAtomics::new());
        let (producer, command_rx) = command_channel();
        let state = AudioCallbackState::new(StemMixer::new(atomics.clone()), command_rx);

        let stream = build_output_stream(&device, &stream_config, state)?;
        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        Ok(OutputContext::new(
            producer,
            atomics,
            sample_rate,
            Box::new(CpalBackend {
                _stream: stream,
                device_name,
            }),
        ))
    }
}

/// Keeps the stream alive; dropping it stops the device
struct CpalBackend {
    _stream: Stream,
    device_name: String,
}

impl OutputBackend for CpalBackend {
    fn name(&self) -> &str {
        &self.device_name
    }
}

/// Everything the audio callback owns
struct AudioCallbackState {
    mixer: StemMixer,
    command_rx: rtrb::Consumer<EngineCommand>,
    /// Pre-allocated block buffer
    buffer: StereoBuffer,
}

impl AudioCallbackState {
    fn new(mixer: StemMixer, command_rx: rtrb::Consumer<EngineCommand>) -> Self {
        Self {
            mixer,
            command_rx,
            buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    /// Render `n_frames` (at most the buffer capacity) into the block buffer
    fn process(&mut self, n_frames: usize) {
        // RT-safe: no allocation
        self.buffer.set_len_from_capacity(n_frames);
        self.mixer.process_commands(&mut self.command_rx);
        self.mixer.process(self.buffer.as_mut_slice());
    }

    /// Fill an interleaved device buffer with `channels` channels
    fn render_into(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        // Hosts may hand out more than the requested block size
        for chunk in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
            let frames = chunk.len() / channels;
            self.process(frames);

            if channels == 2 {
                chunk[..frames * 2].copy_from_slice(self.buffer.as_interleaved());
                continue;
            }
            for (frame, sample) in chunk.chunks_mut(channels).zip(self.buffer.as_slice()) {
                frame[0] = sample.left;
                if channels > 1 {
                    frame[1] = sample.right;
                }
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }
        }
    }
}

/// cpal buffer size for the configured one
fn stream_buffer_size(buffer_size: BufferSize) -> CpalBufferSize {
    match buffer_size.fixed_frames() {
        Some(frames) => CpalBufferSize::Fixed(frames),
        None => CpalBufferSize::Default,
    }
}

/// Pick a stream configuration, preferring f32 stereo at the target rate
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target_sample_rate = config.target_sample_rate();
    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_sample_rate)
    };

    let best_config = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        .find(in_range)
        .or_else(|| {
            supported_configs
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        })
        .ok_or_else(|| {
            AudioError::ConfigError("No f32 stereo output configuration".to_string())
        })?;

    let sample_rate = if in_range(&best_config) {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best_config.max_sample_rate();
        log::warn!(
            "Output device doesn't support {}Hz, falling back to {}Hz (stems will be resampled)",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    Ok(best_config.clone().with_sample_rate(sample_rate))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut state: AudioCallbackState,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                state.render_into(data, channels);
            },
            move |err| {
                log::error!("Output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodedStem;
    use crate::engine::PlaybackUnit;
    use crate::types::StemRole;
    use basedrop::{Collector, Owned};

    /// Callback state already playing a left=0.25, right=0.5 vocal
    fn playing_state(collector: &Collector) -> (AudioCallbackState, Arc<MixerAtomics>) {
        let atomics = Arc::new(MixerAtomics::new());
        let (mut tx, rx) = command_channel();
        let frames = 2 * MAX_BUFFER_SIZE;
        let vocals = Arc::new(DecodedStem::from_channels(
            StemRole::Vocals,
            vec![vec![0.25; frames], vec![0.5; frames]],
            1000,
        ));
        let accompaniment = Arc::new(DecodedStem::from_channels(
            StemRole::Accompaniment,
            vec![vec![0.0; frames]],
            1000,
        ));
        let end = vocals.duration_seconds();
        let units = Owned::new(
            &collector.handle(),
            [
                PlaybackUnit::new(vocals, 0.0, end, 1000),
                PlaybackUnit::new(accompaniment, 0.0, end, 1000),
            ],
        );
        tx.push(EngineCommand::Start { generation: 1, units }).unwrap();
        let state = AudioCallbackState::new(StemMixer::new(atomics.clone()), rx);
        (state, atomics)
    }

    #[test]
    fn test_stereo_device_gets_interleaved_block() {
        let collector = Collector::new();
        let (mut state, atomics) = playing_state(&collector);
        let mut data = vec![9.0f32; 8];
        state.render_into(&mut data, 2);
        assert_eq!(data, [0.25, 0.5, 0.25, 0.5, 0.25, 0.5, 0.25, 0.5]);
        assert_eq!(atomics.frames_rendered(), 4);
    }

    #[test]
    fn test_extra_channels_are_silent() {
        let collector = Collector::new();
        let (mut state, _atomics) = playing_state(&collector);
        let mut data = vec![9.0f32; 8];
        state.render_into(&mut data, 4);
        assert_eq!(data, [0.25, 0.5, 0.0, 0.0, 0.25, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_oversized_device_buffer_is_rendered_in_chunks() {
        let collector = Collector::new();
        let (mut state, atomics) = playing_state(&collector);
        let frames = MAX_BUFFER_SIZE + 10;
        let mut data = vec![9.0f32; frames * 2];
        state.render_into(&mut data, 2);
        assert_eq!(atomics.frames_rendered(), frames as u64);
        assert!(data.chunks(2).all(|frame| frame == [0.25, 0.5]));
    }

    #[test]
    fn test_stream_buffer_size_follows_config() {
        assert_eq!(stream_buffer_size(BufferSize::Default), CpalBufferSize::Default);
        assert_eq!(
            stream_buffer_size(BufferSize::Fixed(256)),
            CpalBufferSize::Fixed(256)
        );
        assert_eq!(
            stream_buffer_size(BufferSize::Fixed(1)),
            CpalBufferSize::Fixed(64)
        );
    }
}
