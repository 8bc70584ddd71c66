//! The control-thread handle on an open audio output
//!
//! An [`OutputContext`] is created once per load cycle. It owns the producer
//! end of the command queue, reads the mixer through [`MixerAtomics`], and
//! keeps the backend (a cpal stream, or the offline renderer) alive until
//! [`OutputContext::close`] or drop.
//!
//! Units the mixer lets go of are not freed on the audio thread. They land on
//! the context's [`Collector`], drained by [`OutputContext::collect_garbage`].

use std::sync::Arc;

use basedrop::{Collector, Owned};

use super::command::EngineCommand;
use super::mixer::{MixerAtomics, PlaybackUnit};
use crate::audio::AudioResult;
use crate::types::{StemRole, NUM_STEMS};

/// A running output device; dropping it releases the device
pub trait OutputBackend {
    /// Backend label for logs
    fn name(&self) -> &str;
}

/// Opens output contexts, one per load cycle
pub trait OutputFactory {
    fn open(&self) -> AudioResult<OutputContext>;
}

pub struct OutputContext {
    producer: rtrb::Producer<EngineCommand>,
    atomics: Arc<MixerAtomics>,
    sample_rate: u32,
    /// Generation of the last start sent to the mixer
    generation: u64,
    backend: Option<Box<dyn OutputBackend>>,
    collector: Collector,
}

impl OutputContext {
    pub fn new(
        producer: rtrb::Producer<EngineCommand>,
        atomics: Arc<MixerAtomics>,
        sample_rate: u32,
        backend: Box<dyn OutputBackend>,
    ) -> Self {
        log::debug!("output: opened {} at {}Hz", backend.name(), sample_rate);
        Self {
            producer,
            atomics,
            sample_rate,
            generation: 0,
            backend: Some(backend),
            collector: Collector::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Audio clock in seconds since the output opened
    ///
    /// Advances with every rendered block whether or not anything is playing.
    pub fn clock_seconds(&self) -> f64 {
        self.atomics.frames_rendered() as f64 / self.sample_rate as f64
    }

    /// Hand both units to the mixer in one command
    ///
    /// Returns the generation identifying this start, or `None` (dropping
    /// the units) if the output is closed or the queue is full.
    pub fn start_pair(&mut self, units: [PlaybackUnit; NUM_STEMS]) -> Option<u64> {
        let generation = self.generation + 1;
        let units = Owned::new(&self.collector.handle(), units);
        if !self.send(EngineCommand::Start { generation, units }) {
            return None;
        }
        self.generation = generation;
        Some(generation)
    }

    pub fn stop(&mut self) -> bool {
        self.send(EngineCommand::Stop)
    }

    pub fn set_gain(&self, role: StemRole, gain: f32) {
        self.atomics.set_gain(role, gain);
    }

    pub fn gain(&self, role: StemRole) -> f32 {
        self.atomics.gain(role)
    }

    /// Whether the vocal unit of start `generation` has played to its end
    pub fn has_ended(&self, generation: u64) -> bool {
        generation != 0 && self.atomics.ended_generation() == generation
    }

    /// Clock time at which start `generation` rendered its first frame
    ///
    /// `None` while the start is still queued.
    pub fn start_clock(&self, generation: u64) -> Option<f64> {
        self.atomics
            .started_at(generation)
            .map(|frame| frame as f64 / self.sample_rate as f64)
    }

    /// Free units the mixer has released
    pub fn collect_garbage(&mut self) {
        self.collector.collect();
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// Release the backend; later calls are no-ops
    pub fn close(&mut self) {
        if let Some(backend) = self.backend.take() {
            log::debug!("output: closing {}", backend.name());
            drop(backend);
        }
        self.collector.collect();
    }

    fn send(&mut self, command: EngineCommand) -> bool {
        self.collector.collect();
        if !self.is_open() {
            log::warn!("output: dropping {:?}, context closed", command);
            return false;
        }
        match self.producer.push(command) {
            Ok(()) => true,
            Err(rtrb::PushError::Full(command)) => {
                log::warn!("output: command queue full, dropping {:?}", command);
                false
            }
        }
    }
}

impl Drop for OutputContext {
    fn drop(&mut self) {
        self.close();
    }
}
