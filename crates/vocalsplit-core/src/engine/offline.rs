//! Device-less output
//!
//! Runs the same [`StemMixer`] as the cpal backend, but blocks are rendered
//! on demand through an [`OfflineRenderer`] (tests, analysis) or by a paced
//! thread that mimics a sound card (headless playback).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::command::{command_channel, EngineCommand};
use super::mixer::{MixerAtomics, StemMixer};
use super::output::{OutputBackend, OutputContext, OutputFactory};
use crate::audio::{AudioError, AudioResult, DEFAULT_SAMPLE_RATE};
use crate::types::StereoSample;

struct OfflineState {
    id: u64,
    mixer: StemMixer,
    commands: rtrb::Consumer<EngineCommand>,
}

type Slot = Arc<Mutex<Option<OfflineState>>>;

/// Renders blocks for whichever offline context is currently open
#[derive(Clone)]
pub struct OfflineRenderer {
    slot: Slot,
    opened: Arc<AtomicU64>,
}

impl OfflineRenderer {
    /// Render `frames` output frames
    ///
    /// Returns `None` when no context is open.
    pub fn render(&self, frames: usize) -> Option<Vec<StereoSample>> {
        let mut guard = self.slot.lock().ok()?;
        let state = guard.as_mut()?;
        let mut block = vec![StereoSample::silence(); frames];
        state.mixer.process_commands(&mut state.commands);
        state.mixer.process(&mut block);
        Some(block)
    }

    /// Render `seconds` of output in blocks of `block_frames`
    pub fn render_seconds(
        &self,
        seconds: f64,
        sample_rate: u32,
        block_frames: usize,
    ) -> Option<Vec<StereoSample>> {
        let total = (seconds * sample_rate as f64).round() as usize;
        let block_frames = block_frames.max(1);
        let mut rendered = Vec::with_capacity(total);
        while rendered.len() < total {
            let frames = block_frames.min(total - rendered.len());
            rendered.extend(self.render(frames)?);
        }
        Some(rendered)
    }

    pub fn is_open(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Number of contexts opened so far
    pub fn opened_count(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }
}

/// Opens offline output contexts
pub struct OfflineOutputFactory {
    sample_rate: u32,
    /// Block size and period of the pacing thread, if any
    pacing: Option<usize>,
    renderer: OfflineRenderer,
}

impl OfflineOutputFactory {
    /// Blocks are rendered only when the caller asks for them
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            pacing: None,
            renderer: OfflineRenderer {
                slot: Arc::new(Mutex::new(None)),
                opened: Arc::new(AtomicU64::new(0)),
            },
        }
    }

    /// A thread renders `block_frames` every block period, in real time
    pub fn paced(sample_rate: u32, block_frames: usize) -> Self {
        Self {
            pacing: Some(block_frames.max(1)),
            ..Self::new(sample_rate)
        }
    }

    pub fn renderer(&self) -> OfflineRenderer {
        self.renderer.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Default for OfflineOutputFactory {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl OutputFactory for OfflineOutputFactory {
    fn open(&self) -> AudioResult<OutputContext> {
        let id = self.renderer.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let atomics = Arc::new(MixerAtomics::new());
        let (producer, commands) = command_channel();

        {
            let mut slot = self
                .renderer
                .slot
                .lock()
                .map_err(|_| AudioError::StreamBuildError("offline output poisoned".into()))?;
            *slot = Some(OfflineState {
                id,
                mixer: StemMixer::new(atomics.clone()),
                commands,
            });
        }

        if let Some(block_frames) = self.pacing {
            spawn_pacer(self.renderer.clone(), id, block_frames, self.sample_rate)?;
        }

        let backend = OfflineBackend {
            id,
            slot: self.renderer.slot.clone(),
        };
        Ok(OutputContext::new(
            producer,
            atomics,
            self.sample_rate,
            Box::new(backend),
        ))
    }
}

struct OfflineBackend {
    id: u64,
    slot: Slot,
}

impl OutputBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }
}

impl Drop for OfflineBackend {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            // A newer context may already own the slot
            if slot.as_ref().is_some_and(|state| state.id == self.id) {
                *slot = None;
            }
        }
    }
}

fn spawn_pacer(
    renderer: OfflineRenderer,
    id: u64,
    block_frames: usize,
    sample_rate: u32,
) -> AudioResult<()> {
    let period = Duration::from_secs_f64(block_frames as f64 / sample_rate.max(1) as f64);
    thread::Builder::new()
        .name("offline-output".to_string())
        .spawn(move || loop {
            let current = renderer
                .slot
                .lock()
                .map(|slot| slot.as_ref().map(|state| state.id) == Some(id))
                .unwrap_or(false);
            if !current || renderer.render(block_frames).is_none() {
                break;
            }
            thread::sleep(period);
        })
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;
    Ok(())
}
