//! Two-stem mixer owned by the audio thread
//!
//! Both playback units are read at the same output frame index inside one
//! loop, so once started together they cannot drift apart. Per-stem gain and
//! the output clock are shared with the control thread through
//! [`MixerAtomics`].
//!
//! Units arrive as [`basedrop::Owned`] pointers. Replacing or stopping them
//! on the audio thread only queues them on the context's collector, which the
//! control thread drains.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Owned;

use super::command::EngineCommand;
use crate::decode::DecodedStem;
use crate::types::{StemRole, StereoSample, NUM_STEMS};

/// One stem's read head
///
/// Created per start; a seek or resume builds new units rather than moving
/// existing ones.
pub struct PlaybackUnit {
    stem: Arc<DecodedStem>,
    offset_seconds: f64,
    /// Read position in source frames (fractional when rates differ)
    position: f64,
    /// Source frames advanced per output frame
    step: f64,
    /// Source frame at which the unit completes
    end_frame: f64,
    finished: bool,
}

impl PlaybackUnit {
    /// Build a unit starting at `offset_seconds` that completes at `end_seconds`
    ///
    /// `output_rate` is the rate of the output stream; stems at another rate
    /// are read with linear interpolation.
    pub fn new(
        stem: Arc<DecodedStem>,
        offset_seconds: f64,
        end_seconds: f64,
        output_rate: u32,
    ) -> Self {
        let source_rate = stem.sample_rate() as f64;
        let end_frame = (end_seconds * source_rate).min(stem.frames() as f64);
        Self {
            position: offset_seconds.max(0.0) * source_rate,
            step: source_rate / output_rate.max(1) as f64,
            end_frame,
            offset_seconds,
            stem,
            finished: false,
        }
    }

    pub fn offset_seconds(&self) -> f64 {
        self.offset_seconds
    }

    pub fn role(&self) -> StemRole {
        self.stem.role()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[inline]
    fn next_frame(&mut self) -> StereoSample {
        if self.finished {
            return StereoSample::silence();
        }
        if self.position >= self.end_frame {
            self.finished = true;
            return StereoSample::silence();
        }

        let index = self.position as usize;
        let frac = (self.position - index as f64) as f32;
        let current = self.stem.frame(index);
        let sample = if frac > 0.0 && index + 1 < self.stem.frames() {
            current.lerp(self.stem.frame(index + 1), frac)
        } else {
            current
        };

        self.position += self.step;
        sample
    }
}

/// Mixer state readable from the control thread
///
/// Everything uses `Ordering::Relaxed` except the start pair, where
/// `start_generation` is published with `Release` after `start_frame`.
pub struct MixerAtomics {
    /// Output frames rendered since the stream started
    frames_rendered: AtomicU64,
    /// Per-stem gain as f32 bits
    gains: [AtomicU32; NUM_STEMS],
    /// Generation of the last start whose vocal unit completed (0 = none)
    ended_generation: AtomicU64,
    /// Clock frame at which the last applied start began rendering
    start_frame: AtomicU64,
    /// Generation of the last applied start (0 = none)
    start_generation: AtomicU64,
}

impl MixerAtomics {
    pub fn new() -> Self {
        Self {
            frames_rendered: AtomicU64::new(0),
            gains: [AtomicU32::new(1.0f32.to_bits()), AtomicU32::new(1.0f32.to_bits())],
            ended_generation: AtomicU64::new(0),
            start_frame: AtomicU64::new(0),
            start_generation: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn gain(&self, role: StemRole) -> f32 {
        f32::from_bits(self.gains[role.index()].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_gain(&self, role: StemRole, gain: f32) {
        self.gains[role.index()].store(gain.to_bits(), Ordering::Relaxed);
    }

    /// Generation of the most recent start that played its vocal to the end
    #[inline]
    pub fn ended_generation(&self) -> u64 {
        self.ended_generation.load(Ordering::Relaxed)
    }

    /// Clock frame of the first frame rendered by start `generation`
    ///
    /// `None` until the audio thread has applied that start.
    pub fn started_at(&self, generation: u64) -> Option<u64> {
        if generation == 0 || self.start_generation.load(Ordering::Acquire) != generation {
            return None;
        }
        Some(self.start_frame.load(Ordering::Relaxed))
    }

    fn record_start(&self, generation: u64) {
        self.start_frame
            .store(self.frames_rendered.load(Ordering::Relaxed), Ordering::Relaxed);
        self.start_generation.store(generation, Ordering::Release);
    }
}

impl Default for MixerAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// The audio-thread half of the engine
pub struct StemMixer {
    units: Option<Owned<[PlaybackUnit; NUM_STEMS]>>,
    generation: u64,
    atomics: Arc<MixerAtomics>,
    end_reported: bool,
}

impl StemMixer {
    pub fn new(atomics: Arc<MixerAtomics>) -> Self {
        Self {
            units: None,
            generation: 0,
            atomics,
            end_reported: false,
        }
    }

    pub fn atomics(&self) -> Arc<MixerAtomics> {
        self.atomics.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.units
            .as_ref()
            .is_some_and(|units| !units[StemRole::Vocals.index()].is_finished())
    }

    /// Apply every pending command (call at the top of each block)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(command) = rx.pop() {
            match command {
                EngineCommand::Start { generation, units } => {
                    self.generation = generation;
                    self.end_reported = false;
                    self.units = Some(units);
                    self.atomics.record_start(generation);
                }
                EngineCommand::Stop => {
                    self.units = None;
                }
            }
        }
    }

    /// Render one block
    pub fn process(&mut self, output: &mut [StereoSample]) {
        match self.units.as_mut() {
            None => output.fill(StereoSample::silence()),
            Some(units) => {
                let gains = [
                    self.atomics.gain(StemRole::Vocals),
                    self.atomics.gain(StemRole::Accompaniment),
                ];
                for frame in output.iter_mut() {
                    let mut mixed = StereoSample::silence();
                    for (unit, &gain) in units.iter_mut().zip(gains.iter()) {
                        mixed += unit.next_frame() * gain;
                    }
                    *frame = mixed;
                }

                if !self.end_reported && units[StemRole::Vocals.index()].is_finished() {
                    self.end_reported = true;
                    self.atomics
                        .ended_generation
                        .store(self.generation, Ordering::Relaxed);
                }
            }
        }

        self.atomics
            .frames_rendered
            .fetch_add(output.len() as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::command_channel;
    use basedrop::{Collector, Handle};

    fn constant_stem(role: StemRole, value: f32, frames: usize, rate: u32) -> Arc<DecodedStem> {
        Arc::new(DecodedStem::from_channels(role, vec![vec![value; frames]], rate))
    }

    fn ramp_stem(role: StemRole, frames: usize, rate: u32) -> Arc<DecodedStem> {
        let ramp: Vec<f32> = (0..frames).map(|i| i as f32).collect();
        Arc::new(DecodedStem::from_channels(role, vec![ramp], rate))
    }

    fn start(
        tx: &mut rtrb::Producer<EngineCommand>,
        handle: &Handle,
        vocals: &Arc<DecodedStem>,
        accompaniment: &Arc<DecodedStem>,
        offset: f64,
        rate: u32,
    ) {
        let end = vocals.duration_seconds().min(accompaniment.duration_seconds());
        let units = Owned::new(
            handle,
            [
                PlaybackUnit::new(vocals.clone(), offset, end, rate),
                PlaybackUnit::new(accompaniment.clone(), offset, end, rate),
            ],
        );
        tx.push(EngineCommand::Start { generation: 7, units }).unwrap();
    }

    #[test]
    fn test_silent_without_units_but_clock_runs() {
        let atomics = Arc::new(MixerAtomics::new());
        let mut mixer = StemMixer::new(atomics.clone());
        let mut out = vec![StereoSample::mono(9.0); 128];
        mixer.process(&mut out);
        assert!(out.iter().all(|s| *s == StereoSample::silence()));
        assert_eq!(atomics.frames_rendered(), 128);
    }

    #[test]
    fn test_mix_applies_per_stem_gain() {
        let atomics = Arc::new(MixerAtomics::new());
        let mut mixer = StemMixer::new(atomics.clone());
        let (mut tx, mut rx) = command_channel();
        let collector = Collector::new();
        let vocals = constant_stem(StemRole::Vocals, 0.25, 1000, 1000);
        let accompaniment = constant_stem(StemRole::Accompaniment, 0.5, 1000, 1000);
        start(&mut tx, &collector.handle(), &vocals, &accompaniment, 0.0, 1000);

        let mut out = vec![StereoSample::silence(); 10];
        mixer.process_commands(&mut rx);
        mixer.process(&mut out);
        assert_eq!(out[0], StereoSample::mono(0.75));

        atomics.set_gain(StemRole::Vocals, 0.0);
        mixer.process(&mut out);
        assert_eq!(out[9], StereoSample::mono(0.5));
    }

    #[test]
    fn test_units_start_on_same_frame_from_offset() {
        let atomics = Arc::new(MixerAtomics::new());
        let mut mixer = StemMixer::new(atomics);
        let (mut tx, mut rx) = command_channel();
        let collector = Collector::new();

        // Ramps let the output identify which source frame was read
        let vocals = ramp_stem(StemRole::Vocals, 100, 100);
        let accompaniment = ramp_stem(StemRole::Accompaniment, 100, 100);
        start(&mut tx, &collector.handle(), &vocals, &accompaniment, 0.5, 100);

        let mut out = vec![StereoSample::silence(); 3];
        mixer.process_commands(&mut rx);
        mixer.process(&mut out);
        assert_eq!(out[0], StereoSample::mono(100.0));
        assert_eq!(out[2], StereoSample::mono(104.0));
    }

    #[test]
    fn test_vocal_end_reports_generation() {
        let atomics = Arc::new(MixerAtomics::new());
        let mut mixer = StemMixer::new(atomics.clone());
        let (mut tx, mut rx) = command_channel();
        let collector = Collector::new();
        assert_eq!(atomics.ended_generation(), 0);
        let vocals = constant_stem(StemRole::Vocals, 0.1, 50, 1000);
        let accompaniment = constant_stem(StemRole::Accompaniment, 0.1, 80, 1000);
        start(&mut tx, &collector.handle(), &vocals, &accompaniment, 0.0, 1000);

        let mut out = vec![StereoSample::silence(); 64];
        mixer.process_commands(&mut rx);
        mixer.process(&mut out);
        assert!(!mixer.is_playing());
        assert_eq!(out[63], StereoSample::silence());
        assert_eq!(atomics.ended_generation(), 7);
    }

    #[test]
    fn test_resamples_to_output_rate() {
        let atomics = Arc::new(MixerAtomics::new());
        let mut mixer = StemMixer::new(atomics);
        let (mut tx, mut rx) = command_channel();
        let collector = Collector::new();
        let vocals = ramp_stem(StemRole::Vocals, 10, 10);
        let accompaniment = constant_stem(StemRole::Accompaniment, 0.0, 10, 10);
        start(&mut tx, &collector.handle(), &vocals, &accompaniment, 0.0, 20);

        let mut out = vec![StereoSample::silence(); 4];
        mixer.process_commands(&mut rx);
        mixer.process(&mut out);
        assert_eq!(out[1], StereoSample::mono(0.5));
        assert_eq!(out[3], StereoSample::mono(1.5));
    }

    #[test]
    fn test_replaced_units_wait_for_collector() {
        let atomics = Arc::new(MixerAtomics::new());
        let mut mixer = StemMixer::new(atomics);
        let (mut tx, mut rx) = command_channel();
        let mut collector = Collector::new();
        let vocals = constant_stem(StemRole::Vocals, 0.1, 100, 1000);
        let accompaniment = constant_stem(StemRole::Accompaniment, 0.1, 100, 1000);
        start(&mut tx, &collector.handle(), &vocals, &accompaniment, 0.0, 1000);

        let mut out = vec![StereoSample::silence(); 16];
        mixer.process_commands(&mut rx);
        mixer.process(&mut out);
        assert_eq!(Arc::strong_count(&vocals), 2);

        // The mixer lets go of the units, but they are not freed here
        tx.push(EngineCommand::Stop).unwrap();
        mixer.process_commands(&mut rx);
        mixer.process(&mut out);
        assert_eq!(Arc::strong_count(&vocals), 2);
        assert_eq!(Arc::strong_count(&accompaniment), 2);

        collector.collect();
        assert_eq!(Arc::strong_count(&vocals), 1);
        assert_eq!(Arc::strong_count(&accompaniment), 1);
    }

    #[test]
    fn test_start_frame_is_the_block_that_applied_it() {
        let atomics = Arc::new(MixerAtomics::new());
        let mut mixer = StemMixer::new(atomics.clone());
        let (mut tx, mut rx) = command_channel();
        let collector = Collector::new();
        let vocals = constant_stem(StemRole::Vocals, 0.1, 1000, 1000);
        let accompaniment = constant_stem(StemRole::Accompaniment, 0.1, 1000, 1000);

        // Pushed while a block is already being rendered
        let mut out = vec![StereoSample::silence(); 64];
        mixer.process_commands(&mut rx);
        start(&mut tx, &collector.handle(), &vocals, &accompaniment, 0.0, 1000);
        assert_eq!(atomics.started_at(7), None);
        mixer.process(&mut out);
        assert_eq!(atomics.started_at(7), None);

        mixer.process_commands(&mut rx);
        mixer.process(&mut out);
        assert_eq!(atomics.started_at(7), Some(64));
        assert_eq!(atomics.started_at(6), None);
        assert_eq!(atomics.started_at(0), None);
    }
}
