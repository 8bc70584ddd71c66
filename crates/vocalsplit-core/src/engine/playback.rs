//! Playback engine: the transport state machine
//!
//! ```text
//!   Idle ──load──► Loading ──ok──► Ready ──play──► Playing ⇄ Paused
//!                     │                              │
//!                     └──err──► Error                └─vocal ends─► Ended
//!                                                                     │
//!                                          Playing (from 0) ◄──play───┘
//! ```
//!
//! The engine lives on the control thread. Starting playback hands a pair of
//! fresh [`PlaybackUnit`]s to the mixer in a single command and records a
//! clock anchor. The position while playing is derived from the clock frame
//! at which the mixer applied that command, never accumulated.

use std::fmt;

use thiserror::Error;

use super::mixer::PlaybackUnit;
use super::output::{OutputContext, OutputFactory};
use crate::audio::AudioError;
use crate::loader::{AssetLoader, LoadError, LoadedStems};
use crate::source::StemPair;
use crate::types::{StemRole, NUM_STEMS};

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Nothing loaded
    #[default]
    Idle,
    /// A load is in flight; transport calls are ignored
    Loading,
    Ready,
    Playing,
    Paused,
    /// Vocal stem played to its end
    Ended,
    /// Last load failed; transport disabled until a load succeeds
    Error,
}

impl EngineState {
    /// Whether play/pause/seek are available
    pub fn transport_enabled(self) -> bool {
        matches!(
            self,
            EngineState::Ready | EngineState::Playing | EngineState::Paused | EngineState::Ended
        )
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EngineState::Idle => "idle",
            EngineState::Loading => "loading",
            EngineState::Ready => "ready",
            EngineState::Playing => "playing",
            EngineState::Paused => "paused",
            EngineState::Ended => "ended",
            EngineState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Snapshot of the session as the UI sees it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackSession {
    pub is_playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub vocal_muted: bool,
    pub accompaniment_muted: bool,
}

impl PlaybackSession {
    fn fresh(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            ..Self::default()
        }
    }

    pub fn is_muted(&self, role: StemRole) -> bool {
        match role {
            StemRole::Vocals => self.vocal_muted,
            StemRole::Accompaniment => self.accompaniment_muted,
        }
    }

    pub fn muted(&self) -> [bool; NUM_STEMS] {
        [self.vocal_muted, self.accompaniment_muted]
    }

    fn set_muted(&mut self, role: StemRole, muted: bool) {
        match role {
            StemRole::Vocals => self.vocal_muted = muted,
            StemRole::Accompaniment => self.accompaniment_muted = muted,
        }
    }
}

/// Errors that put the engine into [`EngineState::Error`]
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("audio output unavailable: {0}")]
    Output(#[from] AudioError),
}

impl EngineError {
    /// Message for the user; details go to the log
    pub fn user_message(&self) -> &'static str {
        match self {
            EngineError::Load(e) => e.user_message(),
            EngineError::Output(_) => "audio output unavailable",
        }
    }
}

/// The start the current units were sent with
#[derive(Debug, Clone, Copy)]
struct ClockAnchor {
    offset_seconds: f64,
    /// Start generation the units were sent with
    generation: u64,
}

pub struct PlaybackEngine {
    factory: Box<dyn OutputFactory>,
    state: EngineState,
    session: PlaybackSession,
    stems: Option<LoadedStems>,
    output: Option<OutputContext>,
    anchor: Option<ClockAnchor>,
    last_error: Option<&'static str>,
}

impl PlaybackEngine {
    pub fn new(factory: Box<dyn OutputFactory>) -> Self {
        Self {
            factory,
            state: EngineState::Idle,
            session: PlaybackSession::default(),
            stems: None,
            output: None,
            anchor: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn session(&self) -> PlaybackSession {
        self.session
    }

    pub fn stems(&self) -> Option<&LoadedStems> {
        self.stems.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.state == EngineState::Playing
    }

    /// User-facing message of the last failed load
    pub fn last_error(&self) -> Option<&'static str> {
        self.last_error
    }

    /// Release the output and drop the buffers; back to Idle
    ///
    /// Safe to call in any state, any number of times.
    pub fn teardown(&mut self) {
        if let Some(mut output) = self.output.take() {
            output.close();
        }
        self.stems = None;
        self.anchor = None;
        self.session = PlaybackSession::default();
        self.state = EngineState::Idle;
    }

    /// Tear down and enter Loading; transport calls are ignored until
    /// [`complete_load`](Self::complete_load)
    pub fn begin_load(&mut self) {
        self.teardown();
        self.last_error = None;
        self.state = EngineState::Loading;
        log::info!("engine: loading");
    }

    /// Finish a load started with [`begin_load`](Self::begin_load)
    ///
    /// On success a fresh output context is opened over the new buffers and
    /// the session is reset. Any failure leaves the engine in Error.
    pub fn complete_load(
        &mut self,
        result: Result<LoadedStems, LoadError>,
    ) -> Result<(), EngineError> {
        match self.install(result) {
            Ok(()) => {
                log::info!(
                    "engine: ready, duration {:.2}s",
                    self.session.duration_seconds
                );
                Ok(())
            }
            Err(e) => {
                log::error!("engine: load failed: {}", e);
                self.teardown();
                self.state = EngineState::Error;
                self.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Load a pair synchronously on the calling thread
    pub fn load(&mut self, loader: &AssetLoader, pair: &StemPair) -> Result<(), EngineError> {
        self.begin_load();
        let result = loader.load(&pair.vocals, &pair.accompaniment);
        self.complete_load(result)
    }

    fn install(&mut self, result: Result<LoadedStems, LoadError>) -> Result<(), EngineError> {
        let stems = result?;
        let output = self.factory.open()?;
        for role in StemRole::ALL {
            output.set_gain(role, 1.0);
        }
        self.session = PlaybackSession::fresh(stems.duration_seconds());
        self.stems = Some(stems);
        self.output = Some(output);
        self.anchor = None;
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Start both stems at the current position
    ///
    /// From Ended, playback restarts at 0. Returns false when there is
    /// nothing to play or playback is already running.
    pub fn play(&mut self) -> bool {
        match self.state {
            EngineState::Ready | EngineState::Paused => {}
            EngineState::Ended => self.session.position_seconds = 0.0,
            _ => return false,
        }

        if !self.start_units(self.session.position_seconds) {
            return false;
        }
        self.state = EngineState::Playing;
        self.session.is_playing = true;
        log::debug!("engine: play at {:.3}s", self.session.position_seconds);
        true
    }

    /// Stop both stems, keeping the position
    pub fn pause(&mut self) -> bool {
        if self.state != EngineState::Playing {
            return false;
        }
        let position = self.current_position();
        if let Some(output) = self.output.as_mut() {
            output.stop();
        }
        self.anchor = None;
        self.session.position_seconds = position;
        self.session.is_playing = false;
        self.state = EngineState::Paused;
        log::debug!("engine: pause at {:.3}s", position);
        true
    }

    pub fn toggle_play(&mut self) -> bool {
        if self.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Move to `target_seconds`, clamped to the session
    ///
    /// While playing, both stems restart at the target in one command.
    /// From Ended the engine moves to Paused so the next play resumes at the
    /// target.
    pub fn seek(&mut self, target_seconds: f64) -> bool {
        if !self.state.transport_enabled() {
            return false;
        }

        let target = if target_seconds.is_nan() {
            0.0
        } else {
            target_seconds.clamp(0.0, self.session.duration_seconds)
        };

        match self.state {
            EngineState::Playing => {
                if !self.start_units(target) {
                    return false;
                }
            }
            EngineState::Ended => self.state = EngineState::Paused,
            _ => {}
        }

        self.session.position_seconds = target;
        log::debug!("engine: seek to {:.3}s", target);
        true
    }

    /// Mute or unmute one stem; transport is unaffected
    pub fn set_muted(&mut self, role: StemRole, muted: bool) -> bool {
        if self.stems.is_none() {
            return false;
        }
        self.session.set_muted(role, muted);
        if let Some(output) = self.output.as_ref() {
            output.set_gain(role, if muted { 0.0 } else { 1.0 });
        }
        true
    }

    /// Gain currently applied to a stem's path
    pub fn gain(&self, role: StemRole) -> f32 {
        match self.output.as_ref() {
            Some(output) => output.gain(role),
            None if self.session.is_muted(role) => 0.0,
            None => 1.0,
        }
    }

    /// Playback position in seconds, within `[0, duration]`
    ///
    /// While playing this is `offset + (clock_now - clock_at_start)`, where
    /// `clock_at_start` is the block that applied the start. Until the mixer
    /// has applied it the position stays at the offset.
    pub fn current_position(&self) -> f64 {
        match (self.state, self.anchor, self.output.as_ref()) {
            (EngineState::Playing, Some(anchor), Some(output)) => {
                let elapsed = output
                    .start_clock(anchor.generation)
                    .map_or(0.0, |start| output.clock_seconds() - start);
                (anchor.offset_seconds + elapsed).clamp(0.0, self.session.duration_seconds)
            }
            _ => self.session.position_seconds,
        }
    }

    /// Refresh the session from the audio side (once per display frame)
    ///
    /// Publishes the clock-derived position and detects the vocal stem
    /// reaching its end.
    pub fn poll(&mut self) -> PlaybackSession {
        if let Some(output) = self.output.as_mut() {
            output.collect_garbage();
        }
        if self.state != EngineState::Playing {
            return self.session;
        }

        let ended = match (self.output.as_ref(), self.anchor) {
            (Some(output), Some(anchor)) => output.has_ended(anchor.generation),
            _ => false,
        };

        if ended {
            if let Some(output) = self.output.as_mut() {
                output.stop();
            }
            self.anchor = None;
            self.session.position_seconds = self.session.duration_seconds;
            self.session.is_playing = false;
            self.state = EngineState::Ended;
            log::info!("engine: reached end");
        } else {
            self.session.position_seconds = self.current_position();
        }

        self.session
    }

    fn start_units(&mut self, offset_seconds: f64) -> bool {
        let (Some(stems), Some(output)) = (self.stems.as_ref(), self.output.as_mut()) else {
            return false;
        };

        let end = self.session.duration_seconds;
        let rate = output.sample_rate();
        let units = [
            PlaybackUnit::new(stems.vocals.clone(), offset_seconds, end, rate),
            PlaybackUnit::new(stems.accompaniment.clone(), offset_seconds, end, rate),
        ];

        let Some(generation) = output.start_pair(units) else {
            return false;
        };
        self.anchor = Some(ClockAnchor {
            offset_seconds,
            generation,
        });
        true
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
