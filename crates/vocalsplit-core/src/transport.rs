//! Display-rate transport clock and time formatting
//!
//! The clock never sleeps or spawns anything itself. A host event loop asks
//! for [`TransportClock::next_deadline`], waits until then (or indefinitely
//! when it is `None`), and calls [`TransportClock::on_frame`], which polls
//! the engine and reschedules only while playback continues.

use std::fmt;
use std::time::{Duration, Instant};

use crate::engine::{PlaybackEngine, PlaybackSession};

/// Default UI refresh cadence in frames per second
pub const DEFAULT_FRAME_RATE: u32 = 60;

#[derive(Debug, Clone)]
pub struct TransportClock {
    frame_rate: u32,
    period: Duration,
    deadline: Option<Instant>,
}

impl TransportClock {
    pub fn new(frame_rate: u32) -> Self {
        let frame_rate = frame_rate.max(1);
        Self {
            frame_rate,
            period: Duration::from_nanos(1_000_000_000 / frame_rate as u64),
            deadline: None,
        }
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a frame is scheduled
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Schedule the next frame one period from `now` unless one is pending
    pub fn arm(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.period);
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Arm while the engine plays, cancel otherwise
    ///
    /// Call after every transport operation.
    pub fn sync(&mut self, engine: &PlaybackEngine, now: Instant) {
        if engine.is_playing() {
            self.arm(now);
        } else {
            self.cancel();
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the next frame; `None` when nothing is scheduled
    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Run a frame if one is due
    ///
    /// Polls the engine (publishing the clock-derived position, or moving it
    /// to Ended) and returns the refreshed session. Returns `None` when no
    /// frame was due.
    pub fn on_frame(
        &mut self,
        engine: &mut PlaybackEngine,
        now: Instant,
    ) -> Option<PlaybackSession> {
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return None,
        }

        let session = engine.poll();
        if engine.is_playing() {
            self.deadline = Some(now + self.period);
        } else {
            self.deadline = None;
        }
        Some(session)
    }
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_RATE)
    }
}

/// Format seconds as `mm:ss`, rounding down
///
/// Negative and non-finite input formats as `00:00`. Minutes keep growing
/// past 99.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Parse `90`, `90.5`, `1:30` or `1:30.5` into seconds
pub fn parse_time(text: &str) -> Option<f64> {
    let text = text.trim();
    let seconds = match text.split_once(':') {
        Some((minutes, secs)) => {
            let minutes: u64 = minutes.trim().parse().ok()?;
            let secs: f64 = secs.trim().parse().ok()?;
            if !(0.0..60.0).contains(&secs) {
                return None;
            }
            minutes as f64 * 60.0 + secs
        }
        None => text.parse().ok()?,
    };
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

/// `mm:ss / mm:ss` position readout
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeReadout {
    pub position: f64,
    pub duration: f64,
}

impl TimeReadout {
    pub fn new(position: f64, duration: f64) -> Self {
        Self { position, duration }
    }
}

impl From<PlaybackSession> for TimeReadout {
    fn from(session: PlaybackSession) -> Self {
        Self::new(session.position_seconds, session.duration_seconds)
    }
}

impl fmt::Display for TimeReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", format_time(self.position), format_time(self.duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodedStem;
    use crate::engine::{EngineState, OfflineOutputFactory, OfflineRenderer};
    use crate::loader::LoadedStems;
    use crate::types::StemRole;

    const RATE: u32 = 1000;

    fn playing_engine(seconds: f64) -> (PlaybackEngine, OfflineRenderer) {
        let frames = (seconds * RATE as f64) as usize;
        let factory = OfflineOutputFactory::new(RATE);
        let renderer = factory.renderer();
        let mut engine = PlaybackEngine::new(Box::new(factory));
        engine.begin_load();
        engine
            .complete_load(Ok(LoadedStems::new(
                DecodedStem::from_channels(StemRole::Vocals, vec![vec![0.1; frames]], RATE),
                DecodedStem::from_channels(StemRole::Accompaniment, vec![vec![0.1; frames]], RATE),
            )))
            .unwrap();
        assert!(engine.play());
        (engine, renderer)
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(59.999), "00:59");
        assert_eq!(format_time(61.0), "01:01");
        assert_eq!(format_time(180.0), "03:00");
        assert_eq!(format_time(6000.0), "100:00");
        assert_eq!(format_time(-3.0), "00:00");
        assert_eq!(format_time(f64::NAN), "00:00");
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("90"), Some(90.0));
        assert_eq!(parse_time(" 12.5 "), Some(12.5));
        assert_eq!(parse_time("1:30"), Some(90.0));
        assert_eq!(parse_time("01:30.5"), Some(90.5));
        assert_eq!(parse_time("1:75"), None);
        assert_eq!(parse_time("-4"), None);
        assert_eq!(parse_time("abc"), None);
        assert_eq!(parse_time(""), None);
    }

    #[test]
    fn test_readout() {
        assert_eq!(TimeReadout::new(30.4, 180.0).to_string(), "00:30 / 03:00");
    }

    #[test]
    fn test_idle_clock_has_no_deadline() {
        let mut clock = TransportClock::default();
        assert_eq!(clock.frame_rate(), 60);
        assert!(clock.next_deadline().is_none());

        let factory = OfflineOutputFactory::new(RATE);
        let mut engine = PlaybackEngine::new(Box::new(factory));
        let now = Instant::now();
        clock.sync(&engine, now);
        assert!(clock.next_deadline().is_none());
        assert!(clock.on_frame(&mut engine, now + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_frame_publishes_clock_position() {
        let (mut engine, renderer) = playing_engine(10.0);
        let mut clock = TransportClock::new(50);
        let start = Instant::now();
        clock.sync(&engine, start);
        let deadline = clock.next_deadline().unwrap();
        assert_eq!(deadline, start + Duration::from_millis(20));

        // Not due yet
        assert!(clock.on_frame(&mut engine, start).is_none());

        renderer.render(1500).unwrap();
        let session = clock.on_frame(&mut engine, deadline).unwrap();
        assert!((session.position_seconds - 1.5).abs() < 1e-9);
        assert_eq!(clock.next_deadline(), Some(deadline + clock.period()));
    }

    #[test]
    fn test_clock_stops_when_playback_ends() {
        let (mut engine, renderer) = playing_engine(1.0);
        let mut clock = TransportClock::new(60);
        let now = Instant::now();
        clock.sync(&engine, now);

        renderer.render_seconds(1.2, RATE, 100).unwrap();
        let session = clock.on_frame(&mut engine, now + clock.period()).unwrap();
        assert_eq!(engine.state(), EngineState::Ended);
        assert!(!session.is_playing);
        assert_eq!(session.position_seconds, session.duration_seconds);
        assert!(!clock.is_armed());
    }

    #[test]
    fn test_pause_cancels_pending_frame() {
        let (mut engine, _renderer) = playing_engine(5.0);
        let mut clock = TransportClock::default();
        let now = Instant::now();
        clock.sync(&engine, now);
        assert!(clock.is_armed());

        engine.pause();
        clock.sync(&engine, now);
        assert!(clock.timeout(now).is_none());
    }
}
