//! Synchronized dual-stem playback
//!
//! ```text
//! ┌──────────────────┐   EngineCommand    ┌─────────────────────┐
//! │  PlaybackEngine  │───push()──────────►│   Command Queue     │
//! │ (control thread) │                    │  (lock-free SPSC)   │
//! └──────────────────┘                    └──────────┬──────────┘
//!         ▲                                          │ pop()
//!         │ Relaxed atomics                          ▼
//! ┌──────────────────┐                    ┌─────────────────────┐
//! │   MixerAtomics   │◄───────────────────│     StemMixer       │
//! │ clock/gain/end   │                    │  (audio thread)     │
//! └──────────────────┘                    └─────────────────────┘
//! ```

mod command;
mod mixer;
mod offline;
mod output;
mod playback;

pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use mixer::{MixerAtomics, PlaybackUnit, StemMixer};
pub use offline::{OfflineOutputFactory, OfflineRenderer};
pub use output::{OutputBackend, OutputContext, OutputFactory};
pub use playback::{EngineError, EngineState, PlaybackEngine, PlaybackSession};
