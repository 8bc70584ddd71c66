//! Lock-free command queue from the control thread to the audio thread
//!
//! The control thread pushes commands without blocking; the audio callback
//! pops them at the start of each block, so a command takes effect on a block
//! boundary and never mid-block.
//!
//! ```ignore
//! let (mut tx, mut rx) = command_channel();
//! tx.push(EngineCommand::Stop)?;          // control thread
//! mixer.process_commands(&mut rx);         // audio thread
//! ```

use basedrop::Owned;

use super::mixer::PlaybackUnit;
use crate::types::NUM_STEMS;

/// Capacity of the command ringbuffer
///
/// Transport commands arrive at human speed; 64 leaves room for a burst of
/// seeks without the producer ever seeing a full queue.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Commands processed by the audio thread
pub enum EngineCommand {
    /// Replace whatever is playing with these units, both starting on the
    /// next rendered frame
    Start {
        /// Identifies this start in [`MixerAtomics`](super::mixer::MixerAtomics)
        generation: u64,
        /// Dropping units on the audio thread only queues them for the
        /// owning context's collector
        units: Owned<[PlaybackUnit; NUM_STEMS]>,
    },
    /// Stop both units
    Stop,
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::Start { generation, units } => f
                .debug_struct("Start")
                .field("generation", generation)
                .field("offset_seconds", &units[0].offset_seconds())
                .finish(),
            EngineCommand::Stop => f.write_str("Stop"),
        }
    }
}

/// Create the command queue
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}
