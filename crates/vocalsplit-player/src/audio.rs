//! Output selection for the player
//!
//! Opens the configured cpal device for every load. When no device can be
//! opened (headless machine, device unplugged) or `--no-audio` was given,
//! a paced offline output keeps the transport clock running so the session
//! stays usable.

use vocalsplit_core::audio::{AudioConfig, AudioResult, CpalOutputFactory, DEFAULT_BUFFER_SIZE};
use vocalsplit_core::engine::{OfflineOutputFactory, OutputContext, OutputFactory};

pub struct PlayerOutput {
    device: Option<CpalOutputFactory>,
    offline: OfflineOutputFactory,
}

impl PlayerOutput {
    pub fn new(config: AudioConfig, use_device: bool) -> Self {
        let block_frames = config.buffer_size.fixed_frames().unwrap_or(DEFAULT_BUFFER_SIZE);
        let offline =
            OfflineOutputFactory::paced(config.target_sample_rate(), block_frames as usize);
        Self {
            device: use_device.then(|| CpalOutputFactory::new(config)),
            offline,
        }
    }
}

impl OutputFactory for PlayerOutput {
    fn open(&self) -> AudioResult<OutputContext> {
        if let Some(device) = &self.device {
            match device.open() {
                Ok(context) => return Ok(context),
                Err(e) => {
                    log::warn!("Could not open audio output: {}", e);
                    eprintln!("Warning: no audio output ({}), playing silently", e);
                }
            }
        }
        self.offline.open()
    }
}
