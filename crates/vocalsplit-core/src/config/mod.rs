//! Configuration for VocalSplit
//!
//! - Generic YAML config loading/saving
//! - Default config location
//! - The application settings tree ([`VocalSplitConfig`])
//!
//! # Usage
//!
//! ```ignore
//! use vocalsplit_core::config::{load_config, save_config, default_config_path, VocalSplitConfig};
//!
//! let path = default_config_path();
//! let config: VocalSplitConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, save_config};
pub use paths::{default_config_path, default_download_dir, CONFIG_FILE_NAME};
pub use settings::{
    DownloadConfig, LoaderConfig, ServiceConfig, TransportConfig, VocalSplitConfig,
    WaveformConfig,
};
