//! Standard locations for configuration and saved stems

use std::path::PathBuf;

/// Config file name inside the application config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Get the default config file path
///
/// Returns: `~/.config/vocalsplit/config.yaml` (platform equivalent elsewhere)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vocalsplit")
        .join(CONFIG_FILE_NAME)
}

/// Directory downloaded stems are saved to when none is configured
///
/// Falls back to the current directory on systems without a downloads folder.
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}
