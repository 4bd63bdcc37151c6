//! Filesystem locations for Joyverse configuration.

use std::path::PathBuf;

use joyverse_core::error::{JoyverseError, Result};

/// Returns the path to the engine configuration file:
/// `~/.config/joyverse/config.toml`
pub fn config_file_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| JoyverseError::config("could not determine home directory"))?;
    Ok(home.join(".config").join("joyverse").join("config.toml"))
}
