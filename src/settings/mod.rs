//! Settings for the interception core.
//!
//! Settings are read from a TOML file; any field left out takes its
//! default.
//!
//! # Example
//!
//! ```toml
//! wait_timeout_ms = 500
//! max_queued_packets = 4096
//! announce_connections = true
//! ```

pub mod relay;

use log::info;
use std::fs;
use std::path::Path;

use crate::error::Result;

// Re-export commonly used types
pub use relay::RelaySettings;

/// Loads settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<RelaySettings> {
    let content = fs::read_to_string(path)?;
    let settings = parse_settings(&content)?;

    info!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Parses settings from TOML text.
pub fn parse_settings(content: &str) -> Result<RelaySettings> {
    Ok(toml::from_str(content)?)
}

/// Writes settings to a TOML file.
pub fn save_settings(path: &Path, settings: &RelaySettings) -> Result<()> {
    let content = toml::to_string_pretty(settings)?;
    fs::write(path, content)?;

    info!("Saved settings to {}", path.display());
    Ok(())
}
