//! # Runtime Configuration
//!
//! TOML-backed settings for loop rates and event plumbing, loaded once
//! at startup. Every field has a default, so a partial (or absent)
//! file is fine.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors from loading a configuration file.
///
/// The one typed-error surface in this workspace: the lifecycle core
/// itself reports misuse through the log sink instead.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for [`RuntimeConfig`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings applied by application setup code when constructing loop
/// units and modules.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Delay between loop-unit steps in milliseconds; 0 = unthrottled.
    pub loop_delay_ms: f64,
    /// Delay between module steps in milliseconds; 0 = as fast as
    /// possible.
    pub module_delay_ms: f64,
    /// Capacity of channel bridges created from hubs.
    pub channel_capacity: usize,
    /// Whether loop units measure updates per second.
    pub track_rate: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loop_delay_ms: 1000.0 / 60.0,
            module_delay_ms: 1000.0 / 60.0,
            channel_capacity: 1024,
            track_rate: false,
        }
    }
}

impl RuntimeConfig {
    /// Parses a TOML document. Missing fields take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}
