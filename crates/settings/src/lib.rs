//! FlightGuard Settings
//!
//! Node configuration for FlightGuard binaries.
//!
//! ## Features
//!
//! - Node settings (listen address, identity file)
//! - Relay tuning (latency threshold, monitor interval, hash checks)
//! - Bootstrap neighbors
//! - JSON file storage under `~/.flightguard`
//!
//! ## Usage
//!
//! ```no_run
//! use flightguard_settings::Settings;
//!
//! // Load or create default settings
//! let mut settings = Settings::load_or_default()?;
//!
//! // Modify settings
//! settings.relay.latency_threshold_ms = 3000;
//!
//! // Save settings
//! settings.save()?;
//! # Ok::<(), flightguard_settings::SettingsError>(())
//! ```

mod config;

pub use config::{BootstrapNeighbor, NetworkSettings, NodeSettings, RelaySettings, Settings};

use std::path::PathBuf;

use flightguard_keystore::default_config_dir;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("Invalid setting {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}
