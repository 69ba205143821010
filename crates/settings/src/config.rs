//! Configuration types

use std::path::PathBuf;
use std::time::Duration;

use flightguard_core::{Id, ID_LEN};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{default_settings_path, Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Node settings
    #[serde(default)]
    pub node: NodeSettings,

    /// Relay tuning
    #[serde(default)]
    pub relay: RelaySettings,

    /// Network settings
    #[serde(default)]
    pub network: NetworkSettings,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let mut settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            settings.config_path = Some(path.clone());
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            let mut settings = Self::default();
            settings.config_path = Some(path.clone());
            Ok(settings)
        }
    }

    /// Save settings to the configured path
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// Node settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    /// UDP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Identity file path (defaults to the keystore's)
    #[serde(default)]
    pub keyfile: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:7400".to_string()
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            keyfile: None,
        }
    }
}

/// Relay tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Neighbors slower than this are pinged
    #[serde(default = "default_latency_threshold")]
    pub latency_threshold_ms: u32,

    /// Seconds between latency scans
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,

    /// Reject packets whose payload hash does not match
    #[serde(default = "default_true")]
    pub verify_payload_hash: bool,
}

fn default_latency_threshold() -> u32 {
    5000
}

fn default_monitor_interval() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            latency_threshold_ms: default_latency_threshold(),
            monitor_interval_secs: default_monitor_interval(),
            verify_payload_hash: true,
        }
    }
}

impl RelaySettings {
    /// Monitor interval, never shorter than one second
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(1))
    }
}

/// Network settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Neighbors known before any traffic is seen
    #[serde(default)]
    pub bootstrap_neighbors: Vec<BootstrapNeighbor>,
}

/// A neighbor seeded from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapNeighbor {
    /// Hex-encoded aircraft id (the peer's certificate)
    pub aircraft_id: String,

    /// `host:port`
    pub addr: String,
}

impl BootstrapNeighbor {
    /// Decode the hex aircraft id
    pub fn id(&self) -> Result<Id> {
        let bytes = hex::decode(&self.aircraft_id).map_err(|e| SettingsError::InvalidValue {
            field: "aircraft_id",
            reason: e.to_string(),
        })?;
        Id::try_from(bytes.as_slice()).map_err(|_| SettingsError::InvalidValue {
            field: "aircraft_id",
            reason: format!("expected {} bytes, got {}", ID_LEN, bytes.len()),
        })
    }
}
