//! Tracker configuration
//!
//! [`TrackerConfig`] is the static file configuration loaded from YAML at
//! boot. [`RuntimeConfig`] is the set of options the server can change
//! while the tracker runs, and only inbound control messages mutate it.

use crate::payload::ControlMessage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Validation failures for the file configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("server host must not be empty")]
    EmptyHost,

    #[error("server port must not be 0")]
    ZeroPort,

    #[error("APN must not be empty")]
    EmptyApn,

    #[error("tick interval must be greater than 0")]
    ZeroTick,
}

/// Top-level configuration loaded from YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub server: ServerConfig,
    pub network: NetworkConfig,
    pub modem: ModemConfig,
    pub timing: TimingConfig,
    pub device: DeviceConfig,
    pub store: StoreConfig,
}

/// Remote collector the batches are sent to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "rnqrg-185-223-151-250.a.free.pinggy.link".to_string(),
            port: 32913,
        }
    }
}

/// Cellular bearer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub apn: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            apn: "iot.1nce.net".to_string(),
        }
    }
}

/// Where the host runner reaches the modem's serial line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    pub address: String,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum interval between orchestrator ticks
    pub tick_interval_ms: u64,

    /// Initial wait between cycles, until the server sends another
    pub adjustment_period_ms: u64,

    /// Offset applied when logging fix times
    pub utc_offset_hours: i32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            adjustment_period_ms: 30_000,
            utc_offset_hours: 1,
        }
    }
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn adjustment_period(&self) -> Duration {
        Duration::from_millis(self.adjustment_period_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Identity used when neither the modem nor the store can provide one
    pub imei: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Configured store image path, or `<data dir>/gnss-tracker/store.bin`
    pub fn resolve_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("gnss-tracker")
                .join("store.bin"),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as a mapping
        let config: TrackerConfig = if yaml.trim().is_empty() {
            TrackerConfig::default()
        } else {
            serde_yaml::from_str(yaml).context("Invalid tracker config")?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.server.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.network.apn.trim().is_empty() {
            return Err(ConfigError::EmptyApn);
        }
        if self.timing.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        Ok(())
    }

    /// Runtime options the tracker starts with
    pub fn initial_runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            adjustment_period: self.timing.adjustment_period(),
            ..RuntimeConfig::default()
        }
    }
}

/// HDOP gate applied to new fixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecisionFilter {
    pub active: bool,
    /// Fixes need an HDOP strictly below this value
    pub threshold: i64,
}

impl Default for PrecisionFilter {
    fn default() -> Self {
        Self {
            active: false,
            threshold: 3,
        }
    }
}

impl PrecisionFilter {
    /// A fix without an HDOP reading is never rejected
    pub fn accepts(&self, hdop: Option<f32>) -> bool {
        match (self.active, hdop) {
            (true, Some(hdop)) => f64::from(hdop) < self.threshold as f64,
            _ => true,
        }
    }
}

/// Options the server can change at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Minimum time between the starts of two cycles
    pub adjustment_period: Duration,

    /// Begin the next cycle without waiting out the adjustment period
    pub start: bool,

    pub precision: PrecisionFilter,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            adjustment_period: Duration::from_millis(30_000),
            start: false,
            precision: PrecisionFilter::default(),
        }
    }
}

impl RuntimeConfig {
    /// Apply each option present in a decoded control message
    pub fn apply(&mut self, message: &ControlMessage) {
        if let Some(period) = message.periode {
            self.adjustment_period = Duration::from_millis(period);
            info!(period_ms = period, "Adjustment period updated");
        }
        if let Some(start) = message.start {
            self.start = start;
            info!(start, "Start flag updated");
        }
        if let Some(precision) = &message.precision {
            if let Some(threshold) = precision.valeur {
                self.precision.threshold = threshold;
            }
            if let Some(active) = precision.active {
                self.precision.active = active;
            }
            info!(
                active = self.precision.active,
                threshold = self.precision.threshold,
                "Precision filter updated"
            );
        }
    }

    /// Read and clear the start flag
    pub fn take_start(&mut self) -> bool {
        std::mem::take(&mut self.start)
    }
}
