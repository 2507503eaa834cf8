//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `dashboard.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - DeviceConfig: serial port, baud rate and the "simulate" env flag.
//!     - SimulationConfig: value ranges for synthetic readings.
//!     - PollingConfig: refresh timer period.
//!     - StorageConfig: where the csv log lives.
//!     - AlertConfig: thresholds for the warning line.
//!     - ServerConfig: http bind address.
//!     - LoggingConfig: log level and per-reading output.
//!
//! every section and field is optional; anything missing takes its default.
//!
//! ==============================================================================

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// env var that points at an explicit config file
pub const CONFIG_ENV: &str = "CLIMATE_DASH_CONFIG";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub device: DeviceConfig,
    pub simulation: SimulationConfig,
    pub polling: PollingConfig,
    pub storage: StorageConfig,
    pub alerts: AlertConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// pause after opening the port while the board resets
    pub settle_ms: u64,
    pub enabled: bool,
    /// if this environment variable exists at startup the device is never opened
    pub simulate_env: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 1000,
            settle_ms: 2000,
            enabled: true,
            simulate_env: "RAILWAY".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            temperature_min: 20.0,
            temperature_max: 30.0,
            humidity_min: 40.0,
            humidity_max: 60.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 2000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("sensor_data.csv") }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    pub temperature_high: f64,
    pub humidity_high: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { temperature_high: 35.0, humidity_high: 80.0 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8050".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl DashboardConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: DashboardConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let s = &self.simulation;
        anyhow::ensure!(
            s.temperature_min <= s.temperature_max && s.humidity_min <= s.humidity_max,
            "simulation ranges must have min <= max"
        );
        anyhow::ensure!(self.polling.interval_ms > 0, "polling.interval_ms must be positive");
        Ok(())
    }

    /// Load with default fallback. returns the config and a note on where it came from,
    /// since logging is not set up yet when this runs.
    pub fn load_or_default() -> (Self, String) {
        let mut paths = Vec::new();
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from("config").join("dashboard.toml"));
        paths.push(PathBuf::from("..").join("config").join("dashboard.toml"));

        let mut notes = Vec::new();
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        notes.push(format!("loaded from {}", path.display()));
                        return (config, notes.join("; "));
                    }
                    Err(e) => notes.push(format!("failed to load {}: {:#}", path.display(), e)),
                }
            }
        }

        notes.push("no config file found, using defaults".to_string());
        (Self::default(), notes.join("; "))
    }

    /// one-line summary of the effective configuration
    pub fn summary(&self) -> String {
        format!(
            "port={} baud={} interval={}ms log={} bind={} alerts=(>{}°C, >{}%)",
            self.device.port,
            self.device.baud_rate,
            self.polling.interval_ms,
            self.storage.path.display(),
            self.server.bind,
            self.alerts.temperature_high,
            self.alerts.humidity_high,
        )
    }
}
