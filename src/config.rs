//! Configuration loading and defaults for restlittle.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::domain::InteractionStatus;
use crate::idle::InputBackend;
use crate::monitor::RestingPolicy;

/// Invalid configuration values.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be at least 1 second")]
    NonPositive { key: &'static str },
}

/// Main configuration for restlittle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Busy time before the user is considered tired, in seconds (default: 300).
    pub max_busy_seconds: u64,

    /// Idle time that counts as a full rest, in seconds (default: 300).
    pub resting_seconds: u64,

    /// Status assumed before the first update (default: idle).
    pub initial_status: InteractionStatus,

    /// Seconds without input before the user counts as idle (default: 15).
    ///
    /// With the logind backend this is counted from when the desktop marks
    /// the session idle, which happens after its own idle delay.
    pub time_to_idle_seconds: u64,

    /// Minimum seconds between two rest warnings (default: 60).
    pub warning_interval_seconds: u64,

    /// Seconds between monitor updates (default: 10).
    pub update_interval_seconds: u64,

    /// Logind idle hint refresh interval in seconds (default: 5).
    pub idle_check_interval_seconds: u64,

    /// Where to read input activity from.
    pub input_backend: InputBackend,

    /// Reset counters when the machine wakes from sleep (default: true).
    pub suspend_detection: bool,

    /// Show desktop notifications for rest warnings (default: true).
    pub notifications: bool,

    /// Dry run mode: log notifications instead of sending.
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_busy_seconds: 300,
            resting_seconds: 300,
            initial_status: InteractionStatus::Idle,
            time_to_idle_seconds: 15,
            warning_interval_seconds: 60,
            update_interval_seconds: 10,
            idle_check_interval_seconds: 5,
            input_backend: InputBackend::default(),
            suspend_detection: true,
            notifications: true,
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("restlittle").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }

    /// Check that every duration is positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("max_busy_seconds", self.max_busy_seconds),
            ("resting_seconds", self.resting_seconds),
            ("time_to_idle_seconds", self.time_to_idle_seconds),
            ("warning_interval_seconds", self.warning_interval_seconds),
            ("update_interval_seconds", self.update_interval_seconds),
            ("idle_check_interval_seconds", self.idle_check_interval_seconds),
        ];

        for (key, value) in durations {
            if value == 0 {
                return Err(ConfigError::NonPositive { key });
            }
        }

        Ok(())
    }

    /// Thresholds for the resting monitor.
    pub fn resting_policy(&self) -> RestingPolicy {
        RestingPolicy {
            max_busy_time: Duration::from_secs(self.max_busy_seconds),
            resting_time: Duration::from_secs(self.resting_seconds),
            initial_status: self.initial_status,
        }
    }

    pub fn time_to_idle(&self) -> Duration {
        Duration::from_secs(self.time_to_idle_seconds)
    }

    pub fn warning_interval(&self) -> Duration {
        Duration::from_secs(self.warning_interval_seconds)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_seconds)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_interval_seconds)
    }
}
