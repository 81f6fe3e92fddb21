//! Configuration structures for the tick driver.
//!
//! Supports TOML deserialization with defaults matching the
//! out-of-the-box driver: 64 ticks per second, started on construction,
//! monitoring off.

use crate::rate::{TickRate, DEFAULT_TICK_RATE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level tick driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Ticks per second.
    pub tick_rate: u32,

    /// Start the periodic trigger as soon as the driver is built.
    pub autostart: bool,

    /// Performance monitoring configuration.
    pub monitoring: MonitoringConfig,

    /// Callback execution configuration.
    pub callbacks: CallbackConfig,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            autostart: true,
            monitoring: MonitoringConfig::default(),
            callbacks: CallbackConfig::default(),
        }
    }
}

/// Performance monitoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Attach a performance monitor when the driver is built.
    pub enabled: bool,
}

/// Callback execution configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Log a warning when a single callback runs longer than this.
    /// Zero disables the check. Callbacks are never interrupted.
    #[serde(with = "humantime_serde")]
    pub slow_threshold: Duration,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            slow_threshold: Duration::from_millis(50),
        }
    }
}

impl TickConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check semantic constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the tick rate is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate().map(|_| ())
    }

    /// Validated tick rate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the tick rate is zero.
    pub fn rate(&self) -> Result<TickRate, ConfigError> {
        TickRate::new(self.tick_rate).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Parsed values violate a constraint.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
