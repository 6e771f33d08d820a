//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed but unusable values
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Scheduler settings. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Nominal time between cycles, in milliseconds
    pub loop_period_ms: u64,

    /// Log a warning when one cycle takes longer than the loop period
    pub warn_on_overrun: bool,

    /// How many recent events to keep in memory (0 disables the log)
    pub event_log_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            loop_period_ms: 20,
            warn_on_overrun: true,
            event_log_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    /// Nominal time between cycles.
    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_period_ms == 0 {
            return Err(ConfigError::Invalid("loop_period_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Set the loop period. Periods are whole milliseconds; anything that
    /// rounds down to zero is rejected.
    pub fn with_loop_period(mut self, period: Duration) -> Result<Self, ConfigError> {
        self.loop_period_ms = u64::try_from(period.as_millis())
            .map_err(|_| ConfigError::Invalid(format!("loop period {:?} is too long", period)))?;
        self.validate()?;
        Ok(self)
    }

    /// Set the event log capacity.
    pub fn with_event_log_capacity(mut self, capacity: usize) -> Self {
        self.event_log_capacity = capacity;
        self
    }
}
