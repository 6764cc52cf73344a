//! Scheduler configuration.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`cadence(..)`)
//! 2. **Environment variables**: `TIMERKIT_*` vars, see [`env`]
//! 3. **Config file**: a TOML file (requires the `config-file` feature)
//! 4. **Defaults**: [`SchedulerConfig::default()`]
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `cadence` | 250 ms |
//! | `thread_name` | `"timerkit-loop"` |

pub mod env;
#[cfg(feature = "config-file")]
pub mod file;

use crate::error::ConfigError;
use std::time::Duration;

/// Default time between the starts of two background evaluation passes.
pub const DEFAULT_CADENCE: Duration = Duration::from_millis(250);

/// Default name of the background evaluation thread.
pub const DEFAULT_THREAD_NAME: &str = "timerkit-loop";

/// Configuration for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Target interval between background evaluation passes.
    pub cadence: Duration,
    /// Name given to the background evaluation thread.
    pub thread_name: String,
}

impl SchedulerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the background evaluation cadence.
    #[must_use]
    pub fn cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    /// Sets the background thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        env::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cadence.is_zero() {
            return Err(ConfigError::ZeroCadence);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cadence: DEFAULT_CADENCE,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}
