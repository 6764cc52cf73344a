//! TOML config file support.
//!
//! ```toml
//! [scheduler]
//! cadence_ms = 100
//! thread_name = "myapp-timers"
//! ```
//!
//! Missing keys keep their defaults. Environment variables are applied on
//! top of the file by [`SchedulerConfig::from_file`].

use super::{env, SchedulerConfig};
use crate::error::ConfigError;
use std::path::Path;
use std::time::Duration;

/// TOML-deserializable scheduler configuration.
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct SchedulerTomlConfig {
    /// Scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerToml,
}

/// `[scheduler]` section of the TOML config.
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct SchedulerToml {
    /// Evaluation cadence in milliseconds.
    pub cadence_ms: Option<u64>,
    /// Name of the evaluation thread.
    pub thread_name: Option<String>,
}

impl SchedulerTomlConfig {
    /// Apply the parsed values to a [`SchedulerConfig`].
    pub fn apply_to(&self, config: &mut SchedulerConfig) {
        if let Some(ms) = self.scheduler.cadence_ms {
            config.cadence = Duration::from_millis(ms);
        }
        if let Some(name) = &self.scheduler.thread_name {
            config.thread_name.clone_from(name);
        }
    }
}

impl SchedulerConfig {
    /// Defaults overlaid with the given TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let parsed: SchedulerTomlConfig = toml::from_str(source)?;
        let mut config = Self::default();
        parsed.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with a TOML file, then with environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&source)?;
        env::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheduler_table() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            [scheduler]
            cadence_ms = 100
            thread_name = "app-timers"
            "#,
        )
        .unwrap();
        assert_eq!(config.cadence, Duration::from_millis(100));
        assert_eq!(config.thread_name, "app-timers");
    }

    #[test]
    fn empty_document_keeps_defaults() {
        let config = SchedulerConfig::from_toml_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn unknown_keys_and_zero_cadence_rejected() {
        let unknown = SchedulerConfig::from_toml_str("[scheduler]\nworkers = 4\n");
        assert!(matches!(unknown, Err(ConfigError::Parse(_))));

        let zero = SchedulerConfig::from_toml_str("[scheduler]\ncadence_ms = 0\n");
        assert!(matches!(zero, Err(ConfigError::ZeroCadence)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SchedulerConfig::from_file("/nonexistent/timerkit.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
