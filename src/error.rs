//! Error types.
//!
//! Most scheduler operations cannot fail: an unknown id on cancel is ignored
//! and a rejected registration is reported through
//! [`TimerId::INVALID`](crate::types::TimerId::INVALID). The errors here
//! cover lifecycle misuse, thread spawning and configuration loading.

use std::io;
use thiserror::Error;

/// Errors returned by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A bounded repeat was requested with a count below one.
    #[error("invalid repeat count {0}: must be at least 1")]
    InvalidRepeatCount(i64),

    /// `start` was called while the evaluation loop is already running.
    #[error("evaluation loop already running")]
    AlreadyRunning,

    /// `start` was called after the owning [`Scheduler`](crate::Scheduler)
    /// was dropped.
    #[error("scheduler has been dropped; evaluation loop cannot start")]
    Closed,

    /// The operation cannot run from inside a handler of an in-flight pass.
    #[error("operation refused while an evaluation pass is in flight")]
    PassInFlight,

    /// The evaluation loop thread could not be spawned.
    #[error("failed to spawn evaluation loop: {source}")]
    Spawn {
        /// The underlying spawn error.
        #[from]
        source: io::Error,
    },
}

/// Errors raised while building a [`SchedulerConfig`](crate::config::SchedulerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {var}: got {value:?} ({reason})")]
    InvalidValue {
        /// Variable or key name.
        var: String,
        /// Raw value found.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The evaluation cadence must be non-zero.
    #[error("cadence must be greater than zero")]
    ZeroCadence,

    /// The config file could not be read.
    #[cfg(feature = "config-file")]
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),

    /// The config file is not valid TOML for this schema.
    #[cfg(feature = "config-file")]
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_error_messages() {
        assert_eq!(
            SchedulerError::InvalidRepeatCount(0).to_string(),
            "invalid repeat count 0: must be at least 1"
        );
        assert_eq!(
            SchedulerError::AlreadyRunning.to_string(),
            "evaluation loop already running"
        );
        assert_eq!(
            SchedulerError::Closed.to_string(),
            "scheduler has been dropped; evaluation loop cannot start"
        );
        let spawn: SchedulerError = io::Error::new(io::ErrorKind::Other, "no threads").into();
        assert!(spawn.to_string().contains("no threads"));
    }

    #[test]
    fn config_error_names_the_variable() {
        let err = ConfigError::InvalidValue {
            var: "TIMERKIT_CADENCE_MS".into(),
            value: "fast".into(),
            reason: "expected milliseconds".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("TIMERKIT_CADENCE_MS"));
        assert!(msg.contains("\"fast\""));
    }
}
