//! Environment variable overrides for [`SchedulerConfig`].
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `TIMERKIT_CADENCE_MS` | `u64` | `cadence` |
//! | `TIMERKIT_THREAD_NAME` | `String` | `thread_name` |

use super::SchedulerConfig;
use crate::error::ConfigError;
use std::time::Duration;

/// Environment variable name for the evaluation cadence in milliseconds.
pub const ENV_CADENCE_MS: &str = "TIMERKIT_CADENCE_MS";
/// Environment variable name for the evaluation thread name.
pub const ENV_THREAD_NAME: &str = "TIMERKIT_THREAD_NAME";

/// Apply environment variable overrides to a [`SchedulerConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut SchedulerConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, read_env)
}

/// Apply overrides using `lookup` instead of the process environment.
pub(crate) fn apply_overrides_from<F>(
    config: &mut SchedulerConfig,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(ENV_CADENCE_MS) {
        config.cadence = Duration::from_millis(parse_u64(ENV_CADENCE_MS, &val)?);
    }
    if let Some(val) = lookup(ENV_THREAD_NAME) {
        config.thread_name = val;
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_u64(var_name: &str, val: &str) -> Result<u64, ConfigError> {
    val.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            var: var_name.to_string(),
            value: val.to_string(),
            reason: format!("expected unsigned integer ({e})"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn unset_variables_leave_config_alone() {
        let mut config = SchedulerConfig::default();
        apply_overrides_from(&mut config, lookup_from(&[])).unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn cadence_and_name_overrides() {
        let mut config = SchedulerConfig::default();
        apply_overrides_from(
            &mut config,
            lookup_from(&[(ENV_CADENCE_MS, " 40 "), (ENV_THREAD_NAME, "ticker")]),
        )
        .unwrap();
        assert_eq!(config.cadence, Duration::from_millis(40));
        assert_eq!(config.thread_name, "ticker");
    }

    #[test]
    fn malformed_cadence_is_reported() {
        let mut config = SchedulerConfig::default();
        let err = apply_overrides_from(&mut config, lookup_from(&[(ENV_CADENCE_MS, "soon")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { var, value, .. } => {
                assert_eq!(var, ENV_CADENCE_MS);
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(config.cadence, Duration::from_millis(250));
    }
}
