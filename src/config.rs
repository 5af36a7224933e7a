//! Runtime configuration.
//!
//! The safety constants of the resolution loop live here rather than as
//! hard-coded values, so hosts can tune them per machine or load them from a
//! JSON document.
//!
//! # Example
//!
//! ```rust
//! use framestate::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_json_str(r#"{ "max_transitions_per_tick": 4 }"#).unwrap();
//! assert_eq!(config.max_transitions_per_tick, 4);
//! assert_eq!(config.history_capacity, 32);
//! ```

use serde::{Deserialize, Serialize};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// Default cap on state changes a single graph may make in one tick.
pub const DEFAULT_MAX_TRANSITIONS_PER_TICK: u32 = 10;

/// Default number of transition records each graph retains.
pub const DEFAULT_HISTORY_CAPACITY: usize = 32;

/// Largest history a graph may be configured to retain.
pub const MAX_HISTORY_CAPACITY: usize = 4096;

/// Tunables shared by a machine and every graph it creates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// State changes allowed per graph per tick before processing is deferred.
    pub max_transitions_per_tick: u32,

    /// Records kept in each graph's transition history (0 disables it).
    pub history_capacity: usize,

    /// Emit a `debug!` line for every state change.
    pub log_transitions: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_transitions_per_tick: DEFAULT_MAX_TRANSITIONS_PER_TICK,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            log_transitions: false,
        }
    }
}

/// A single problem found in a [`RuntimeConfig`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigIssue {
    #[error("max_transitions_per_tick must be at least 1")]
    ZeroTransitionBudget,

    #[error("history_capacity {requested} exceeds the maximum of {max}")]
    HistoryTooLarge { requested: usize, max: usize },
}

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse runtime config: {0}")]
    Parse(String),

    #[error("invalid runtime config ({} issue(s))", .0.len())]
    Invalid(Vec<ConfigIssue>),
}

impl RuntimeConfig {
    /// Check every constraint, reporting all violations at once.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<ConfigIssue>> {
        let budget = if self.max_transitions_per_tick == 0 {
            Validation::fail(ConfigIssue::ZeroTransitionBudget)
        } else {
            Validation::success(())
        };

        let history = if self.history_capacity > MAX_HISTORY_CAPACITY {
            Validation::fail(ConfigIssue::HistoryTooLarge {
                requested: self.history_capacity,
                max: MAX_HISTORY_CAPACITY,
            })
        } else {
            Validation::success(())
        };

        Validation::all_vec(vec![budget, history]).map(|_| ())
    }

    /// Clamp values the runtime cannot work with into range.
    ///
    /// Graphs and machines built from a config passed in directly go through
    /// this, since such a config never went through [`validate`](Self::validate).
    pub fn sanitized(mut self) -> Self {
        if self.max_transitions_per_tick == 0 {
            log::warn!("max_transitions_per_tick of 0 raised to 1");
            self.max_transitions_per_tick = 1;
        }
        if self.history_capacity > MAX_HISTORY_CAPACITY {
            log::warn!(
                "history_capacity {} lowered to {}",
                self.history_capacity,
                MAX_HISTORY_CAPACITY
            );
            self.history_capacity = MAX_HISTORY_CAPACITY;
        }
        self
    }

    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;

        match config.validate() {
            Validation::Success(_) => Ok(config),
            Validation::Failure(issues) => Err(ConfigError::Invalid(issues.iter().cloned().collect())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_transitions_per_tick, 10);
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert!(!config.log_transitions);
        assert!(config.validate().is_success());
    }

    #[test]
    fn sanitized_clamps_out_of_range_values() {
        let config = RuntimeConfig {
            max_transitions_per_tick: 0,
            history_capacity: MAX_HISTORY_CAPACITY * 2,
            log_transitions: true,
        }
        .sanitized();

        assert_eq!(config.max_transitions_per_tick, 1);
        assert_eq!(config.history_capacity, MAX_HISTORY_CAPACITY);
        assert!(config.log_transitions);
        assert!(config.validate().is_success());
        assert_eq!(RuntimeConfig::default().sanitized(), RuntimeConfig::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RuntimeConfig::from_json_str(r#"{ "log_transitions": true }"#).unwrap();
        assert!(config.log_transitions);
        assert_eq!(config.max_transitions_per_tick, DEFAULT_MAX_TRANSITIONS_PER_TICK);
    }

    #[test]
    fn validation_accumulates_all_issues() {
        let config = RuntimeConfig {
            max_transitions_per_tick: 0,
            history_capacity: MAX_HISTORY_CAPACITY + 1,
            log_transitions: false,
        };

        match config.validate() {
            Validation::Failure(issues) => {
                assert_eq!(issues.len(), 2);
                assert!(issues
                    .iter()
                    .any(|i| matches!(i, ConfigIssue::ZeroTransitionBudget)));
                assert!(issues
                    .iter()
                    .any(|i| matches!(i, ConfigIssue::HistoryTooLarge { .. })));
            }
            Validation::Success(_) => panic!("Expected failures, got success"),
        }
    }

    #[test]
    fn invalid_json_values_are_rejected() {
        let result = RuntimeConfig::from_json_str(r#"{ "max_transitions_per_tick": 0 }"#);
        match result {
            Err(ConfigError::Invalid(issues)) => {
                assert_eq!(issues, vec![ConfigIssue::ZeroTransitionBudget]);
            }
            other => panic!("Expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let result = RuntimeConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = RuntimeConfig::from_json_str(r#"{ "max_depth": 3 }"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
