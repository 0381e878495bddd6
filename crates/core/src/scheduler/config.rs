//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the polling scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often to poll the tracker for triggers (seconds).
    #[serde(default = "default_trigger_interval")]
    pub trigger_poll_interval_secs: u64,

    /// Pause after a failed tracker poll before resuming the normal cadence (seconds).
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,

    /// How often to look for completion artifacts (seconds).
    #[serde(default = "default_completion_interval")]
    pub completion_poll_interval_secs: u64,
}

fn default_trigger_interval() -> u64 {
    30
}

fn default_error_backoff() -> u64 {
    10
}

fn default_completion_interval() -> u64 {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            trigger_poll_interval_secs: default_trigger_interval(),
            error_backoff_secs: default_error_backoff(),
            completion_poll_interval_secs: default_completion_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.trigger_poll_interval_secs, 30);
        assert_eq!(config.error_backoff_secs, 10);
        assert_eq!(config.completion_poll_interval_secs, 5);
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            completion_poll_interval_secs = 2
        "#;
        let config: SchedulerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.completion_poll_interval_secs, 2);
        assert_eq!(config.trigger_poll_interval_secs, 30);
    }
}
