//! Rate limiting configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sliding-window quota and cooldown for starting runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// Maximum runs started inside one window
    #[serde(default = "default_max_runs")]
    pub max_runs: u32,

    /// Sliding window length
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_window"
    )]
    pub window: Duration,

    /// Minimum gap between two run starts
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_min_interval"
    )]
    pub min_interval: Duration,

    /// History file; the platform data directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_path: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_runs: default_max_runs(),
            window: default_window(),
            min_interval: default_min_interval(),
            history_path: None,
        }
    }
}

impl RateLimitConfig {
    /// Disable rate limiting entirely
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Validatable for RateLimitConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }

        validate_positive(self.max_runs, "max_runs", self.domain_name())?;
        validate_positive(self.window.as_secs(), "window", self.domain_name())?;

        if self.min_interval > self.window {
            return Err(self.validation_error(format!(
                "min_interval ({}s) cannot exceed window ({}s)",
                self.min_interval.as_secs(),
                self.window.as_secs()
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "rate_limit"
    }
}

fn default_max_runs() -> u32 {
    3
}

fn default_window() -> Duration {
    Duration::from_secs(60)
}

fn default_min_interval() -> Duration {
    Duration::from_secs(10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_defaults() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_runs, 3);
        assert_eq!(config.window, Duration::from_secs(60));
        assert_eq!(config.min_interval, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_validation() {
        let mut config = RateLimitConfig::default();
        config.max_runs = 0;
        assert!(config.validate().is_err());

        let mut config = RateLimitConfig::default();
        config.min_interval = Duration::from_secs(120);
        assert!(config.validate().is_err());

        let mut config = RateLimitConfig::disabled();
        config.max_runs = 0;
        assert!(config.validate().is_ok());
    }
}
