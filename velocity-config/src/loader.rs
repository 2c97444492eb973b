//! Configuration loading and environment variable handling

use crate::domains::VelocityConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "VELOCITY".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<VelocityConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: VelocityConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<VelocityConfig> {
        let mut config = VelocityConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<VelocityConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut VelocityConfig) -> ConfigResult<()> {
        self.apply_http_overrides(&mut config.http)?;
        self.apply_pipeline_overrides(&mut config.pipeline)?;
        self.apply_locator_overrides(&mut config.locator)?;
        self.apply_rate_limit_overrides(&mut config.rate_limit)?;
        self.apply_gauge_overrides(&mut config.gauge)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply HTTP config overrides
    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Some(seconds) = self.parse_env_var::<u64>("HTTP_TIMEOUT")? {
            config.timeout = Duration::from_secs(seconds);
        }

        if let Ok(user_agent) = self.get_env_var("HTTP_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Some(verify_ssl) = self.parse_env_var::<bool>("HTTP_VERIFY_SSL")? {
            config.verify_ssl = verify_ssl;
        }

        Ok(())
    }

    /// Apply pipeline config overrides
    fn apply_pipeline_overrides(
        &self,
        config: &mut crate::domains::pipeline::PipelineConfig,
    ) -> ConfigResult<()> {
        if let Some(seconds) = self.parse_env_var::<u64>("RUN_TIMEOUT")? {
            config.run_timeout = Duration::from_secs(seconds);
        }

        if let Some(count) = self.parse_env_var::<u32>("PING_COUNT")? {
            config.ping_count = count;
        }

        Ok(())
    }

    /// Apply locator config overrides
    fn apply_locator_overrides(
        &self,
        config: &mut crate::domains::locator::LocatorConfig,
    ) -> ConfigResult<()> {
        if let Ok(catalog) = self.get_env_var("CATALOG") {
            config.catalog = Some(catalog);
        }

        Ok(())
    }

    /// Apply rate limit config overrides
    fn apply_rate_limit_overrides(
        &self,
        config: &mut crate::domains::rate_limit::RateLimitConfig,
    ) -> ConfigResult<()> {
        if let Some(enabled) = self.parse_env_var::<bool>("RATE_LIMIT_ENABLED")? {
            config.enabled = enabled;
        }

        if let Some(max_runs) = self.parse_env_var::<u32>("RATE_LIMIT_MAX_RUNS")? {
            config.max_runs = max_runs;
        }

        if let Some(seconds) = self.parse_env_var::<u64>("RATE_LIMIT_WINDOW")? {
            config.window = Duration::from_secs(seconds);
        }

        if let Some(seconds) = self.parse_env_var::<u64>("RATE_LIMIT_MIN_INTERVAL")? {
            config.min_interval = Duration::from_secs(seconds);
        }

        if let Ok(path) = self.get_env_var("HISTORY_PATH") {
            config.history_path = Some(path);
        }

        Ok(())
    }

    /// Apply gauge config overrides
    fn apply_gauge_overrides(
        &self,
        config: &mut crate::domains::gauge::GaugeConfig,
    ) -> ConfigResult<()> {
        if let Ok(theme) = self.get_env_var("THEME") {
            config.theme = crate::domains::gauge::Theme::from_str(&theme)
                .map_err(|_| ConfigError::Env(format!("Invalid THEME: {}", theme)))?;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::Env(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::Env(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Parse an optional prefixed variable
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::Env(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
