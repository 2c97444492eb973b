//! Domain-specific configuration modules

pub mod fallback;
pub mod gauge;
pub mod http;
pub mod locator;
pub mod logging;
pub mod pipeline;
pub mod rate_limit;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Velocity configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VelocityConfig {
    /// Probe HTTP client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Measurement pipeline configuration
    #[serde(default)]
    pub pipeline: pipeline::PipelineConfig,

    /// Catalog and geolocation configuration
    #[serde(default)]
    pub locator: locator::LocatorConfig,

    /// Fallback chain configuration
    #[serde(default)]
    pub fallback: fallback::FallbackConfig,

    /// Run rate limiting configuration
    #[serde(default)]
    pub rate_limit: rate_limit::RateLimitConfig,

    /// Gauge configuration
    #[serde(default)]
    pub gauge: gauge::GaugeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl VelocityConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.http.validate()?;
        self.pipeline.validate()?;
        self.locator.validate()?;
        self.fallback.validate()?;
        self.rate_limit.validate()?;
        self.gauge.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = VelocityConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
