//! Measurement pipeline configuration

use crate::domains::utils::MIB;
use crate::error::ConfigResult;
use crate::validation::{validate_ascending_sizes, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Probe counts, payload sizes and deadlines for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of latency probes
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,

    /// Download payload sizes in bytes, ascending
    #[serde(default = "default_download_sizes")]
    pub download_sizes: Vec<u64>,

    /// Upload payload sizes in bytes, ascending
    #[serde(default = "default_upload_sizes")]
    pub upload_sizes: Vec<u64>,

    /// Hard deadline for the whole run
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_run_timeout"
    )]
    pub run_timeout: Duration,

    /// Optional deadline for each measurement phase
    #[serde(
        with = "crate::domains::utils::serde_duration_option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub phase_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ping_count: default_ping_count(),
            download_sizes: default_download_sizes(),
            upload_sizes: default_upload_sizes(),
            run_timeout: default_run_timeout(),
            phase_timeout: None,
        }
    }
}

impl Validatable for PipelineConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.ping_count, "ping_count", self.domain_name())?;
        validate_ascending_sizes(&self.download_sizes, "download_sizes", self.domain_name())?;
        validate_ascending_sizes(&self.upload_sizes, "upload_sizes", self.domain_name())?;
        validate_positive(self.run_timeout.as_secs(), "run_timeout", self.domain_name())?;

        if let Some(phase_timeout) = self.phase_timeout {
            validate_positive(phase_timeout.as_secs(), "phase_timeout", self.domain_name())?;
            if phase_timeout > self.run_timeout {
                log::warn!(
                    "phase_timeout ({}s) exceeds run_timeout ({}s) and will never trigger",
                    phase_timeout.as_secs(),
                    self.run_timeout.as_secs()
                );
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "pipeline"
    }
}

fn default_ping_count() -> u32 {
    5
}

fn default_download_sizes() -> Vec<u64> {
    vec![MIB, 5 * MIB, 10 * MIB, 25 * MIB]
}

fn default_upload_sizes() -> Vec<u64> {
    vec![MIB, 5 * MIB, 10 * MIB]
}

fn default_run_timeout() -> Duration {
    Duration::from_secs(60)
}
