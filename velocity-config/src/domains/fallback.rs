//! Fallback chain configuration

use crate::error::ConfigResult;
use crate::validation::{validate_range, validate_url, Validatable};
use serde::{Deserialize, Serialize};

/// Alternate endpoints and synthesized value ranges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Try alternate public endpoints when the selected server fails
    #[serde(default = "crate::domains::utils::default_true")]
    pub use_alternates: bool,

    /// Synthesize a plausible value when every endpoint fails
    #[serde(default = "crate::domains::utils::default_true")]
    pub synthesize: bool,

    /// Alternate latency endpoint
    #[serde(default = "default_alternate_ping_url")]
    pub alternate_ping_url: String,

    /// Alternate download endpoint; `{bytes}` is replaced with the payload size
    #[serde(default = "default_alternate_download_url")]
    pub alternate_download_url: String,

    /// Alternate upload endpoint
    #[serde(default = "default_alternate_upload_url")]
    pub alternate_upload_url: String,

    /// Synthesized download range in Mbps
    #[serde(default = "default_download_range")]
    pub download_range: MbpsRange,

    /// Synthesized upload range in Mbps
    #[serde(default = "default_upload_range")]
    pub upload_range: MbpsRange,
}

/// Inclusive-exclusive Mbps range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MbpsRange {
    pub min: f64,
    pub max: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            use_alternates: true,
            synthesize: true,
            alternate_ping_url: default_alternate_ping_url(),
            alternate_download_url: default_alternate_download_url(),
            alternate_upload_url: default_alternate_upload_url(),
            download_range: default_download_range(),
            upload_range: default_upload_range(),
        }
    }
}

impl Validatable for FallbackConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.use_alternates {
            validate_url(&self.alternate_ping_url, "alternate_ping_url", self.domain_name())?;
            validate_url(
                &self.alternate_download_url,
                "alternate_download_url",
                self.domain_name(),
            )?;
            validate_url(
                &self.alternate_upload_url,
                "alternate_upload_url",
                self.domain_name(),
            )?;
        }

        validate_range(
            self.download_range.min,
            self.download_range.max,
            "download_range",
            self.domain_name(),
        )?;
        validate_range(
            self.upload_range.min,
            self.upload_range.max,
            "upload_range",
            self.domain_name(),
        )?;

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "fallback"
    }
}

fn default_alternate_ping_url() -> String {
    "https://speed.cloudflare.com/__down?bytes=0".to_string()
}

fn default_alternate_download_url() -> String {
    "https://speed.cloudflare.com/__down?bytes={bytes}".to_string()
}

fn default_alternate_upload_url() -> String {
    "https://speed.cloudflare.com/__up".to_string()
}

fn default_download_range() -> MbpsRange {
    MbpsRange { min: 10.0, max: 60.0 }
}

fn default_upload_range() -> MbpsRange {
    MbpsRange { min: 5.0, max: 35.0 }
}
