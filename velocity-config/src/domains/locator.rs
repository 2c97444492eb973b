//! Server catalog and geolocation configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the catalog comes from and how the user is located
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Catalog file path or http(s) URL; runs fail with a setup error when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,

    /// Geolocation lookup endpoint
    #[serde(default = "default_geolocation_url")]
    pub geolocation_url: String,

    /// Bound on the geolocation lookup
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_lookup_timeout"
    )]
    pub lookup_timeout: Duration,

    /// Location used when the lookup fails
    #[serde(default)]
    pub default_location: DefaultLocation,
}

/// Fixed fallback position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultLocation {
    pub lat: f64,
    pub lon: f64,
    pub city: String,
    pub country: String,
}

impl Default for DefaultLocation {
    fn default() -> Self {
        Self {
            lat: 40.7128,
            lon: -74.0060,
            city: "New York".to_string(),
            country: "United States".to_string(),
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            geolocation_url: default_geolocation_url(),
            lookup_timeout: default_lookup_timeout(),
            default_location: DefaultLocation::default(),
        }
    }
}

impl LocatorConfig {
    /// Whether the catalog setting names a remote source
    pub fn catalog_is_remote(&self) -> bool {
        self.catalog
            .as_deref()
            .map(|c| c.starts_with("http://") || c.starts_with("https://"))
            .unwrap_or(false)
    }
}

impl Validatable for LocatorConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.geolocation_url, "geolocation_url", self.domain_name())?;
        validate_positive(
            self.lookup_timeout.as_secs(),
            "lookup_timeout",
            self.domain_name(),
        )?;

        if let Some(ref catalog) = self.catalog {
            validate_required_string(catalog, "catalog", self.domain_name())?;
            if self.catalog_is_remote() {
                validate_url(catalog, "catalog", self.domain_name())?;
            }
        }

        self.default_location.validate()
    }

    fn domain_name(&self) -> &'static str {
        "locator"
    }
}

impl Validatable for DefaultLocation {
    fn validate(&self) -> ConfigResult<()> {
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            return Err(self.validation_error(format!(
                "coordinates out of range: {}, {}",
                self.lat, self.lon
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "locator.default_location"
    }
}

fn default_geolocation_url() -> String {
    "https://ipapi.co/json/".to_string()
}

fn default_lookup_timeout() -> Duration {
    Duration::from_secs(5)
}
