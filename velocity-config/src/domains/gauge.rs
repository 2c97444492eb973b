//! Live gauge configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Scale, zones and animation settings for the gauge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    #[serde(default)]
    pub theme: Theme,

    /// Full-scale value in Mbps
    #[serde(default = "default_max_scale")]
    pub max_scale: f64,

    /// Distance between tick marks in Mbps
    #[serde(default = "default_tick_interval")]
    pub tick_interval: f64,

    /// Distance between labelled ticks in Mbps
    #[serde(default = "default_label_interval")]
    pub label_interval: f64,

    /// Upper bounds of the slow, medium and fast zones as fractions of the scale
    #[serde(default)]
    pub zones: ZoneThresholds,

    /// Animation tick period
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_frame_interval"
    )]
    pub frame_interval: Duration,

    /// Largest random step applied to the displayed speed per frame, in Mbps
    #[serde(default = "default_walk_step")]
    pub walk_step: f64,
}

/// Zone boundaries as fractions of the full scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneThresholds {
    pub slow: f64,
    pub medium: f64,
    pub fast: f64,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self {
            slow: 0.2,
            medium: 0.6,
            fast: 1.0,
        }
    }
}

/// Color theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(format!("Invalid theme: {}", s)),
        }
    }
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            max_scale: default_max_scale(),
            tick_interval: default_tick_interval(),
            label_interval: default_label_interval(),
            zones: ZoneThresholds::default(),
            frame_interval: default_frame_interval(),
            walk_step: default_walk_step(),
        }
    }
}

impl Validatable for GaugeConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_scale, "max_scale", self.domain_name())?;
        validate_positive(self.tick_interval, "tick_interval", self.domain_name())?;
        validate_positive(self.label_interval, "label_interval", self.domain_name())?;
        validate_positive(
            self.frame_interval.as_millis(),
            "frame_interval",
            self.domain_name(),
        )?;

        if self.walk_step < 0.0 {
            return Err(self.validation_error("walk_step cannot be negative"));
        }

        let ZoneThresholds { slow, medium, fast } = self.zones;
        if !(0.0 < slow && slow < medium && medium < fast && fast <= 1.0) {
            return Err(self.validation_error(format!(
                "zones must satisfy 0 < slow < medium < fast <= 1, got {} / {} / {}",
                slow, medium, fast
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "gauge"
    }
}

fn default_max_scale() -> f64 {
    400.0
}

fn default_tick_interval() -> f64 {
    50.0
}

fn default_label_interval() -> f64 {
    100.0
}

fn default_frame_interval() -> Duration {
    Duration::from_millis(16)
}

fn default_walk_step() -> f64 {
    10.0
}
