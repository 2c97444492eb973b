//! Colors

use velocity_config::domains::gauge::{Theme, ZoneThresholds};

/// Needle and hub color, shared by both themes
pub const NEEDLE_COLOR: &str = "#007bff";

/// Theme-dependent colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub stroke: &'static str,
    pub text: &'static str,
    pub mark: &'static str,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                background: "#1f2937",
                stroke: "#374151",
                text: "#f9fafb",
                mark: "#9ca3af",
            },
            Theme::Light => Self {
                background: "#f8f9fa",
                stroke: "#e9ecef",
                text: "#212529",
                mark: "#495057",
            },
        }
    }
}

/// Load zones, slowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Slow,
    Medium,
    Fast,
}

impl Zone {
    pub fn all() -> [Zone; 3] {
        [Zone::Slow, Zone::Medium, Zone::Fast]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Zone::Slow => "Slow",
            Zone::Medium => "Medium",
            Zone::Fast => "Fast",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Zone::Slow => "#dc3545",
            Zone::Medium => "#ffc107",
            Zone::Fast => "#28a745",
        }
    }

    /// Start and end of the zone as fractions of the scale
    pub fn bounds(&self, zones: &ZoneThresholds) -> (f64, f64) {
        match self {
            Zone::Slow => (0.0, zones.slow),
            Zone::Medium => (zones.slow, zones.medium),
            Zone::Fast => (zones.medium, zones.fast),
        }
    }

    /// Zone a fraction of the scale falls in; values past the last zone count as fast
    pub fn for_fraction(fraction: f64, zones: &ZoneThresholds) -> Zone {
        if fraction < zones.slow {
            Zone::Slow
        } else if fraction < zones.medium {
            Zone::Medium
        } else {
            Zone::Fast
        }
    }
}

/// Parse `#rrggbb`
pub fn rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}
