//! Pure gauge layout

use std::f64::consts::{FRAC_PI_2, TAU};
use velocity_config::domains::gauge::{GaugeConfig, Theme, ZoneThresholds};
use velocity_core::RunState;

use crate::error::GaugeError;
use crate::theme::{Palette, Zone, NEEDLE_COLOR};

/// Distance from the canvas edge to the face
const EDGE_PADDING: f64 = 30.0;
const FACE_STROKE_WIDTH: f64 = 3.0;
const ZONE_INSET: f64 = 10.0;
const ZONE_WIDTH: f64 = 20.0;
const TICK_OUTER_INSET: f64 = 35.0;
const TICK_INNER_INSET: f64 = 50.0;
const TICK_WIDTH: f64 = 2.0;
const LABEL_INSET: f64 = 65.0;
const NEEDLE_INSET: f64 = 60.0;
const NEEDLE_WIDTH: f64 = 4.0;
const HUB_RADIUS: f64 = 8.0;
const READOUT_OFFSET: f64 = 40.0;
const UNIT_OFFSET: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    fn on_circle(center: Point, radius: f64, angle: f64) -> Self {
        Self {
            x: center.x + radius * angle.cos(),
            y: center.y + radius * angle.sin(),
        }
    }
}

/// Canvas size and scale
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeGeometry {
    pub width: f64,
    pub height: f64,
    pub max_scale: f64,
    pub tick_interval: f64,
    pub label_interval: f64,
    pub zones: ZoneThresholds,
}

impl GaugeGeometry {
    /// Smallest side that still leaves room for labels inside the face
    pub const MIN_SIDE: f64 = 2.0 * (EDGE_PADDING + LABEL_INSET + 1.0);

    pub fn new(width: f64, height: f64, config: &GaugeConfig) -> Result<Self, GaugeError> {
        if !(width >= Self::MIN_SIDE && height >= Self::MIN_SIDE) {
            return Err(GaugeError::CanvasTooSmall {
                width,
                height,
                min: Self::MIN_SIDE,
            });
        }
        if !(config.max_scale > 0.0 && config.tick_interval > 0.0 && config.label_interval > 0.0)
        {
            return Err(GaugeError::InvalidScale(format!(
                "max {} / tick {} / label {}",
                config.max_scale, config.tick_interval, config.label_interval
            )));
        }

        Ok(Self {
            width,
            height,
            max_scale: config.max_scale,
            tick_interval: config.tick_interval,
            label_interval: config.label_interval,
            zones: config.zones,
        })
    }

    fn center(&self) -> Point {
        Point {
            x: self.width / 2.0,
            y: self.height / 2.0,
        }
    }

    fn radius(&self) -> f64 {
        (self.width / 2.0).min(self.height / 2.0) - EDGE_PADDING
    }
}

impl Default for GaugeGeometry {
    fn default() -> Self {
        let config = GaugeConfig::default();
        Self {
            width: 300.0,
            height: 300.0,
            max_scale: config.max_scale,
            tick_interval: config.tick_interval,
            label_interval: config.label_interval,
            zones: config.zones,
        }
    }
}

/// What the gauge shows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeInput {
    pub speed: f64,
    pub state: RunState,
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub center: Point,
    pub radius: f64,
    pub fill: &'static str,
    pub stroke: &'static str,
    pub stroke_width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneArc {
    pub zone: Zone,
    pub start_angle: f64,
    pub end_angle: f64,
    pub radius: f64,
    pub width: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickLabel {
    pub text: String,
    pub at: Point,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub value: f64,
    pub angle: f64,
    pub from: Point,
    pub to: Point,
    pub width: f64,
    pub color: &'static str,
    pub label: Option<TickLabel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Needle {
    pub angle: f64,
    pub from: Point,
    pub to: Point,
    pub width: f64,
    pub hub_radius: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    /// Speed with one decimal
    pub value: String,
    pub unit: &'static str,
    pub value_at: Point,
    pub unit_at: Point,
    pub color: &'static str,
}

/// Everything needed to draw one gauge frame
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeFrame {
    pub width: f64,
    pub height: f64,
    pub state: RunState,
    pub speed: f64,
    /// Needle position as a fraction of the scale, in `[0, 1]`
    pub fraction: f64,
    pub zone: Zone,
    pub face: Face,
    pub zones: Vec<ZoneArc>,
    pub ticks: Vec<Tick>,
    pub needle: Needle,
    pub readout: Readout,
}

/// Angle of the needle for `speed`: zero points up, full scale is a full turn
pub fn needle_angle(speed: f64, max_scale: f64) -> f64 {
    fraction_of_scale(speed, max_scale) * TAU - FRAC_PI_2
}

fn fraction_of_scale(speed: f64, max_scale: f64) -> f64 {
    if !speed.is_finite() || max_scale <= 0.0 {
        return 0.0;
    }
    speed.clamp(0.0, max_scale) / max_scale
}

/// Lay out a frame
pub fn render(input: &GaugeInput, geometry: &GaugeGeometry) -> GaugeFrame {
    let palette = Palette::for_theme(input.theme);
    let center = geometry.center();
    let radius = geometry.radius();
    let speed = if input.speed.is_finite() {
        input.speed
    } else {
        0.0
    };
    let fraction = fraction_of_scale(speed, geometry.max_scale);

    let face = Face {
        center,
        radius,
        fill: palette.background,
        stroke: palette.stroke,
        stroke_width: FACE_STROKE_WIDTH,
    };

    let zones = Zone::all()
        .into_iter()
        .map(|zone| {
            let (start, end) = zone.bounds(&geometry.zones);
            ZoneArc {
                zone,
                start_angle: start * TAU - FRAC_PI_2,
                end_angle: end * TAU - FRAC_PI_2,
                radius: radius - ZONE_INSET,
                width: ZONE_WIDTH,
                color: zone.color(),
            }
        })
        .collect();

    let tick_count = (geometry.max_scale / geometry.tick_interval).floor() as usize;
    let ticks = (0..=tick_count)
        .map(|i| {
            let value = i as f64 * geometry.tick_interval;
            let angle = needle_angle(value, geometry.max_scale);
            let label = is_multiple(value, geometry.label_interval).then(|| TickLabel {
                text: format!("{}", value.round() as i64),
                at: Point::on_circle(center, radius - LABEL_INSET, angle),
                color: palette.text,
            });
            Tick {
                value,
                angle,
                from: Point::on_circle(center, radius - TICK_OUTER_INSET, angle),
                to: Point::on_circle(center, radius - TICK_INNER_INSET, angle),
                width: TICK_WIDTH,
                color: palette.mark,
                label,
            }
        })
        .collect();

    let angle = needle_angle(speed, geometry.max_scale);
    let needle = Needle {
        angle,
        from: center,
        to: Point::on_circle(center, radius - NEEDLE_INSET, angle),
        width: NEEDLE_WIDTH,
        hub_radius: HUB_RADIUS,
        color: NEEDLE_COLOR,
    };

    let readout = Readout {
        value: format!("{:.1}", speed),
        unit: "Mbps",
        value_at: Point {
            x: center.x,
            y: center.y + READOUT_OFFSET,
        },
        unit_at: Point {
            x: center.x,
            y: center.y + UNIT_OFFSET,
        },
        color: palette.text,
    };

    GaugeFrame {
        width: geometry.width,
        height: geometry.height,
        state: input.state,
        speed,
        fraction,
        zone: Zone::for_fraction(fraction, &geometry.zones),
        face,
        zones,
        ticks,
        needle,
        readout,
    }
}

fn is_multiple(value: f64, interval: f64) -> bool {
    let ratio = value / interval;
    (ratio - ratio.round()).abs() < 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(speed: f64) -> GaugeInput {
        GaugeInput {
            speed,
            state: RunState::Download,
            theme: Theme::Light,
        }
    }

    #[test]
    fn test_needle_angle() {
        assert!((needle_angle(0.0, 400.0) + FRAC_PI_2).abs() < 1e-12);
        assert!((needle_angle(200.0, 400.0) - FRAC_PI_2).abs() < 1e-12);
        assert!((needle_angle(400.0, 400.0) - (TAU - FRAC_PI_2)).abs() < 1e-12);
        // Clamped at full scale and at zero
        assert_eq!(needle_angle(900.0, 400.0), needle_angle(400.0, 400.0));
        assert_eq!(needle_angle(-5.0, 400.0), needle_angle(0.0, 400.0));
        assert_eq!(needle_angle(f64::NAN, 400.0), needle_angle(0.0, 400.0));
    }

    #[test]
    fn test_ticks_and_labels() {
        let frame = render(&input(0.0), &GaugeGeometry::default());
        let values: Vec<f64> = frame.ticks.iter().map(|t| t.value).collect();
        assert_eq!(values, vec![0.0, 50.0, 100.0, 150.0, 200.0, 250.0, 300.0, 350.0, 400.0]);

        let labels: Vec<&str> = frame
            .ticks
            .iter()
            .filter_map(|t| t.label.as_ref().map(|l| l.text.as_str()))
            .collect();
        assert_eq!(labels, vec!["0", "100", "200", "300", "400"]);
    }

    #[test]
    fn test_zones_follow_thresholds() {
        let frame = render(&input(0.0), &GaugeGeometry::default());
        assert_eq!(frame.zones.len(), 3);
        assert_eq!(frame.zones[0].color, "#dc3545");
        assert!((frame.zones[0].end_angle - (0.2 * TAU - FRAC_PI_2)).abs() < 1e-12);
        assert!((frame.zones[2].start_angle - frame.zones[1].end_angle).abs() < 1e-12);
    }

    #[test]
    fn test_readout_and_needle() {
        let geometry = GaugeGeometry::default();
        let frame = render(&input(123.456), &geometry);
        assert_eq!(frame.readout.value, "123.5");
        assert_eq!(frame.readout.unit, "Mbps");
        assert_eq!(frame.zone, Zone::Medium);

        // Needle length is radius - 60 from the center
        let radius = 150.0 - 30.0;
        let dx = frame.needle.to.x - frame.needle.from.x;
        let dy = frame.needle.to.y - frame.needle.from.y;
        assert!(((dx * dx + dy * dy).sqrt() - (radius - 60.0)).abs() < 1e-9);

        // Readout is not clamped, the needle is
        let frame = render(&input(512.0), &geometry);
        assert_eq!(frame.readout.value, "512.0");
        assert_eq!(frame.fraction, 1.0);
        assert_eq!(frame.zone, Zone::Fast);
    }

    #[test]
    fn test_theme_colors() {
        let dark = render(
            &GaugeInput {
                theme: Theme::Dark,
                ..input(10.0)
            },
            &GaugeGeometry::default(),
        );
        assert_eq!(dark.face.fill, "#1f2937");
        assert_eq!(dark.readout.color, "#f9fafb");
        assert_eq!(dark.needle.color, NEEDLE_COLOR);
    }

    #[test]
    fn test_geometry_validation() {
        let config = GaugeConfig::default();
        assert!(GaugeGeometry::new(300.0, 300.0, &config).is_ok());
        assert!(matches!(
            GaugeGeometry::new(100.0, 300.0, &config),
            Err(GaugeError::CanvasTooSmall { .. })
        ));
    }
}
