//! Speed gauge for Velocity
//!
//! [`render`] turns a speed and run state into a [`GaugeFrame`], a flat
//! description of everything to draw. [`LiveGauge`] owns the animation ticker
//! and hands frames to a [`GaugeSink`].

pub mod animator;
pub mod error;
pub mod render;
pub mod terminal;
pub mod theme;

pub use animator::{next_walk_value, GaugeSink, LiveGauge};
pub use error::GaugeError;
pub use render::{
    needle_angle, render, GaugeFrame, GaugeGeometry, GaugeInput, Needle, Point, Readout, Tick,
    ZoneArc,
};
pub use terminal::TerminalSink;
pub use theme::{Palette, Zone};
pub use velocity_config::domains::gauge::Theme;
