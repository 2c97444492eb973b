//! Single-line gauge on a terminal

use colored::{ColoredString, Colorize};
use parking_lot::Mutex;
use std::io::Write;
use tracing::trace;

use crate::animator::GaugeSink;
use crate::error::GaugeError;
use crate::render::GaugeFrame;
use crate::theme::{rgb, Zone, NEEDLE_COLOR};
use velocity_config::domains::gauge::ZoneThresholds;

const FILLED: char = '█';
const EMPTY: char = '░';
const NEEDLE: char = '▌';

/// Cell of the gauge bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarCell {
    Filled(Zone),
    Needle,
    Empty,
}

/// Lay a frame out as `width` bar cells, colored by the zone each cell covers
pub fn bar_cells(frame: &GaugeFrame, width: usize, zones: &ZoneThresholds) -> Vec<BarCell> {
    if width == 0 {
        return Vec::new();
    }

    let needle = ((frame.fraction * width as f64).round() as usize).min(width - 1);
    (0..width)
        .map(|i| {
            let cell_fraction = (i as f64 + 0.5) / width as f64;
            if i == needle && frame.fraction > 0.0 {
                BarCell::Needle
            } else if i < needle {
                BarCell::Filled(Zone::for_fraction(cell_fraction, zones))
            } else {
                BarCell::Empty
            }
        })
        .collect()
}

fn paint(text: &str, hex: &str) -> ColoredString {
    match rgb(hex) {
        Some((r, g, b)) => text.truecolor(r, g, b),
        None => text.normal(),
    }
}

/// Draws frames as one overwritten line on stderr
pub struct TerminalSink {
    width: usize,
    zones: ZoneThresholds,
    last_line: Mutex<String>,
}

impl TerminalSink {
    pub fn new(width: usize, zones: ZoneThresholds) -> Self {
        Self {
            width,
            zones,
            last_line: Mutex::new(String::new()),
        }
    }

    /// The text of a frame, with colors
    pub fn format_line(&self, frame: &GaugeFrame) -> String {
        let bar: String = bar_cells(frame, self.width, &self.zones)
            .into_iter()
            .map(|cell| match cell {
                BarCell::Filled(zone) => paint(&FILLED.to_string(), zone.color()).to_string(),
                BarCell::Needle => paint(&NEEDLE.to_string(), NEEDLE_COLOR).bold().to_string(),
                BarCell::Empty => paint(&EMPTY.to_string(), frame.face.stroke).to_string(),
            })
            .collect();

        format!(
            "{:<9} [{}] {:>6} {}",
            frame.state.as_str(),
            bar,
            paint(&frame.readout.value, frame.zone.color()).bold(),
            paint(frame.readout.unit, frame.readout.color)
        )
    }

    fn write_frame(&self, frame: &GaugeFrame) -> Result<(), GaugeError> {
        let line = self.format_line(frame);
        let mut last = self.last_line.lock();
        if *last == line {
            return Ok(());
        }

        let mut stderr = std::io::stderr().lock();
        write!(stderr, "\r\x1b[2K{}", line)?;
        stderr.flush()?;
        *last = line;
        Ok(())
    }

    /// End the gauge line so following output starts on a fresh one
    pub fn finish(&self) -> Result<(), GaugeError> {
        let mut last = self.last_line.lock();
        if !last.is_empty() {
            writeln!(std::io::stderr())?;
            last.clear();
        }
        Ok(())
    }
}

impl GaugeSink for TerminalSink {
    fn draw(&self, frame: &GaugeFrame) {
        if let Err(e) = self.write_frame(frame) {
            trace!("Gauge output failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{render, GaugeGeometry, GaugeInput};
    use velocity_config::domains::gauge::Theme;
    use velocity_core::RunState;

    fn frame(speed: f64) -> GaugeFrame {
        render(
            &GaugeInput {
                speed,
                state: RunState::Download,
                theme: Theme::Dark,
            },
            &GaugeGeometry::default(),
        )
    }

    #[test]
    fn test_empty_gauge() {
        let cells = bar_cells(&frame(0.0), 10, &ZoneThresholds::default());
        assert_eq!(cells, vec![BarCell::Empty; 10]);
    }

    #[test]
    fn test_half_scale() {
        let cells = bar_cells(&frame(200.0), 10, &ZoneThresholds::default());
        assert_eq!(cells[0], BarCell::Filled(Zone::Slow));
        assert_eq!(cells[1], BarCell::Filled(Zone::Slow));
        assert_eq!(cells[2], BarCell::Filled(Zone::Medium));
        assert_eq!(cells[5], BarCell::Needle);
        assert_eq!(cells[9], BarCell::Empty);
    }

    #[test]
    fn test_full_scale_needle_stays_on_bar() {
        let cells = bar_cells(&frame(1000.0), 10, &ZoneThresholds::default());
        assert_eq!(cells.len(), 10);
        assert_eq!(cells[9], BarCell::Needle);
        assert_eq!(cells[8], BarCell::Filled(Zone::Fast));
    }

    #[test]
    fn test_line_mentions_state_and_readout() {
        let sink = TerminalSink::new(20, ZoneThresholds::default());
        let line = sink.format_line(&frame(42.0));
        assert!(line.starts_with("download"));
        assert!(line.contains("42.0"));
        assert!(line.contains("Mbps"));
    }
}
