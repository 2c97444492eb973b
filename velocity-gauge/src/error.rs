//! Gauge errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GaugeError {
    #[error("Gauge canvas {width}x{height} is too small, need at least {min}px on each side")]
    CanvasTooSmall { width: f64, height: f64, min: f64 },

    #[error("Invalid gauge scale: {0}")]
    InvalidScale(String),

    #[error("Failed to write gauge output: {0}")]
    Io(#[from] std::io::Error),
}
