//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use velocity_config::domains::gauge::Theme;
use velocity_config::domains::logging::LogLevel;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a speed test against the nearest server
    Run(RunArgs),

    /// Show how many runs the rate limiter has seen recently
    History {
        /// Forget every recorded run
        #[arg(long)]
        clear: bool,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Catalog file or http(s) URL (overrides locator.catalog)
    #[arg(long, value_name = "PATH|URL")]
    pub catalog: Option<String>,

    /// Gauge color theme: light, dark
    #[arg(long, value_name = "THEME")]
    pub theme: Option<Theme>,

    /// Skip the geolocation lookup and use these coordinates (example: --location=52.52,13.40)
    #[arg(long, value_name = "LAT,LON", value_parser = parse_location)]
    pub location: Option<(f64, f64)>,

    /// Print the result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Print progress lines instead of drawing the gauge
    #[arg(long)]
    pub no_gauge: bool,

    /// Wait for the rate limiter instead of failing
    #[arg(long)]
    pub wait: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path; stdout when omitted
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse `LAT,LON` in degrees
pub fn parse_location(value: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {:?}", value))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude {:?}", lat))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude {:?}", lon))?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("coordinates out of range: {}, {}", lat, lon));
    }
    Ok((lat, lon))
}
