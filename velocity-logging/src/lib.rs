//! Logging setup for Velocity
//!
//! Every crate logs through `tracing` (or `log`, which is bridged into the
//! same subscriber). This crate only decides where and how records are
//! written. Output always goes to stderr so that machine-readable results on
//! stdout stay clean.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
pub use velocity_config::domains::logging::{LogFormat, LogLevel, LoggingConfig};
