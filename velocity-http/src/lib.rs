//! HTTP probe client for Velocity
//!
//! This crate provides the timed request primitive every measurement is built
//! on, a reqwest-backed implementation, and an offline mock for tests.

pub mod client;
pub mod config;
pub mod errors;
pub mod mock;
pub mod types;

// Re-export main types for convenience
pub use client::{fetch_json, HttpProbeClient, ProbeClient};
pub use config::HttpConfig;
pub use errors::HttpError;
pub use mock::{MockProbeClient, MockReply, RecordedRequest};
pub use types::{with_cache_buster, HttpMethodError, ProbeMethod, ProbeRequest, ProbeResponse};
