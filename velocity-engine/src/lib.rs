//! Velocity measurement engine
//!
//! Loads the server catalog, locates the user, picks the nearest server and
//! drives the ping, download and upload phases through the fallback chain,
//! the rate limiter and the live gauge.

pub mod catalog;
pub mod events;
pub mod locator;
pub mod pipeline;
pub mod probes;

pub use catalog::CatalogSource;
pub use events::{progress_percent, EventBroadcaster, PipelineEvent};
pub use locator::{fallback_location, select_server, FixedGeolocator, Geolocator, HttpGeolocator, Locator};
pub use pipeline::{SpeedTest, SpeedTestBuilder};
pub use probes::{download_url, ping_url, upload_url, ProbeRunner};
