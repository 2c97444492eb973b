//! Candidate server catalog

use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use velocity_config::LocatorConfig;
use velocity_core::{CandidateServer, Result, SpeedtestError};
use velocity_http::{fetch_json, ProbeClient};

/// Where the catalog is read from
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogSource {
    /// No catalog configured; loading fails
    Unset,
    /// A local JSON file
    File(PathBuf),
    /// A JSON document fetched over HTTP
    Url(String),
    /// An in-memory list
    Static(Vec<CandidateServer>),
}

impl CatalogSource {
    pub fn from_config(config: &LocatorConfig) -> Self {
        match config.catalog.as_deref() {
            None => CatalogSource::Unset,
            Some(url) if config.catalog_is_remote() => CatalogSource::Url(url.to_string()),
            Some(path) => CatalogSource::File(PathBuf::from(path)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CatalogSource::Unset => "unset catalog".to_string(),
            CatalogSource::File(path) => path.display().to_string(),
            CatalogSource::Url(url) => url.clone(),
            CatalogSource::Static(servers) => format!("static catalog ({} servers)", servers.len()),
        }
    }

    /// Load and sanity-check the catalog.
    ///
    /// A source that cannot be read, does not parse, or holds no usable entry
    /// is a [`SpeedtestError::SetupFailure`].
    pub async fn load(
        &self,
        client: &dyn ProbeClient,
        timeout: Duration,
    ) -> Result<Vec<CandidateServer>> {
        let servers = match self {
            CatalogSource::Unset => {
                return Err(SpeedtestError::SetupFailure(
                    "no server catalog configured; pass --catalog, set locator.catalog \
                     or VELOCITY_CATALOG"
                        .to_string(),
                ))
            }
            CatalogSource::File(path) => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    SpeedtestError::SetupFailure(format!(
                        "cannot read catalog {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                parse_catalog(&raw, &path.display().to_string())?
            }
            CatalogSource::Url(url) => fetch_json::<Vec<CandidateServer>>(client, url, timeout)
                .await
                .map_err(|e| {
                    SpeedtestError::SetupFailure(format!("cannot fetch catalog {}: {}", url, e))
                })?,
            CatalogSource::Static(servers) => servers.clone(),
        };

        let usable = usable_entries(servers);
        if usable.is_empty() {
            return Err(SpeedtestError::SetupFailure(format!(
                "{} has no usable servers",
                self.describe()
            )));
        }

        info!("Loaded {} servers from {}", usable.len(), self.describe());
        Ok(usable)
    }
}

fn parse_catalog(raw: &str, origin: &str) -> Result<Vec<CandidateServer>> {
    serde_json::from_str(raw)
        .map_err(|e| SpeedtestError::SetupFailure(format!("invalid catalog {}: {}", origin, e)))
}

fn usable_entries(servers: Vec<CandidateServer>) -> Vec<CandidateServer> {
    servers
        .into_iter()
        .filter(|server| {
            let valid = !server.url.trim().is_empty()
                && server.lat.is_finite()
                && server.lon.is_finite()
                && (-90.0..=90.0).contains(&server.lat)
                && (-180.0..=180.0).contains(&server.lon);
            if !valid {
                warn!("Skipping catalog entry {:?}", server.name);
            } else {
                debug!("Catalog entry {} at {}, {}", server.name, server.lat, server.lon);
            }
            valid
        })
        .collect()
}
