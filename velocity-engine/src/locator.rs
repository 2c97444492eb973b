//! User geolocation and nearest-server selection

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use velocity_config::domains::locator::DefaultLocation;
use velocity_config::LocatorConfig;
use velocity_core::{select_nearest, CandidateServer, Geolocation, Result, SelectedServer, SpeedtestError};
use velocity_http::{fetch_json, ProbeClient};

/// Resolves the user's approximate position
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn lookup(&self) -> Result<Geolocation>;
}

/// Payload of an ipapi-style lookup
#[derive(Debug, Deserialize)]
struct LookupResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    city: Option<String>,
    country_name: Option<String>,
    #[serde(default)]
    org: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl LookupResponse {
    fn into_location(self) -> Result<Geolocation> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) =>
            {
                Ok(Geolocation {
                    lat,
                    lon,
                    city: self.city.unwrap_or_else(|| "Unknown".to_string()),
                    country: self.country_name.unwrap_or_else(|| "Unknown".to_string()),
                    isp: self.org.filter(|org| !org.trim().is_empty()),
                })
            }
            _ => Err(SpeedtestError::LocationFailure(format!(
                "lookup returned no coordinates{}",
                self.reason.map(|r| format!(" ({})", r)).unwrap_or_default()
            ))),
        }
    }
}

/// Looks the user up through a JSON geolocation service
pub struct HttpGeolocator {
    client: Arc<dyn ProbeClient>,
    url: String,
    timeout: Duration,
}

impl HttpGeolocator {
    pub fn new(client: Arc<dyn ProbeClient>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(client: Arc<dyn ProbeClient>, config: &LocatorConfig) -> Self {
        Self::new(client, &config.geolocation_url, config.lookup_timeout)
    }
}

#[async_trait]
impl Geolocator for HttpGeolocator {
    async fn lookup(&self) -> Result<Geolocation> {
        let response: LookupResponse = fetch_json(self.client.as_ref(), &self.url, self.timeout)
            .await
            .map_err(|e| SpeedtestError::LocationFailure(e.to_string()))?;
        response.into_location()
    }
}

/// Always answers with the same position
#[derive(Debug, Clone)]
pub struct FixedGeolocator(pub Geolocation);

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn lookup(&self) -> Result<Geolocation> {
        Ok(self.0.clone())
    }
}

/// Geolocation with a bounded lookup and a fixed fallback
pub struct Locator {
    geolocator: Arc<dyn Geolocator>,
    fallback: Geolocation,
    timeout: Duration,
}

impl Locator {
    pub fn new(geolocator: Arc<dyn Geolocator>, fallback: Geolocation, timeout: Duration) -> Self {
        Self {
            geolocator,
            fallback,
            timeout,
        }
    }

    pub fn from_config(geolocator: Arc<dyn Geolocator>, config: &LocatorConfig) -> Self {
        Self::new(
            geolocator,
            fallback_location(&config.default_location),
            config.lookup_timeout,
        )
    }

    /// Best-effort position; never fails
    pub async fn locate(&self) -> Geolocation {
        let outcome = match tokio::time::timeout(self.timeout, self.geolocator.lookup()).await {
            Ok(result) => result,
            Err(_) => Err(SpeedtestError::LocationFailure(format!(
                "lookup timed out after {}s",
                self.timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(location) => {
                info!(
                    "Located at {} ({:.4}, {:.4})",
                    location.label(),
                    location.lat,
                    location.lon
                );
                location
            }
            Err(e) => {
                warn!("{}; using {}", e, self.fallback.label());
                self.fallback.clone()
            }
        }
    }
}

/// Default position from configuration
pub fn fallback_location(config: &DefaultLocation) -> Geolocation {
    Geolocation {
        lat: config.lat,
        lon: config.lon,
        city: config.city.clone(),
        country: config.country.clone(),
        isp: None,
    }
}

/// Nearest server, or a setup failure for an empty catalog
pub fn select_server(catalog: &[CandidateServer], location: &Geolocation) -> Result<SelectedServer> {
    let selected = select_nearest(catalog, location)
        .ok_or_else(|| SpeedtestError::SetupFailure("server catalog is empty".to_string()))?;
    info!(
        "Selected {} ({:.0} km away)",
        selected.server.name, selected.distance_km
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use velocity_http::{MockProbeClient, MockReply, ProbeMethod};

    const LOOKUP: &str = "https://geo.example.net/json/";

    fn locator(client: MockProbeClient, timeout: Duration) -> Locator {
        Locator::new(
            Arc::new(HttpGeolocator::new(Arc::new(client), LOOKUP, timeout)),
            Geolocation::fallback(),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let client = MockProbeClient::new().on(
            ProbeMethod::Get,
            LOOKUP,
            MockReply::json(&serde_json::json!({
                "latitude": 52.52,
                "longitude": 13.405,
                "city": "Berlin",
                "country_name": "Germany",
                "org": "Deutsche Telekom AG"
            })),
        );

        let location = locator(client, Duration::from_secs(5)).locate().await;
        assert_eq!(location.city, "Berlin");
        assert_eq!(location.lat, 52.52);
        assert_eq!(location.isp.as_deref(), Some("Deutsche Telekom AG"));
    }

    #[tokio::test]
    async fn test_error_payload_falls_back() {
        let client = MockProbeClient::new().on(
            ProbeMethod::Get,
            LOOKUP,
            MockReply::json(&serde_json::json!({"error": true, "reason": "RateLimited"})),
        );

        let location = locator(client, Duration::from_secs(5)).locate().await;
        assert_eq!(location, Geolocation::fallback());
    }

    #[tokio::test]
    async fn test_status_and_network_errors_fall_back() {
        let client = MockProbeClient::new().on(ProbeMethod::Get, LOOKUP, MockReply::status(429));
        assert_eq!(
            locator(client, Duration::from_secs(5)).locate().await,
            Geolocation::fallback()
        );

        let client =
            MockProbeClient::new().on(ProbeMethod::Get, LOOKUP, MockReply::failure("dns error"));
        assert_eq!(
            locator(client, Duration::from_secs(5)).locate().await,
            Geolocation::fallback()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_falls_back() {
        let client = MockProbeClient::new().on(
            ProbeMethod::Get,
            LOOKUP,
            MockReply::json(&serde_json::json!({"latitude": 1.0, "longitude": 2.0}))
                .with_delay(Duration::from_secs(30)),
        );

        let location = locator(client, Duration::from_secs(2)).locate().await;
        assert_eq!(location, Geolocation::fallback());
    }

    #[test]
    fn test_select_server_empty_catalog() {
        let err = select_server(&[], &Geolocation::fallback()).unwrap_err();
        assert!(matches!(err, SpeedtestError::SetupFailure(_)));
    }

    #[test]
    fn test_fallback_location_from_config() {
        let location = fallback_location(&DefaultLocation::default());
        assert_eq!(location, Geolocation::fallback());
    }
}
