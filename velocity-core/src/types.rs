//! Catalog, sample and result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A test server entry from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateServer {
    pub name: String,
    pub url: String,
    pub lat: f64,
    pub lon: f64,
}

impl CandidateServer {
    pub fn new(name: impl Into<String>, url: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            lat,
            lon,
        }
    }

    /// Server URL without a trailing slash, ready for path concatenation
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Approximate user position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub lat: f64,
    pub lon: f64,
    pub city: String,
    pub country: String,
    /// Network operator reported by the lookup service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
}

impl Geolocation {
    /// Location used whenever the lookup fails
    pub fn fallback() -> Self {
        Self {
            lat: 40.7128,
            lon: -74.0060,
            city: "New York".to_string(),
            country: "United States".to_string(),
            isp: None,
        }
    }

    pub fn label(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

/// Measurement phases that produce samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Ping,
    Download,
    Upload,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Ping => "ping",
            PhaseKind::Download => "download",
            PhaseKind::Upload => "upload",
        }
    }

    /// Whether the phase measures throughput (Mbps) rather than latency
    pub fn is_throughput(&self) -> bool {
        matches!(self, PhaseKind::Download | PhaseKind::Upload)
    }

    pub fn all() -> &'static [PhaseKind] {
        &[PhaseKind::Ping, PhaseKind::Download, PhaseKind::Upload]
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a sample's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSource {
    /// The selected server answered
    Primary,
    /// An alternate public endpoint answered
    Alternate,
    /// Every endpoint failed and the value was synthesized
    Synthesized,
}

impl SampleSource {
    pub fn method(&self) -> MeasurementMethod {
        match self {
            SampleSource::Primary => MeasurementMethod::Measured,
            SampleSource::Alternate => MeasurementMethod::EndpointSubstituted,
            SampleSource::Synthesized => MeasurementMethod::Simulated,
        }
    }
}

/// Reliability label attached to a result, ordered from most to least reliable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasurementMethod {
    Measured,
    EndpointSubstituted,
    Simulated,
}

impl MeasurementMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementMethod::Measured => "measured",
            MeasurementMethod::EndpointSubstituted => "endpoint-substituted",
            MeasurementMethod::Simulated => "simulated",
        }
    }
}

impl fmt::Display for MeasurementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One probe's outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSample {
    pub phase: PhaseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_size_bytes: Option<u64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub success: bool,
    /// Milliseconds for ping, Mbps for throughput phases
    pub derived_value: f64,
    pub source: SampleSource,
}

impl PhaseSample {
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds()
    }
}

/// Summary of one complete run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<f64>,
    pub packet_loss_percent: f64,
    pub server_label: String,
    pub server_distance_km: f64,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub test_duration_ms: i64,
    pub method: MeasurementMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_ordering() {
        assert!(MeasurementMethod::Measured < MeasurementMethod::EndpointSubstituted);
        assert!(MeasurementMethod::EndpointSubstituted < MeasurementMethod::Simulated);
        assert_eq!(
            [
                SampleSource::Primary.method(),
                SampleSource::Synthesized.method(),
                SampleSource::Alternate.method()
            ]
            .into_iter()
            .max(),
            Some(MeasurementMethod::Simulated)
        );
    }

    #[test]
    fn test_catalog_entry_deserialization() {
        let json = r#"[{"name":"Frankfurt","url":"https://fra.example.net/","lat":50.11,"lon":8.68}]"#;
        let servers: Vec<CandidateServer> = serde_json::from_str(json).unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].base_url(), "https://fra.example.net");
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = AggregateResult {
            download_mbps: 80.0,
            upload_mbps: 20.0,
            ping_ms: 12.5,
            jitter_ms: None,
            packet_loss_percent: 0.0,
            server_label: "Frankfurt".to_string(),
            server_distance_km: 10.0,
            location: "Berlin, Germany".to_string(),
            isp: Some("Deutsche Telekom AG".to_string()),
            timestamp: Utc::now(),
            test_duration_ms: 1234,
            method: MeasurementMethod::EndpointSubstituted,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["downloadMbps"], 80.0);
        assert_eq!(value["method"], "endpoint-substituted");
        assert!(value.get("jitterMs").is_none());
        assert_eq!(value["isp"], "Deutsche Telekom AG");
    }
}
