//! Reduction of phase samples into a run result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeedtestError};
use crate::geo::SelectedServer;
use crate::types::{AggregateResult, Geolocation, MeasurementMethod, PhaseKind, PhaseSample};

/// Throughput in megabits per second for `bytes` moved in `seconds`
pub fn throughput_mbps(bytes: u64, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / seconds / 1_000_000.0
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Lost share of `sent` probes as a percentage
pub fn packet_loss_percent(sent: usize, received: usize) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    (sent.saturating_sub(received)) as f64 / sent as f64 * 100.0
}

/// Mean absolute difference between consecutive latencies
pub fn jitter(latencies_ms: &[f64]) -> Option<f64> {
    if latencies_ms.len() < 2 {
        return None;
    }
    let deltas: Vec<f64> = latencies_ms.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    Some(mean(&deltas))
}

/// Scalar outcome of one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: PhaseKind,
    /// Mean Mbps, or mean successful latency in ms for ping
    pub value: f64,
    pub attempts: usize,
    pub successes: usize,
    pub packet_loss_percent: f64,
    pub jitter_ms: Option<f64>,
    /// Least reliable source among the phase's samples
    pub method: MeasurementMethod,
}

/// Collects the samples of a single run
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    samples: Vec<PhaseSample>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: PhaseSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[PhaseSample] {
        &self.samples
    }

    pub fn samples_for(&self, phase: PhaseKind) -> impl Iterator<Item = &PhaseSample> {
        self.samples.iter().filter(move |s| s.phase == phase)
    }

    /// Reduce one phase; `None` when the phase has no samples yet
    pub fn summarize(&self, phase: PhaseKind) -> Option<PhaseSummary> {
        let samples: Vec<&PhaseSample> = self.samples_for(phase).collect();
        if samples.is_empty() {
            return None;
        }

        let successful: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.derived_value)
            .collect();

        let method = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.source.method())
            .max()
            .unwrap_or(MeasurementMethod::Measured);

        let (packet_loss_percent, jitter_ms) = if phase == PhaseKind::Ping {
            (packet_loss_percent(samples.len(), successful.len()), jitter(&successful))
        } else {
            (0.0, None)
        };

        Some(PhaseSummary {
            phase,
            value: mean(&successful),
            attempts: samples.len(),
            successes: successful.len(),
            packet_loss_percent,
            jitter_ms,
            method,
        })
    }

    /// Reduce one phase that must be usable for a result.
    ///
    /// Ping only needs attempts, since lost packets are data. Throughput
    /// phases need at least one successful sample, measured or substituted.
    pub fn require(&self, phase: PhaseKind) -> Result<PhaseSummary> {
        match self.summarize(phase) {
            Some(summary) if !phase.is_throughput() || summary.successes > 0 => Ok(summary),
            _ => Err(SpeedtestError::IncompleteRun(phase)),
        }
    }

    /// Assemble the run result; fails unless every phase is usable
    pub fn finish(
        &self,
        selected: &SelectedServer,
        location: &Geolocation,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Result<AggregateResult> {
        let ping = self.require(PhaseKind::Ping)?;
        let download = self.require(PhaseKind::Download)?;
        let upload = self.require(PhaseKind::Upload)?;

        let method = [ping.method, download.method, upload.method]
            .into_iter()
            .max()
            .unwrap_or(MeasurementMethod::Measured);

        Ok(AggregateResult {
            download_mbps: download.value,
            upload_mbps: upload.value,
            ping_ms: ping.value,
            jitter_ms: ping.jitter_ms,
            packet_loss_percent: ping.packet_loss_percent,
            server_label: selected.server.name.clone(),
            server_distance_km: selected.distance_km,
            location: location.label(),
            isp: location.isp.clone(),
            timestamp: finished_at,
            test_duration_ms: (finished_at - started_at).num_milliseconds(),
            method,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CandidateServer, SampleSource};

    fn sample(phase: PhaseKind, value: f64, success: bool, source: SampleSource) -> PhaseSample {
        let now = Utc::now();
        PhaseSample {
            phase,
            payload_size_bytes: None,
            start_time: now,
            end_time: now,
            success,
            derived_value: value,
            source,
        }
    }

    fn selected() -> SelectedServer {
        SelectedServer {
            server: CandidateServer::new("Amsterdam", "https://ams.example.net", 52.37, 4.9),
            distance_km: 42.0,
        }
    }

    #[test]
    fn test_throughput_formula() {
        // 1 MiB in one second
        let mbps = throughput_mbps(1_048_576, 1.0);
        assert!((mbps - 8.388608).abs() < 1e-9);
        // 25 MB in 4 seconds
        assert!((throughput_mbps(25_000_000, 4.0) - 50.0).abs() < 1e-9);
        assert_eq!(throughput_mbps(1_000, 0.0), 0.0);
    }

    #[test]
    fn test_packet_loss_and_ping_mean() {
        let mut agg = ResultAggregator::new();
        for (value, ok) in [(10.0, true), (0.0, false), (20.0, true), (0.0, false), (30.0, true)] {
            agg.record(sample(PhaseKind::Ping, value, ok, SampleSource::Primary));
        }

        let ping = agg.summarize(PhaseKind::Ping).unwrap();
        assert_eq!(ping.attempts, 5);
        assert_eq!(ping.successes, 3);
        assert!((ping.packet_loss_percent - 40.0).abs() < 1e-9);
        assert!((ping.value - 20.0).abs() < 1e-9);
        assert_eq!(ping.jitter_ms, Some(10.0));
    }

    #[test]
    fn test_all_pings_lost() {
        let mut agg = ResultAggregator::new();
        for _ in 0..4 {
            agg.record(sample(PhaseKind::Ping, 0.0, false, SampleSource::Primary));
        }
        let ping = agg.summarize(PhaseKind::Ping).unwrap();
        assert_eq!(ping.value, 0.0);
        assert_eq!(ping.packet_loss_percent, 100.0);
        assert_eq!(ping.jitter_ms, None);
    }

    #[test]
    fn test_finish_requires_every_phase() {
        let mut agg = ResultAggregator::new();
        agg.record(sample(PhaseKind::Ping, 12.0, true, SampleSource::Primary));
        agg.record(sample(PhaseKind::Download, 90.0, true, SampleSource::Primary));

        let now = Utc::now();
        let err = agg
            .finish(&selected(), &Geolocation::fallback(), now, now)
            .unwrap_err();
        assert!(matches!(err, SpeedtestError::IncompleteRun(PhaseKind::Upload)));
    }

    #[test]
    fn test_finish_rejects_throughput_without_successes() {
        let mut agg = ResultAggregator::new();
        agg.record(sample(PhaseKind::Ping, 12.0, true, SampleSource::Primary));
        agg.record(sample(PhaseKind::Download, 0.0, false, SampleSource::Primary));
        agg.record(sample(PhaseKind::Download, 0.0, false, SampleSource::Primary));
        agg.record(sample(PhaseKind::Upload, 20.0, true, SampleSource::Primary));

        assert!(matches!(
            agg.require(PhaseKind::Download),
            Err(SpeedtestError::IncompleteRun(PhaseKind::Download))
        ));

        let now = Utc::now();
        let err = agg
            .finish(&selected(), &Geolocation::fallback(), now, now)
            .unwrap_err();
        assert!(matches!(err, SpeedtestError::IncompleteRun(PhaseKind::Download)));
    }

    #[test]
    fn test_lost_pings_still_complete_a_run() {
        let mut agg = ResultAggregator::new();
        agg.record(sample(PhaseKind::Ping, 0.0, false, SampleSource::Primary));
        agg.record(sample(PhaseKind::Download, 90.0, true, SampleSource::Primary));
        agg.record(sample(PhaseKind::Upload, 20.0, true, SampleSource::Primary));

        let now = Utc::now();
        let result = agg
            .finish(&selected(), &Geolocation::fallback(), now, now)
            .unwrap();
        assert_eq!(result.packet_loss_percent, 100.0);
        assert_eq!(result.ping_ms, 0.0);
    }

    #[test]
    fn test_finish_uses_least_reliable_method() {
        let mut agg = ResultAggregator::new();
        agg.record(sample(PhaseKind::Ping, 12.0, true, SampleSource::Primary));
        agg.record(sample(PhaseKind::Download, 90.0, true, SampleSource::Primary));
        agg.record(sample(PhaseKind::Download, 30.0, true, SampleSource::Synthesized));
        agg.record(sample(PhaseKind::Upload, 20.0, true, SampleSource::Alternate));

        let started = Utc::now();
        let finished = started + chrono::Duration::milliseconds(2500);
        let location = Geolocation {
            isp: Some("Example Carrier".to_string()),
            ..Geolocation::fallback()
        };
        let result = agg.finish(&selected(), &location, started, finished).unwrap();

        assert_eq!(result.method, MeasurementMethod::Simulated);
        assert!((result.download_mbps - 60.0).abs() < 1e-9);
        assert!((result.upload_mbps - 20.0).abs() < 1e-9);
        assert_eq!(result.server_label, "Amsterdam");
        assert_eq!(result.location, "New York, United States");
        assert_eq!(result.isp.as_deref(), Some("Example Carrier"));
        assert_eq!(result.test_duration_ms, 2500);
    }
}
