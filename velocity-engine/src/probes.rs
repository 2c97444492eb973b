//! Timed probes against the selected server, with fallbacks

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use velocity_config::FallbackConfig;
use velocity_core::{throughput_mbps, Clock, PhaseKind, PhaseSample, SampleSource, SpeedtestError};
use velocity_http::{with_cache_buster, ProbeClient, ProbeRequest, ProbeResponse};
use velocity_resilience::{FallbackChain, FallbackPolicy, MbpsRange, ProbeStrategy, Resolution};

pub fn ping_url(base: &str) -> String {
    format!("{}/ping", base.trim_end_matches('/'))
}

pub fn download_url(base: &str, size: u64) -> String {
    format!("{}/random{}", base.trim_end_matches('/'), size)
}

pub fn upload_url(base: &str) -> String {
    format!("{}/upload", base.trim_end_matches('/'))
}

/// What a successful attempt measured
#[derive(Debug, Clone, Copy)]
struct Transfer {
    elapsed: Duration,
    bytes: u64,
}

async fn send(client: &dyn ProbeClient, request: ProbeRequest) -> Result<ProbeResponse, SpeedtestError> {
    let url = request.url.clone();
    client
        .execute(request)
        .await
        .and_then(|response| response.error_for_status(&url))
        .map_err(|e| SpeedtestError::ProbeFailure(e.to_string()))
}

fn end_time(start: DateTime<Utc>, elapsed: Duration) -> DateTime<Utc> {
    start + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Issues the probes of every phase through a fallback chain
pub struct ProbeRunner {
    client: Arc<dyn ProbeClient>,
    chain: FallbackChain,
    fallback: FallbackConfig,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl ProbeRunner {
    pub fn new(
        client: Arc<dyn ProbeClient>,
        chain: FallbackChain,
        fallback: FallbackConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            chain,
            fallback,
            clock,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &Arc<dyn ProbeClient> {
        &self.client
    }

    fn synthesis_range(&self, phase: PhaseKind) -> Option<MbpsRange> {
        if !self.fallback.synthesize {
            return None;
        }
        match phase {
            PhaseKind::Ping => None,
            PhaseKind::Download => Some(self.fallback.download_range),
            PhaseKind::Upload => Some(self.fallback.upload_range),
        }
    }

    fn alternate_url(&self, phase: PhaseKind, size: u64) -> Option<String> {
        if !self.fallback.use_alternates {
            return None;
        }
        Some(match phase {
            PhaseKind::Ping => self.fallback.alternate_ping_url.clone(),
            PhaseKind::Download => self
                .fallback
                .alternate_download_url
                .replace("{bytes}", &size.to_string()),
            PhaseKind::Upload => self.fallback.alternate_upload_url.clone(),
        })
    }

    fn policy(&self, phase: PhaseKind, primary: String, size: u64) -> FallbackPolicy {
        let millis = self.clock.now_millis();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        FallbackPolicy::new(ProbeStrategy::primary(with_cache_buster(&primary, millis, sequence)))
            .with_alternate(self.alternate_url(phase, size).map(|url| {
                ProbeStrategy::alternate(with_cache_buster(&url, millis, sequence))
            }))
            .with_synthesizer(self.synthesis_range(phase))
    }

    /// Probe one step of `phase`; `size` is ignored for ping
    pub async fn probe(&self, phase: PhaseKind, base: &str, size: Option<u64>) -> PhaseSample {
        match phase {
            PhaseKind::Ping => self.ping(base).await,
            PhaseKind::Download => self.download(base, size.unwrap_or_default()).await,
            PhaseKind::Upload => self.upload(base, size.unwrap_or_default()).await,
        }
    }

    /// One latency probe; an exhausted chain is a lost packet
    pub async fn ping(&self, base: &str) -> PhaseSample {
        let policy = self.policy(PhaseKind::Ping, ping_url(base), 0);
        let timeout = self.chain.attempt_timeout();
        let start = self.clock.now();

        let resolution = self
            .chain
            .resolve(&policy, |strategy| {
                let client = Arc::clone(&self.client);
                let request = ProbeRequest::get(strategy.url.clone()).with_timeout(timeout);
                async move {
                    let response = send(client.as_ref(), request).await?;
                    Ok::<_, SpeedtestError>(Transfer {
                        elapsed: response.elapsed,
                        bytes: response.bytes_received,
                    })
                }
            })
            .await;

        match resolution {
            Ok(Resolution::Probed { value, source, .. }) => {
                let ms = value.elapsed.as_secs_f64() * 1000.0;
                debug!("Ping {:.1} ms ({:?})", ms, source);
                PhaseSample {
                    phase: PhaseKind::Ping,
                    payload_size_bytes: None,
                    start_time: start,
                    end_time: end_time(start, value.elapsed),
                    success: true,
                    derived_value: ms,
                    source,
                }
            }
            Ok(Resolution::Synthesized { .. }) | Err(_) => {
                debug!("Ping lost");
                self.lost_ping()
            }
        }
    }

    pub async fn download(&self, base: &str, size: u64) -> PhaseSample {
        let policy = self.policy(PhaseKind::Download, download_url(base, size), size);
        let timeout = self.chain.attempt_timeout();

        self.transfer(PhaseKind::Download, size, &policy, move |url| {
            ProbeRequest::get(url).with_timeout(timeout).discarding_body()
        })
        .await
    }

    pub async fn upload(&self, base: &str, size: u64) -> PhaseSample {
        let policy = self.policy(PhaseKind::Upload, upload_url(base), size);
        let timeout = self.chain.attempt_timeout();
        let payload = vec![0u8; size as usize];

        self.transfer(PhaseKind::Upload, size, &policy, move |url| {
            ProbeRequest::post(url, payload.clone()).with_timeout(timeout)
        })
        .await
    }

    async fn transfer<B>(
        &self,
        phase: PhaseKind,
        size: u64,
        policy: &FallbackPolicy,
        build: B,
    ) -> PhaseSample
    where
        B: Fn(String) -> ProbeRequest,
    {
        let start = self.clock.now();

        let resolution = self
            .chain
            .resolve(policy, |strategy| {
                let client = Arc::clone(&self.client);
                let request = build(strategy.url.clone());
                async move {
                    let response = send(client.as_ref(), request).await?;
                    // Uploads count what was sent, downloads what arrived
                    let bytes = match phase {
                        PhaseKind::Upload => size,
                        _ => response.bytes_received,
                    };
                    if bytes == 0 {
                        return Err(SpeedtestError::ProbeFailure("empty transfer".to_string()));
                    }
                    Ok::<_, SpeedtestError>(Transfer {
                        elapsed: response.elapsed,
                        bytes,
                    })
                }
            })
            .await;

        match resolution {
            Ok(Resolution::Probed { value, source, .. }) => {
                let mbps = throughput_mbps(value.bytes, value.elapsed.as_secs_f64());
                debug!(
                    "{} {} bytes in {} ms: {:.2} Mbps ({:?})",
                    phase,
                    value.bytes,
                    value.elapsed.as_millis(),
                    mbps,
                    source
                );
                PhaseSample {
                    phase,
                    payload_size_bytes: Some(size),
                    start_time: start,
                    end_time: end_time(start, value.elapsed),
                    success: true,
                    derived_value: mbps,
                    source,
                }
            }
            Ok(Resolution::Synthesized { mbps, .. }) => self.synthesized(phase, size, mbps),
            Err(e) => {
                debug!("{} of {} bytes failed: {}", phase, size, e);
                PhaseSample {
                    phase,
                    payload_size_bytes: Some(size),
                    start_time: start,
                    end_time: self.clock.now(),
                    success: false,
                    derived_value: 0.0,
                    source: SampleSource::Primary,
                }
            }
        }
    }

    fn synthesized(&self, phase: PhaseKind, size: u64, mbps: f64) -> PhaseSample {
        let now = self.clock.now();
        PhaseSample {
            phase,
            payload_size_bytes: Some(size),
            start_time: now,
            end_time: now,
            success: true,
            derived_value: mbps,
            source: SampleSource::Synthesized,
        }
    }

    fn lost_ping(&self) -> PhaseSample {
        let now = self.clock.now();
        PhaseSample {
            phase: PhaseKind::Ping,
            payload_size_bytes: None,
            start_time: now,
            end_time: now,
            success: false,
            derived_value: 0.0,
            source: SampleSource::Primary,
        }
    }

    /// Sample standing in for a step the phase deadline cut off.
    ///
    /// Pings are lost; throughput steps are synthesized when the fallback
    /// policy allows it, otherwise `None`.
    pub fn substitute(&self, phase: PhaseKind, size: Option<u64>) -> Option<PhaseSample> {
        match phase {
            PhaseKind::Ping => Some(self.lost_ping()),
            _ => {
                let range = self.synthesis_range(phase)?;
                let mbps = self.chain.synthesizer().sample(range);
                Some(self.synthesized(phase, size.unwrap_or_default(), mbps))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velocity_core::{ManualClock, MeasurementMethod};
    use velocity_http::{MockProbeClient, MockReply, ProbeMethod};
    use velocity_resilience::Synthesizer;

    const BASE: &str = "https://fra.example.net";
    const MIB: u64 = 1024 * 1024;

    fn runner(client: MockProbeClient, fallback: FallbackConfig) -> (ProbeRunner, Arc<MockProbeClient>) {
        let client = Arc::new(client);
        let runner = ProbeRunner::new(
            client.clone(),
            FallbackChain::with_synthesizer(Duration::from_secs(5), Arc::new(Synthesizer::seeded(9))),
            fallback,
            Arc::new(ManualClock::at_millis(1_700_000_000_000)),
        );
        (runner, client)
    }

    #[test]
    fn test_probe_urls() {
        assert_eq!(ping_url("https://a.example.net/"), "https://a.example.net/ping");
        assert_eq!(download_url(BASE, 1024), "https://fra.example.net/random1024");
        assert_eq!(upload_url(BASE), "https://fra.example.net/upload");
    }

    #[tokio::test]
    async fn test_ping_sample() {
        let (runner, client) = runner(
            MockProbeClient::new().on(
                ProbeMethod::Get,
                &ping_url(BASE),
                MockReply::ok().with_elapsed(Duration::from_millis(24)),
            ),
            FallbackConfig::default(),
        );

        let sample = runner.ping(BASE).await;
        assert!(sample.success);
        assert_eq!(sample.derived_value, 24.0);
        assert_eq!(sample.source, SampleSource::Primary);
        assert_eq!(sample.duration_ms(), 24);

        let requests = client.requests();
        assert_eq!(requests[0].url, "https://fra.example.net/ping?t=1700000000000-0");
    }

    #[tokio::test]
    async fn test_same_millisecond_requests_get_distinct_urls() {
        let (runner, client) = runner(
            MockProbeClient::new()
                .on(ProbeMethod::Get, &ping_url(BASE), MockReply::ok())
                .on(
                    ProbeMethod::Get,
                    &download_url(BASE, MIB),
                    MockReply::ok().with_bytes(MIB).with_elapsed(Duration::from_secs(1)),
                ),
            FallbackConfig::default(),
        );

        // The clock never moves, so only the sequence tells these apart
        runner.ping(BASE).await;
        runner.ping(BASE).await;
        runner.download(BASE, MIB).await;
        runner.download(BASE, MIB).await;

        let urls: Vec<String> = client.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls.len(), 4);
        assert_eq!(urls[0], "https://fra.example.net/ping?t=1700000000000-0");
        assert_eq!(urls[1], "https://fra.example.net/ping?t=1700000000000-1");
        let unique: std::collections::HashSet<&String> = urls.iter().collect();
        assert_eq!(unique.len(), urls.len());
    }

    #[tokio::test]
    async fn test_ping_exhausted_is_lost() {
        let (runner, _) = runner(
            MockProbeClient::new()
                .on(ProbeMethod::Get, &ping_url(BASE), MockReply::status(503))
                .on(
                    ProbeMethod::Get,
                    "https://speed.cloudflare.com/__down",
                    MockReply::failure("connection reset"),
                ),
            FallbackConfig::default(),
        );

        let sample = runner.ping(BASE).await;
        assert!(!sample.success);
        assert_eq!(sample.derived_value, 0.0);
    }

    #[tokio::test]
    async fn test_download_mbps() {
        let (runner, _) = runner(
            MockProbeClient::new().on(
                ProbeMethod::Get,
                &download_url(BASE, 5 * MIB),
                MockReply::ok()
                    .with_bytes(5 * MIB)
                    .with_elapsed(Duration::from_millis(500)),
            ),
            FallbackConfig::default(),
        );

        let sample = runner.download(BASE, 5 * MIB).await;
        assert!(sample.success);
        assert_eq!(sample.payload_size_bytes, Some(5 * MIB));
        let expected = (5 * MIB) as f64 * 8.0 / 0.5 / 1_000_000.0;
        assert!((sample.derived_value - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_download_uses_alternate() {
        let (runner, client) = runner(
            MockProbeClient::new()
                .on(ProbeMethod::Get, &download_url(BASE, MIB), MockReply::status(404))
                .on(
                    ProbeMethod::Get,
                    "https://speed.cloudflare.com/__down?bytes=1048576",
                    MockReply::ok()
                        .with_bytes(MIB)
                        .with_elapsed(Duration::from_secs(1)),
                ),
            FallbackConfig::default(),
        );

        let sample = runner.download(BASE, MIB).await;
        assert!(sample.success);
        assert_eq!(sample.source, SampleSource::Alternate);
        assert_eq!(sample.source.method(), MeasurementMethod::EndpointSubstituted);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_sends_zero_filled_body() {
        let (runner, client) = runner(
            MockProbeClient::new().on(
                ProbeMethod::Post,
                &upload_url(BASE),
                MockReply::ok().with_elapsed(Duration::from_millis(250)),
            ),
            FallbackConfig::default(),
        );

        let sample = runner.upload(BASE, MIB).await;
        assert!(sample.success);
        assert_eq!(client.requests()[0].body_len, MIB);
        let expected = MIB as f64 * 8.0 / 0.25 / 1_000_000.0;
        assert!((sample.derived_value - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_everything_failing_synthesizes() {
        let (runner, _) = runner(MockProbeClient::new(), FallbackConfig::default());

        let sample = runner.upload(BASE, MIB).await;
        assert!(sample.success);
        assert_eq!(sample.source, SampleSource::Synthesized);
        assert!((5.0..35.0).contains(&sample.derived_value));
    }

    #[tokio::test]
    async fn test_without_fallbacks_failure_is_recorded() {
        let fallback = FallbackConfig {
            use_alternates: false,
            synthesize: false,
            ..FallbackConfig::default()
        };
        let (runner, client) = runner(MockProbeClient::new(), fallback);

        let sample = runner.download(BASE, MIB).await;
        assert!(!sample.success);
        assert_eq!(client.requests().len(), 1);
        assert!(runner.substitute(PhaseKind::Download, Some(MIB)).is_none());
        assert!(!runner.substitute(PhaseKind::Ping, None).unwrap().success);
    }

    #[tokio::test]
    async fn test_empty_download_body_is_a_failure() {
        let (runner, _) = runner(
            MockProbeClient::new().on(
                ProbeMethod::Get,
                &download_url(BASE, MIB),
                MockReply::ok().with_elapsed(Duration::from_millis(10)),
            ),
            FallbackConfig {
                use_alternates: false,
                ..FallbackConfig::default()
            },
        );

        let sample = runner.download(BASE, MIB).await;
        assert_eq!(sample.source, SampleSource::Synthesized);
    }
}
