//! HTTP probe client implementation

use crate::config::HttpConfig;
use crate::errors::HttpError;
use crate::types::{ProbeRequest, ProbeResponse};
use futures_util::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Timed request primitive every probe goes through
#[async_trait::async_trait]
pub trait ProbeClient: Send + Sync {
    /// Send a request and consume the response body.
    ///
    /// Any status code is returned as a response; callers decide what counts
    /// as success with [`ProbeResponse::error_for_status`].
    async fn execute(&self, request: ProbeRequest) -> Result<ProbeResponse, HttpError>;
}

/// GET a URL and decode its JSON body
pub async fn fetch_json<T: DeserializeOwned>(
    client: &dyn ProbeClient,
    url: &str,
    timeout: Duration,
) -> Result<T, HttpError> {
    let response = client
        .execute(ProbeRequest::get(url).with_timeout(timeout))
        .await?
        .error_for_status(url)?;
    response.json()
}

/// reqwest-backed probe client
#[derive(Debug, Clone)]
pub struct HttpProbeClient {
    client: Client,
    config: HttpConfig,
}

impl HttpProbeClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a client with specific configuration
    pub fn with_config(config: HttpConfig) -> Result<Self, HttpError> {
        debug!(
            "Creating HttpProbeClient with timeout: {}s",
            config.timeout.as_secs()
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| HttpError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl ProbeClient for HttpProbeClient {
    async fn execute(&self, request: ProbeRequest) -> Result<ProbeResponse, HttpError> {
        let timeout = request.timeout.unwrap_or(self.config.timeout);
        let url = request.url;

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .timeout(timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!("Sending {} {}", request.method, url);
        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(e, &url, timeout))?;
        let status = response.status().as_u16();

        let (body, bytes_received) = if request.discard_body {
            let mut stream = response.bytes_stream();
            let mut received = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| HttpError::from_reqwest(e, &url, timeout))?;
                received += chunk.len() as u64;
            }
            (Vec::new(), received)
        } else {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| HttpError::from_reqwest(e, &url, timeout))?;
            let received = bytes.len() as u64;
            (bytes.to_vec(), received)
        };
        let elapsed = start.elapsed();

        trace!(
            status,
            bytes_received,
            elapsed_ms = elapsed.as_millis() as u64,
            "Probe response from {}",
            url
        );

        Ok(ProbeResponse {
            status,
            body,
            bytes_received,
            elapsed,
        })
    }
}
