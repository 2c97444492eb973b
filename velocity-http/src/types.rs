//! Probe request and response types

use crate::errors::HttpError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// HTTP methods a probe can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    #[default]
    Get,
    Post,
}

impl ProbeMethod {
    /// Get the string representation of the HTTP method
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMethod::Get => "GET",
            ProbeMethod::Post => "POST",
        }
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProbeMethod {
    type Err = HttpMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(ProbeMethod::Get),
            "POST" => Ok(ProbeMethod::Post),
            _ => Err(HttpMethodError::InvalidMethod(s.to_string())),
        }
    }
}

impl From<ProbeMethod> for reqwest::Method {
    fn from(method: ProbeMethod) -> Self {
        match method {
            ProbeMethod::Get => reqwest::Method::GET,
            ProbeMethod::Post => reqwest::Method::POST,
        }
    }
}

/// Errors that can occur when parsing HTTP methods
#[derive(Error, Debug, Clone)]
pub enum HttpMethodError {
    #[error("Invalid HTTP method: '{0}'. Supported methods are: GET, POST")]
    InvalidMethod(String),
}

/// A single timed request
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub method: ProbeMethod,
    pub url: String,
    pub body: Option<Vec<u8>>,
    /// Overrides the client's default timeout
    pub timeout: Option<Duration>,
    /// Count the response body without keeping it
    pub discard_body: bool,
}

impl ProbeRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: ProbeMethod::Get,
            url: url.into(),
            body: None,
            timeout: None,
            discard_body: false,
        }
    }

    pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: ProbeMethod::Post,
            url: url.into(),
            body: Some(body),
            timeout: None,
            discard_body: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn discarding_body(mut self) -> Self {
        self.discard_body = true;
        self
    }

    /// Number of bytes this request uploads
    pub fn body_len(&self) -> u64 {
        self.body.as_ref().map(|b| b.len() as u64).unwrap_or(0)
    }
}

/// Outcome of a probe that reached the server
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    /// Empty when the request discarded its body
    pub body: Vec<u8>,
    pub bytes_received: u64,
    /// Wall-clock time from send until the body was fully consumed
    pub elapsed: Duration,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx status into an error
    pub fn error_for_status(self, url: &str) -> Result<Self, HttpError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HttpError::Status {
                status: self.status,
                url: url.to_string(),
            })
        }
    }

    /// Parse the body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Append a `t` query parameter so intermediaries cannot serve a cached copy.
///
/// The value is `<millis>-<sequence>`; the sequence keeps requests issued in
/// the same millisecond apart.
pub fn with_cache_buster(url: &str, millis: i64, sequence: u64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}-{}", url, separator, millis, sequence)
}
