//! Tests for the reqwest probe client against a local mock server

use serde::Deserialize;
use std::time::Duration;
use velocity_http::{fetch_json, HttpConfig, HttpError, HttpProbeClient, ProbeClient, ProbeRequest};
use wiremock::matchers::{body_bytes, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> HttpProbeClient {
    HttpProbeClient::with_config(HttpConfig::default()).unwrap()
}

#[tokio::test]
async fn test_ping_with_cache_buster() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(query_param("t", "1700000000000-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = velocity_http::with_cache_buster(&format!("{}/ping", server.uri()), 1_700_000_000_000, 1);
    let response = client().execute(ProbeRequest::get(url)).await.unwrap();

    assert!(response.is_success());
    assert!(response.elapsed > Duration::ZERO);
}

#[tokio::test]
async fn test_download_counts_streamed_bytes() {
    let server = MockServer::start().await;
    let payload = vec![7u8; 256 * 1024];
    Mock::given(method("GET"))
        .and(path("/random262144"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload))
        .mount(&server)
        .await;

    let request = ProbeRequest::get(format!("{}/random262144", server.uri())).discarding_body();
    let response = client().execute(request).await.unwrap();

    assert_eq!(response.bytes_received, 256 * 1024);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_upload_sends_zero_filled_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_bytes(vec![0u8; 4096]))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let request = ProbeRequest::post(format!("{}/upload", server.uri()), vec![0u8; 4096]);
    let response = client().execute(request).await.unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn test_non_success_status_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let url = format!("{}/ping", server.uri());
    let response = client().execute(ProbeRequest::get(&url)).await.unwrap();
    assert_eq!(response.status, 503);
    assert!(matches!(
        response.error_for_status(&url),
        Err(HttpError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let request =
        ProbeRequest::get(format!("{}/ping", server.uri())).with_timeout(Duration::from_millis(200));
    let err = client().execute(request).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[derive(Debug, Deserialize)]
struct Lookup {
    latitude: f64,
    city: String,
}

#[tokio::test]
async fn test_fetch_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "latitude": 52.52,
            "longitude": 13.405,
            "city": "Berlin",
            "country_name": "Germany"
        })))
        .mount(&server)
        .await;

    let client = client();
    let lookup: Lookup = fetch_json(&client, &format!("{}/json/", server.uri()), Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(lookup.city, "Berlin");
    assert_eq!(lookup.latitude, 52.52);
}
