//! Tests for the HTTP client module

use super::*;
use crate::error::Error;
use crate::types::BackoffType;
use bytes::Bytes;
use std::time::Duration;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config(uri: String) -> HttpClientConfig {
    HttpClientConfig::builder()
        .base_url(uri)
        .max_retries(3)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .build()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_retries, 6);
    assert!(config.base_url.is_none());
    assert!(config.user_agent.starts_with("bq-batch-load/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://bigquery.googleapis.com")
        .timeout(Duration::from_secs(10))
        .max_retries(2)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .header("X-Goog-User-Project", "acme")
        .user_agent("loader-test/1.0")
        .build();

    assert_eq!(
        config.base_url.as_deref(),
        Some("https://bigquery.googleapis.com")
    );
    assert_eq!(config.timeout, Duration::from_secs(10));
    assert_eq!(config.max_retries, 2);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(
        config.default_headers.get("X-Goog-User-Project"),
        Some(&"acme".to_string())
    );
    assert_eq!(config.user_agent, "loader-test/1.0");
}

#[test]
fn test_build_url() {
    let client = HttpClient::with_config(
        HttpClientConfig::builder()
            .base_url("https://bigquery.googleapis.com/")
            .build(),
    )
    .unwrap();

    assert_eq!(
        client.build_url("/bigquery/v2/projects/p/jobs"),
        "https://bigquery.googleapis.com/bigquery/v2/projects/p/jobs"
    );
    assert_eq!(
        client.build_url("https://upload.example.com/session?id=1"),
        "https://upload.example.com/session?id=1"
    );
}

#[tokio::test]
async fn test_get_with_query_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs/job_1"))
        .and(query_param("location", "EU"))
        .and(header("X-Goog-User-Project", "acme"))
        .and(header("X-Request-Id", "req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "job_1"})))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .header("X-Goog-User-Project", "acme")
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let body: serde_json::Value = client
        .get_json_with_config(
            "/jobs/job_1",
            RequestConfig::new()
                .query("location", "EU")
                .header("X-Request-Id", "req-1"),
        )
        .await
        .unwrap();

    assert_eq!(body["id"], "job_1");
}

#[tokio::test]
async fn test_put_raw_bytes_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/upload"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(b"{\"a\":1}\n".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let response = client
        .put_with_config(
            "/upload",
            RequestConfig::new().bytes(
                Bytes::from_static(b"{\"a\":1}\n"),
                "application/octet-stream",
            ),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_resume_incomplete_is_not_followed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/upload"))
        .respond_with(
            ResponseTemplate::new(308)
                .insert_header("Range", "bytes=0-262143")
                .insert_header("Location", "https://elsewhere.invalid/"),
        )
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let response = client
        .put_with_config("/upload", RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 308);
    assert_eq!(response.headers().get("range").unwrap(), "bytes=0-262143");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found: Dataset acme:raw"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let err = client.get("/missing").await.unwrap_err();

    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("Dataset acme:raw"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_retry_on_503() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let response = client.get("/flaky").await.unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_rate_limit_retry_honours_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let response = client.get("/limited").await.unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let err = client
        .get_with_config("/down", RequestConfig::new().retries(2))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_bearer_auth_is_applied() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("Authorization", "Bearer ya29.token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_auth(
        fast_config(mock_server.uri()),
        crate::auth::AuthConfig::Bearer {
            token: "ya29.token".to_string(),
        },
    )
    .unwrap();

    assert_eq!(client.get("/secure").await.unwrap().status(), 200);
}

#[test]
fn test_backoff_constant() {
    let initial = Duration::from_millis(100);
    let max = Duration::from_secs(10);
    assert_eq!(backoff_delay(BackoffType::Constant, initial, max, 0), initial);
    assert_eq!(backoff_delay(BackoffType::Constant, initial, max, 5), initial);
}

#[test]
fn test_backoff_linear() {
    let initial = Duration::from_millis(100);
    let max = Duration::from_secs(10);
    assert_eq!(
        backoff_delay(BackoffType::Linear, initial, max, 2),
        Duration::from_millis(300)
    );
}

#[test]
fn test_backoff_exponential_is_capped() {
    let client = HttpClient::with_config(
        HttpClientConfig::builder()
            .backoff(
                BackoffType::Exponential,
                Duration::from_millis(100),
                Duration::from_millis(500),
            )
            .build(),
    )
    .unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(400));
    assert_eq!(client.calculate_backoff(10), Duration::from_millis(500));
    assert_eq!(client.calculate_backoff(40), Duration::from_millis(500));
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::new().unwrap();
    let debug_str = format!("{client:?}");
    assert!(debug_str.contains("HttpClient"));
    assert!(debug_str.contains("has_authenticator"));
}
