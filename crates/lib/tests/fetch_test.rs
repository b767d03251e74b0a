//! # Retrying Fetcher Tests
//!
//! Attempt counts are verified by wiremock's `expect(n)` when the server drops.

mod common;

use common::{fast_fetcher, fast_policy, setup_tracing};
use handelingen::fetch::{FetchError, RetryingFetcher};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_retryable_status_is_attempted_max_retries_times() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc.xml"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    let fetcher = fast_fetcher(3);

    // --- 2. Act ---
    let result = fetcher.fetch(&format!("{}/doc.xml", server.uri())).await;

    // --- 3. Assert ---
    match result {
        Err(FetchError::MaxRetriesExceeded { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected MaxRetriesExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_retryable_status_fails_after_one_attempt() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let fetcher = fast_fetcher(3);

    // --- 2. Act ---
    let result = fetcher.fetch(&format!("{}/missing.xml", server.uri())).await;

    // --- 3. Assert ---
    match result {
        Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_recovers_after_transient_server_errors() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.xml"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<handeling/>"))
        .expect(1)
        .mount(&server)
        .await;
    let fetcher = fast_fetcher(5);

    // --- 2. Act ---
    let fetched = fetcher
        .fetch(&format!("{}/flaky.xml", server.uri()))
        .await
        .unwrap();

    // --- 3. Assert ---
    assert_eq!(fetched.status, 200);
    assert_eq!(fetched.text(), "<handeling/>");
}

#[tokio::test]
async fn test_timeouts_are_retried() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.xml"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .expect(2)
        .mount(&server)
        .await;
    let mut policy = fast_policy(2);
    policy.timeout_per_attempt = Duration::from_millis(100);
    let fetcher = RetryingFetcher::new(policy).unwrap();

    // --- 2. Act ---
    let result = fetcher.fetch(&format!("{}/slow.xml", server.uri())).await;

    // --- 3. Assert ---
    assert!(
        matches!(result, Err(FetchError::MaxRetriesExceeded { attempts: 2, .. })),
        "unexpected result: {result:?}"
    );
}

#[tokio::test]
async fn test_custom_retryable_status_set() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    let mut policy = fast_policy(2);
    policy.retryable_status = [500, 503].into_iter().collect();
    let fetcher = RetryingFetcher::new(policy).unwrap();

    // --- 2. Act ---
    let result = fetcher.fetch(&format!("{}/busy", server.uri())).await;

    // --- 3. Assert ---
    assert!(matches!(result, Err(FetchError::MaxRetriesExceeded { .. })));
}
