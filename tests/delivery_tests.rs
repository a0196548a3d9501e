//! Dispatcher tests: wire contract and outcome classification.

mod common;

use std::time::Duration;

use common::{subscription, SECRET_1};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use webhook_relay::backoff::BackoffPolicy;
use webhook_relay::dispatcher::{
    DispatchRequest, Dispatcher, HEADER_ID, HEADER_IDEMPOTENCY_KEY, HEADER_SIGNATURE,
    HEADER_TEST, HEADER_TIMESTAMP, USER_AGENT,
};
use webhook_relay::error::WebhookError;
use webhook_relay::models::AttemptStatus;
use webhook_relay::security;

fn dispatcher(policy: BackoffPolicy) -> Dispatcher {
    common::init_tracing();
    Dispatcher::new(policy, Duration::from_secs(2)).unwrap()
}

async fn mock_200() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

/// Scenario A: a 2xx response classifies as exactly one Success attempt.
#[tokio::test]
async fn test_successful_delivery() {
    let server = mock_200().await;
    let config = subscription(&format!("{}/hook", server.uri()), SECRET_1, &["foo"]);
    let payload = common::event_json("foo");

    let webhook_id = Uuid::new_v4();
    let attempt = dispatcher(BackoffPolicy::default())
        .attempt(DispatchRequest::first(webhook_id, &config, &payload))
        .await
        .unwrap();

    assert_eq!(attempt.status, AttemptStatus::Success);
    assert_eq!(attempt.status_code, 200);
    assert_eq!(attempt.retry_attempt, 0);
    assert_eq!(attempt.webhook_id, webhook_id);
    assert!(attempt.next_retry_after.is_none());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

/// The wire contract: body verbatim, all delivery headers present, and the
/// signature verifies against the subscription secret.
#[tokio::test]
async fn test_wire_contract_headers() {
    let server = mock_200().await;
    let config = subscription(&format!("{}/hook", server.uri()), SECRET_1, &["foo"]);
    let payload = common::event_json("foo");

    let webhook_id = Uuid::new_v4();
    dispatcher(BackoffPolicy::default())
        .attempt(DispatchRequest::first(webhook_id, &config, &payload))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    assert_eq!(request.body, payload, "payload must be forwarded verbatim");

    let header = |name: &str| {
        request
            .headers
            .get(name)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_else(|| panic!("missing header {name}"))
    };

    assert_eq!(header("content-type"), "application/json");
    assert_eq!(header("user-agent"), USER_AGENT);
    assert_eq!(header(HEADER_ID), webhook_id.to_string());
    assert_eq!(header(HEADER_TEST), "false");

    let timestamp: i64 = header(HEADER_TIMESTAMP).parse().unwrap();
    let signature = header(HEADER_SIGNATURE);
    assert!(signature.starts_with("v1,"));
    assert!(security::verify(
        &signature,
        &webhook_id.to_string(),
        timestamp,
        SECRET_1,
        &payload,
    )
    .unwrap());
}

/// The idempotency key header is sent only when a key is set.
#[tokio::test]
async fn test_idempotency_key_header() {
    let server = mock_200().await;
    let config = subscription(&format!("{}/hook", server.uri()), SECRET_1, &["foo"]);
    let payload = common::event_json("foo");

    let mut request = DispatchRequest::first(Uuid::new_v4(), &config, &payload);
    request.idempotency_key = Some("evt_7");
    dispatcher(BackoffPolicy::default())
        .attempt(request)
        .await
        .unwrap();

    let plain = DispatchRequest::first(Uuid::new_v4(), &config, &payload);
    dispatcher(BackoffPolicy::default())
        .attempt(plain)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0]
            .headers
            .get(HEADER_IDEMPOTENCY_KEY)
            .map(|v| v.to_str().unwrap()),
        Some("evt_7")
    );
    assert!(requests[1].headers.get(HEADER_IDEMPOTENCY_KEY).is_none());
}

/// Test deliveries carry the test marker header.
#[tokio::test]
async fn test_test_delivery_marker() {
    let server = mock_200().await;
    let config = subscription(&format!("{}/hook", server.uri()), SECRET_1, &["foo"]);

    let mut request = DispatchRequest::first(Uuid::new_v4(), &config, b"{}");
    request.is_test = true;
    dispatcher(BackoffPolicy::default())
        .attempt(request)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get(HEADER_TEST).unwrap().to_str().unwrap(),
        "true"
    );
}

/// A non-2xx response with retry budget left classifies as ToRetry with a
/// strictly future next_retry_after.
#[tokio::test]
async fn test_non_2xx_schedules_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let config = subscription(&server.uri(), SECRET_1, &["foo"]);

    let attempt = dispatcher(BackoffPolicy::default())
        .attempt(DispatchRequest::first(Uuid::new_v4(), &config, b"{}"))
        .await
        .unwrap();

    assert_eq!(attempt.status, AttemptStatus::ToRetry);
    assert_eq!(attempt.status_code, 404);
    let next = attempt.next_retry_after.expect("ToRetry must set next_retry_after");
    assert!(next > attempt.created_at);
}

/// An exhausted policy classifies a non-2xx response as Failed.
#[tokio::test]
async fn test_exhausted_policy_fails_chain() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let config = subscription(&server.uri(), SECRET_1, &["foo"]);

    // Empty schedule: exhausted from the first failure
    let attempt = dispatcher(BackoffPolicy::schedule(vec![]))
        .attempt(DispatchRequest::first(Uuid::new_v4(), &config, b"{}"))
        .await
        .unwrap();

    assert_eq!(attempt.status, AttemptStatus::Failed);
    assert!(attempt.next_retry_after.is_none());
}

/// A transport-level failure produces no attempt record.
#[tokio::test]
async fn test_transport_failure_is_an_error() {
    // Nothing listens on this port
    let config = subscription("http://127.0.0.1:1/hook", SECRET_1, &["foo"]);

    let result = dispatcher(BackoffPolicy::default())
        .attempt(DispatchRequest::first(Uuid::new_v4(), &config, b"{}"))
        .await;

    assert!(matches!(result, Err(WebhookError::Transport { .. })));
}
