//! Signed delivery execution and outcome classification.
//!
//! The dispatcher builds a signed HTTP POST for one delivery attempt, sends
//! it with a bounded timeout, and classifies the result into an [`Attempt`]
//! record. It never touches storage: the caller persists the returned
//! record, which keeps one HTTP call from ever leaving a half-written chain.

use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backoff::BackoffPolicy;
use crate::error::WebhookError;
use crate::models::{Attempt, AttemptStatus, Config};
use crate::security;

/// User agent sent with every delivery (wire contract, exact).
pub const USER_AGENT: &str = "formance-webhooks/v2";

/// Delivery header names (wire contract, exact).
pub const HEADER_ID: &str = "formance-webhook-id";
pub const HEADER_TIMESTAMP: &str = "formance-webhook-timestamp";
pub const HEADER_SIGNATURE: &str = "formance-webhook-signature";
pub const HEADER_TEST: &str = "formance-webhook-test";
pub const HEADER_IDEMPOTENCY_KEY: &str = "formance-webhook-idempotency-key";

/// Inputs for one delivery attempt.
#[derive(Debug, Clone)]
pub struct DispatchRequest<'a> {
    /// Chain identifier; shared by every attempt of the chain.
    pub webhook_id: Uuid,
    /// Subscription snapshot (endpoint, secret) taken at first dispatch.
    pub config: &'a Config,
    /// Raw event payload, sent unmodified.
    pub payload: &'a [u8],
    /// 0-based ordinal of this attempt within its chain.
    pub attempt_number: u32,
    /// Creation time of the chain's first attempt; governs the abort deadline.
    pub chain_started_at: DateTime<Utc>,
    /// Token for receiver-side deduplication of redelivered events.
    pub idempotency_key: Option<&'a str>,
    /// Marks manually-triggered test deliveries.
    pub is_test: bool,
}

impl<'a> DispatchRequest<'a> {
    /// First attempt of a fresh chain.
    #[must_use]
    pub fn first(webhook_id: Uuid, config: &'a Config, payload: &'a [u8]) -> Self {
        Self {
            webhook_id,
            config,
            payload,
            attempt_number: 0,
            chain_started_at: Utc::now(),
            idempotency_key: None,
            is_test: false,
        }
    }
}

/// Performs signed deliveries and classifies outcomes.
#[derive(Clone)]
pub struct Dispatcher {
    http_client: Client,
    backoff: BackoffPolicy,
}

impl Dispatcher {
    /// Build a dispatcher with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Internal`] if the HTTP client cannot be built.
    pub fn new(backoff: BackoffPolicy, timeout: Duration) -> Result<Self, WebhookError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            backoff,
        })
    }

    /// Execute one delivery attempt.
    ///
    /// A 2xx response classifies as [`AttemptStatus::Success`]; any other
    /// response asks the backoff policy for the next delay
    /// ([`AttemptStatus::ToRetry`], or [`AttemptStatus::Failed`] once
    /// exhausted). A transport-level failure before a response is obtained
    /// is a [`WebhookError::Transport`]: no attempt record is produced and
    /// the caller decides whether the try counts.
    pub async fn attempt(&self, request: DispatchRequest<'_>) -> Result<Attempt, WebhookError> {
        let now = Utc::now();
        let timestamp = now.timestamp();
        let webhook_id = request.webhook_id.to_string();
        let signature = security::sign(
            &webhook_id,
            timestamp,
            &request.config.secret,
            request.payload,
        );

        let mut req = self
            .http_client
            .post(&request.config.endpoint)
            .header("content-type", "application/json")
            .header(HEADER_ID, &webhook_id)
            .header(HEADER_TIMESTAMP, timestamp.to_string())
            .header(HEADER_SIGNATURE, signature)
            .header(HEADER_TEST, request.is_test.to_string())
            .body(request.payload.to_vec());

        if let Some(key) = request.idempotency_key {
            req = req.header(HEADER_IDEMPOTENCY_KEY, key);
        }

        let start = Instant::now();
        let response = req.send().await.map_err(|e| {
            let cause = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                format!("connection failed: {e}")
            } else {
                format!("request error: {e}")
            };
            WebhookError::Transport { cause }
        })?;

        let status_code = response.status().as_u16();
        let latency_ms = start.elapsed().as_millis() as u64;

        debug!(
            target: "webhook_delivery",
            webhook_id = %request.webhook_id,
            endpoint = %request.config.endpoint,
            attempt_number = request.attempt_number,
            status_code,
            latency_ms,
            "Delivery attempt completed"
        );

        let mut attempt = Attempt {
            id: Uuid::new_v4(),
            webhook_id: request.webhook_id,
            created_at: now,
            config: request.config.clone(),
            payload: String::from_utf8_lossy(request.payload).into_owned(),
            status_code,
            retry_attempt: request.attempt_number,
            status: AttemptStatus::Success,
            next_retry_after: None,
        };

        if (200..300).contains(&status_code) {
            return Ok(attempt);
        }

        match self
            .backoff
            .next_delay(request.attempt_number, request.chain_started_at, now)
        {
            Some(delay) => {
                attempt.status = AttemptStatus::ToRetry;
                attempt.next_retry_after = Some(next_retry_time(now, delay));
            }
            None => {
                warn!(
                    target: "webhook_delivery",
                    webhook_id = %request.webhook_id,
                    endpoint = %request.config.endpoint,
                    attempt_number = request.attempt_number,
                    "Retries exhausted, chain failed"
                );
                attempt.status = AttemptStatus::Failed;
            }
        }

        Ok(attempt)
    }
}

/// Retry time `delay` after `now`, saturating at the calendar bound so no
/// configured delay can overflow the timestamp arithmetic.
fn next_retry_time(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
