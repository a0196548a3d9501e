//! Shared fixtures for webhook-relay integration tests.
//!
//! Provides an in-memory queue, failure-injecting store wrappers, and
//! payload builders for exercising the delivery engine without a real
//! broker or database.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use webhook_relay::error::WebhookError;
use webhook_relay::models::{Attempt, AttemptStatus, Config};
use webhook_relay::queue::{Message, Queue};
use webhook_relay::storage::{AttemptFilter, MemoryStore, Store};

/// Install a log subscriber for the test binary. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Standard test secrets.
pub const SECRET_1: &str = "whsec_test_secret_key_12345";
pub const SECRET_2: &str = "whsec_another_secret_67890";

/// Build an active subscription snapshot for an endpoint.
pub fn subscription(endpoint: &str, secret: &str, event_types: &[&str]) -> Config {
    Config::new(
        endpoint,
        Some(secret.to_string()),
        event_types.iter().map(ToString::to_string).collect(),
    )
}

/// Raw JSON event message bytes, as they arrive from the queue.
pub fn event_json(event_type: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "date": Utc::now(),
        "type": event_type,
        "payload": { "txid": 42, "amount": 100 },
    }))
    .unwrap()
}

/// Poll a condition until it holds or the timeout elapses.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

// ---------------------------------------------------------------------------
// TestQueue - in-memory Queue implementation
// ---------------------------------------------------------------------------

/// In-memory queue preloaded with messages. Once drained, `fetch_next`
/// parks until the cancellation signal fires, like an idle broker.
#[derive(Clone, Default)]
pub struct TestQueue {
    pending: Arc<Mutex<VecDeque<Vec<u8>>>>,
    committed: Arc<Mutex<Vec<i64>>>,
    next_offset: Arc<AtomicI64>,
}

impl TestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw message payload.
    pub fn push(&self, payload: Vec<u8>) {
        self.pending.lock().unwrap().push_back(payload);
    }

    /// Offsets acknowledged so far, in commit order.
    pub fn committed(&self) -> Vec<i64> {
        self.committed.lock().unwrap().clone()
    }

    pub fn committed_count(&self) -> usize {
        self.committed.lock().unwrap().len()
    }
}

#[async_trait]
impl Queue for TestQueue {
    async fn fetch_next(&self, cancel: &CancellationToken) -> Result<Message, WebhookError> {
        loop {
            if let Some(payload) = self.pending.lock().unwrap().pop_front() {
                let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
                return Ok(Message {
                    topic: "test".to_string(),
                    offset,
                    partition: 0,
                    payload,
                });
            }
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(WebhookError::Queue("cancelled".to_string()));
                }
                () = tokio::time::sleep(Duration::from_millis(10)) => {}
            }
        }
    }

    async fn commit(&self, message: &Message) -> Result<(), WebhookError> {
        self.committed.lock().unwrap().push(message.offset);
        Ok(())
    }

    async fn close(&self) -> Result<(), WebhookError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingStore - storage failure injection
// ---------------------------------------------------------------------------

/// Store wrapper that fails `insert_attempt`, for fail-fast tests.
#[derive(Clone)]
pub struct FailingStore {
    pub inner: MemoryStore,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn find_active_configs(&self, event_type: &str) -> Result<Vec<Config>, WebhookError> {
        self.inner.find_active_configs(event_type).await
    }

    async fn insert_attempt(&self, _attempt: &Attempt) -> Result<(), WebhookError> {
        Err(WebhookError::Storage("disk full".to_string()))
    }

    async fn find_webhook_ids_to_retry(
        &self,
        filter: AttemptFilter,
    ) -> Result<Vec<Uuid>, WebhookError> {
        self.inner.find_webhook_ids_to_retry(filter).await
    }

    async fn find_latest_attempt(
        &self,
        webhook_id: Uuid,
    ) -> Result<Option<Attempt>, WebhookError> {
        self.inner.find_latest_attempt(webhook_id).await
    }

    async fn find_first_attempt(
        &self,
        webhook_id: Uuid,
    ) -> Result<Option<Attempt>, WebhookError> {
        self.inner.find_first_attempt(webhook_id).await
    }

    async fn update_chain_status(
        &self,
        webhook_id: Uuid,
        status: AttemptStatus,
    ) -> Result<u64, WebhookError> {
        self.inner.update_chain_status(webhook_id, status).await
    }
}
