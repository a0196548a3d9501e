//! In-memory reference store.
//!
//! Backs the integration tests and small embedded deployments. Each method
//! takes the lock once, giving the per-operation atomicity the engine
//! expects from real backends.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::WebhookError;
use crate::models::{Attempt, AttemptStatus, Config};
use crate::router;
use crate::storage::{AttemptFilter, Store};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    configs: Vec<Config>,
    attempts: Vec<Attempt>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription snapshot.
    pub fn insert_config(&self, config: Config) {
        self.inner.lock().expect("store poisoned").configs.push(config);
    }

    /// All attempts of one chain, in insertion order.
    #[must_use]
    pub fn attempts_for(&self, webhook_id: Uuid) -> Vec<Attempt> {
        self.inner
            .lock()
            .expect("store poisoned")
            .attempts
            .iter()
            .filter(|a| a.webhook_id == webhook_id)
            .cloned()
            .collect()
    }

    /// Every persisted attempt, in insertion order.
    #[must_use]
    pub fn all_attempts(&self) -> Vec<Attempt> {
        self.inner.lock().expect("store poisoned").attempts.clone()
    }

    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.inner.lock().expect("store poisoned").attempts.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_active_configs(&self, event_type: &str) -> Result<Vec<Config>, WebhookError> {
        let inner = self.inner.lock().expect("store poisoned");
        Ok(router::route(event_type, &inner.configs)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), WebhookError> {
        self.inner
            .lock()
            .expect("store poisoned")
            .attempts
            .push(attempt.clone());
        Ok(())
    }

    async fn find_webhook_ids_to_retry(
        &self,
        filter: AttemptFilter,
    ) -> Result<Vec<Uuid>, WebhookError> {
        let inner = self.inner.lock().expect("store poisoned");
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for attempt in &inner.attempts {
            if filter.matches(attempt) && seen.insert(attempt.webhook_id) {
                ids.push(attempt.webhook_id);
            }
        }
        Ok(ids)
    }

    async fn find_latest_attempt(
        &self,
        webhook_id: Uuid,
    ) -> Result<Option<Attempt>, WebhookError> {
        let inner = self.inner.lock().expect("store poisoned");
        Ok(inner
            .attempts
            .iter()
            .filter(|a| a.webhook_id == webhook_id)
            .max_by_key(|a| (a.retry_attempt, a.created_at))
            .cloned())
    }

    async fn find_first_attempt(
        &self,
        webhook_id: Uuid,
    ) -> Result<Option<Attempt>, WebhookError> {
        let inner = self.inner.lock().expect("store poisoned");
        Ok(inner
            .attempts
            .iter()
            .filter(|a| a.webhook_id == webhook_id)
            .min_by_key(|a| (a.retry_attempt, a.created_at))
            .cloned())
    }

    async fn update_chain_status(
        &self,
        webhook_id: Uuid,
        status: AttemptStatus,
    ) -> Result<u64, WebhookError> {
        // Syncs the status column across the chain so stale ToRetry records
        // stop matching the due filter. Ordinals, payloads and timestamps
        // stay untouched (append-only audit trail).
        let mut inner = self.inner.lock().expect("store poisoned");
        let mut modified = 0u64;
        for attempt in inner
            .attempts
            .iter_mut()
            .filter(|a| a.webhook_id == webhook_id && a.status != status)
        {
            attempt.status = status;
            modified += 1;
        }
        Ok(modified)
    }
}
