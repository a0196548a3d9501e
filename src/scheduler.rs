//! Periodic retry sweep.
//!
//! Scans storage for chains whose latest attempt is due for retry and
//! advances each one: dispatch with the chain's immutable config snapshot
//! and payload, append the new attempt, sync the chain status. Chains are
//! processed independently; one chain's failure never halts the sweep.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WorkerSettings;
use crate::dispatcher::{DispatchRequest, Dispatcher};
use crate::error::WebhookError;
use crate::models::AttemptStatus;
use crate::shutdown::{stop_channel, StopHandle, StopReceiver};
use crate::storage::{AttemptFilter, Store};

/// Periodic sweep task advancing due retry chains.
pub struct RetryScheduler<S> {
    store: Arc<S>,
    dispatcher: Dispatcher,
    settings: WorkerSettings,
    stop_rx: StopReceiver,
}

impl<S: Store> RetryScheduler<S> {
    /// Build a scheduler and the handle used to stop it.
    pub fn new(store: Arc<S>, settings: WorkerSettings) -> Result<(Self, StopHandle), WebhookError> {
        let dispatcher = Dispatcher::new(settings.backoff.clone(), settings.http_timeout)?;
        let (handle, stop_rx) = stop_channel();
        Ok((
            Self {
                store,
                dispatcher,
                settings,
                stop_rx,
            },
            handle,
        ))
    }

    /// Run sweeps on the configured period until stopped or cancelled.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), WebhookError> {
        info!(
            target: "webhook_retries",
            period_secs = self.settings.retry_period.as_secs(),
            "Starting retry scheduler"
        );

        let mut ticker = interval(self.settings.retry_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                ack = self.stop_rx.requested() => {
                    debug!(target: "webhook_retries", "Stop requested");
                    ack.confirm();
                    return Ok(());
                }
                () = cancel.cancelled() => {
                    debug!(target: "webhook_retries", "Cancellation signal fired");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.sweep(&cancel).await;
                }
            }
        }
    }

    /// One sweep over all due chains. Partial-failure tolerant: per-chain
    /// errors are logged and the sweep continues. Cancellation aborts the
    /// sweep between chains and drops any in-flight dispatch.
    async fn sweep(&self, cancel: &CancellationToken) {
        let now = Utc::now();
        let ids = match self
            .store
            .find_webhook_ids_to_retry(AttemptFilter::due_for_retry(now))
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                error!(target: "webhook_retries", error = %e, "Failed to query chains due for retry");
                return;
            }
        };

        if ids.is_empty() {
            return;
        }

        debug!(
            target: "webhook_retries",
            chain_count = ids.len(),
            "Found chains due for retry"
        );

        for webhook_id in ids {
            if cancel.is_cancelled() {
                debug!(target: "webhook_retries", "Cancellation interrupted sweep");
                return;
            }
            if let Err(e) = self.advance_chain(webhook_id, cancel).await {
                error!(
                    target: "webhook_retries",
                    webhook_id = %webhook_id,
                    error = %e,
                    "Failed to advance chain"
                );
            }
        }
    }

    /// Advance one chain by a single attempt.
    async fn advance_chain(
        &self,
        webhook_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<(), WebhookError> {
        let latest = self
            .store
            .find_latest_attempt(webhook_id)
            .await?
            .ok_or_else(|| {
                WebhookError::Storage(format!("no attempts found for chain {webhook_id}"))
            })?;

        // Terminal chains and chains whose newest attempt is not yet due
        // surface here when bookkeeping lags the due query; skip them.
        if latest.status != AttemptStatus::ToRetry {
            return Ok(());
        }
        let now = Utc::now();
        match latest.next_retry_after {
            Some(after) if after <= now => {}
            _ => return Ok(()),
        }

        let chain_started_at = self
            .store
            .find_first_attempt(webhook_id)
            .await?
            .map_or(latest.created_at, |first| first.created_at);

        let attempt_number = latest.retry_attempt + 1;
        let request = DispatchRequest {
            webhook_id,
            config: &latest.config,
            payload: latest.payload.as_bytes(),
            attempt_number,
            chain_started_at,
            idempotency_key: None,
            is_test: false,
        };
        // Dropping the dispatch future aborts the HTTP call; nothing is
        // persisted, so the chain stays eligible exactly as if the request
        // had never been sent.
        let dispatched = tokio::select! {
            () = cancel.cancelled() => {
                debug!(
                    target: "webhook_retries",
                    webhook_id = %webhook_id,
                    "Cancellation aborted in-flight dispatch"
                );
                return Ok(());
            }
            dispatched = self.dispatcher.attempt(request) => dispatched,
        };
        let attempt = match dispatched {
            Ok(attempt) => attempt,
            Err(e @ WebhookError::Transport { .. }) => {
                // No response, no attempt record: the chain stays eligible
                // and the next sweep retries it without consuming an ordinal.
                warn!(
                    target: "webhook_retries",
                    webhook_id = %webhook_id,
                    attempt_number,
                    error = %e,
                    "Transport failure, chain left eligible for next sweep"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.store.insert_attempt(&attempt).await?;
        self.store
            .update_chain_status(webhook_id, attempt.status)
            .await?;

        info!(
            target: "webhook_retries",
            webhook_id = %webhook_id,
            attempt_number,
            status = %attempt.status,
            status_code = attempt.status_code,
            "Chain advanced"
        );

        Ok(())
    }
}
