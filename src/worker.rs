//! Event-consumption worker.
//!
//! Long-running task draining the queue: decode the event, derive its
//! canonical type, route to active subscriptions, dispatch one signed
//! attempt per match, persist each attempt, and only then acknowledge the
//! message. A crash before the commit causes redelivery, which is why
//! duplicate attempts are possible and endpoints get idempotency keys.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WorkerSettings;
use crate::dispatcher::{DispatchRequest, Dispatcher};
use crate::error::WebhookError;
use crate::models::EventMessage;
use crate::queue::{Message, Queue};
use crate::shutdown::{stop_channel, StopHandle, StopReceiver};
use crate::storage::Store;
use crate::validation;

/// Event-consumption task.
///
/// Processes messages strictly sequentially; horizontal scale-out is a
/// property of the queue partitioning, not of this task.
pub struct Worker<Q, S> {
    queue: Q,
    store: Arc<S>,
    dispatcher: Dispatcher,
    settings: WorkerSettings,
    stop_rx: StopReceiver,
}

impl<Q: Queue, S: Store> Worker<Q, S> {
    /// Build a worker and the handle used to stop it.
    pub fn new(
        queue: Q,
        store: Arc<S>,
        settings: WorkerSettings,
    ) -> Result<(Self, StopHandle), WebhookError> {
        let dispatcher = Dispatcher::new(settings.backoff.clone(), settings.http_timeout)?;
        let (handle, stop_rx) = stop_channel();
        Ok((
            Self {
                queue,
                store,
                dispatcher,
                settings,
                stop_rx,
            },
            handle,
        ))
    }

    /// Run until stopped, cancelled, or hit by a fatal error.
    ///
    /// Storage and transport failures while processing a message are fatal:
    /// the message is left uncommitted so the transport redelivers it, and a
    /// process supervisor is expected to restart the task.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), WebhookError> {
        info!(target: "webhook_worker", "Starting worker");

        loop {
            tokio::select! {
                ack = self.stop_rx.requested() => {
                    debug!(target: "webhook_worker", "Stop requested");
                    let close = self.queue.close().await;
                    ack.confirm();
                    return close;
                }
                () = cancel.cancelled() => {
                    debug!(target: "webhook_worker", "Cancellation signal fired");
                    return self.queue.close().await;
                }
                fetched = self.queue.fetch_next(&cancel) => {
                    let message = match fetched {
                        Ok(m) => m,
                        Err(e) if cancel.is_cancelled() => {
                            debug!(target: "webhook_worker", error = %e, "Fetch aborted by cancellation");
                            return self.queue.close().await;
                        }
                        Err(e) => {
                            error!(target: "webhook_worker", error = %e, "Fetch failed");
                            let _ = self.queue.close().await;
                            return Err(e);
                        }
                    };

                    debug!(
                        target: "webhook_worker",
                        offset = message.offset,
                        partition = message.partition,
                        "New message fetched"
                    );

                    if let Err(e) = self.process_message(&message, &cancel).await {
                        error!(target: "webhook_worker", error = %e, "Failed to process message");
                        let _ = self.queue.close().await;
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Process one message: route, dispatch every match, persist, commit.
    ///
    /// Cancellation drops any in-flight dispatch and returns without
    /// committing, so the transport redelivers the message on restart.
    async fn process_message(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Result<(), WebhookError> {
        let event: EventMessage = match serde_json::from_slice(&message.payload) {
            Ok(ev) => ev,
            Err(e) => {
                // Undecodable messages are acknowledged: redelivering them
                // forever would wedge the partition behind them.
                let e = WebhookError::from(e);
                warn!(
                    target: "webhook_worker",
                    offset = message.offset,
                    error = %e,
                    "Dropping undecodable event message"
                );
                return self.queue.commit(message).await;
            }
        };

        let event_type = event.canonical_type();
        if event_type.is_empty() {
            let e = WebhookError::UnknownEventType(event.event_type);
            warn!(
                target: "webhook_worker",
                offset = message.offset,
                error = %e,
                "Dropping event with unrecognized type"
            );
            return self.queue.commit(message).await;
        }

        let configs = self.store.find_active_configs(&event_type).await?;
        if configs.is_empty() {
            debug!(
                target: "webhook_worker",
                event_type = %event_type,
                "No active subscription matches event type"
            );
            return self.queue.commit(message).await;
        }

        info!(
            target: "webhook_worker",
            event_type = %event_type,
            subscription_count = configs.len(),
            "Dispatching event to matching subscriptions"
        );

        for config in &configs {
            // Re-check the boundary invariant; a snapshot that fails it is
            // skipped rather than delivered to a bad endpoint.
            if let Err(e) = validation::validate_config(config, self.settings.allow_http) {
                warn!(
                    target: "webhook_worker",
                    config_id = %config.id,
                    error = %e,
                    "Skipping invalid subscription snapshot"
                );
                continue;
            }

            let webhook_id = Uuid::new_v4();
            let attempt = tokio::select! {
                () = cancel.cancelled() => {
                    debug!(
                        target: "webhook_worker",
                        offset = message.offset,
                        webhook_id = %webhook_id,
                        "Cancellation aborted in-flight dispatch, message left uncommitted"
                    );
                    return Ok(());
                }
                dispatched = self
                    .dispatcher
                    .attempt(DispatchRequest::first(webhook_id, config, &message.payload)) => {
                    dispatched?
                }
            };

            self.store.insert_attempt(&attempt).await?;

            info!(
                target: "webhook_worker",
                webhook_id = %webhook_id,
                config_id = %config.id,
                status = %attempt.status,
                status_code = attempt.status_code,
                "Attempt persisted"
            );
        }

        // Commit strictly after every match has a persisted attempt.
        self.queue.commit(message).await
    }
}
