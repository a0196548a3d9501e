//! Queue collaborator consumed by the worker.
//!
//! The engine drains messages one at a time and commits each only after all
//! matching attempts for it have been persisted, preserving at-least-once
//! delivery: a crash between dispatch and commit causes redelivery.

#[cfg(feature = "kafka")]
pub mod kafka;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WebhookError;

#[cfg(feature = "kafka")]
pub use kafka::KafkaQueue;

/// One inbound queue message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Source topic, when the transport has one.
    pub topic: String,
    /// Position within the source partition, used to commit.
    pub offset: i64,
    /// Source partition, when the transport has one.
    pub partition: i32,
    /// Raw event payload, forwarded verbatim to endpoints.
    pub payload: Vec<u8>,
}

/// Message transport consumed by the worker.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Block until the next message is available or the cancellation signal
    /// fires (reported as a transient [`WebhookError::Queue`]).
    async fn fetch_next(&self, cancel: &CancellationToken) -> Result<Message, WebhookError>;

    /// Acknowledge a message; the transport must not redeliver it afterwards.
    async fn commit(&self, message: &Message) -> Result<(), WebhookError>;

    /// Release transport resources.
    async fn close(&self) -> Result<(), WebhookError>;
}
