//! Signed webhook delivery engine.
//!
//! Delivers platform events to registered HTTPS endpoints with HMAC-SHA256
//! request signing, at-least-once semantics, and automatic retry under a
//! backoff policy until an abort deadline. Attempts form append-only chains;
//! two long-running tasks drive delivery: the event-consuming [`Worker`] and
//! the periodic [`RetryScheduler`].
//!
//! Persistence and message transport are collaborators behind the
//! [`storage::Store`] and [`queue::Queue`] traits; subscription CRUD lives
//! outside this crate and only hands in immutable [`models::Config`]
//! snapshots.

pub mod backoff;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod models;
pub mod queue;
pub mod router;
pub mod scheduler;
pub mod security;
pub mod shutdown;
pub mod storage;
pub mod validation;
pub mod worker;

pub use backoff::BackoffPolicy;
pub use config::{KafkaConfig, WorkerSettings};
pub use dispatcher::{DispatchRequest, Dispatcher};
pub use error::WebhookError;
pub use models::{Attempt, AttemptStatus, Config, EventMessage};
pub use scheduler::RetryScheduler;
pub use shutdown::StopHandle;
pub use worker::Worker;
