//! Shared data types: subscription snapshots, delivery attempts, inbound events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::security;

/// A registered webhook target, read by the engine as an immutable snapshot.
///
/// Mutated only by the external CRUD layer. Every dispatched [`Attempt`]
/// embeds the snapshot it was built from, so later subscription edits never
/// affect an in-flight retry chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub id: Uuid,
    pub endpoint: String,
    pub secret: String,
    #[serde(rename = "eventTypes")]
    pub event_types: Vec<String>,
    pub active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Config {
    /// Create an active subscription snapshot, generating a secret if none
    /// is supplied.
    pub fn new(
        endpoint: impl Into<String>,
        secret: Option<String>,
        event_types: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            secret: secret.unwrap_or_else(security::new_secret),
            event_types,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this subscription listens for the given canonical event type.
    #[must_use]
    pub fn matches(&self, event_type: &str) -> bool {
        self.active && self.event_types.iter().any(|t| t == event_type)
    }
}

/// Classified outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    ToRetry,
    Failed,
}

impl AttemptStatus {
    /// Stable string form, used by storage backends.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::ToRetry => "to_retry",
            AttemptStatus::Failed => "failed",
        }
    }

    /// A chain ends at the first Success or Failed attempt.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Success | AttemptStatus::Failed)
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delivery try and its outcome.
///
/// Attempts for the same webhook id form an append-only chain: a retry never
/// mutates a prior record, it inserts a new one with
/// `retry_attempt = previous + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    /// Chain identifier shared by all attempts for one subscription/payload pair.
    #[serde(rename = "webhookID")]
    pub webhook_id: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Subscription snapshot at dispatch time, never re-read afterwards.
    pub config: Config,
    pub payload: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// 0-based ordinal within the chain.
    #[serde(rename = "retryAttempt")]
    pub retry_attempt: u32,
    pub status: AttemptStatus,
    /// Set only when `status` is [`AttemptStatus::ToRetry`].
    #[serde(rename = "nextRetryAfter", skip_serializing_if = "Option::is_none")]
    pub next_retry_after: Option<DateTime<Utc>>,
}

/// An inbound platform notification. Transient: only resulting attempts are
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub date: DateTime<Utc>,
    /// Emitting application, joined into the canonical type when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Opaque structured data, forwarded verbatim to endpoints.
    pub payload: serde_json::Value,
}

impl EventMessage {
    /// Derive the canonical dotted event type, e.g. `ledger.committed_transactions`.
    ///
    /// Lowercases the type and prepends the emitting app when one is set.
    /// Any further normalization happens here, before routing.
    #[must_use]
    pub fn canonical_type(&self) -> String {
        let ty = self.event_type.to_lowercase();
        match self.app.as_deref() {
            Some(app) if !app.is_empty() => format!("{}.{ty}", app.to_lowercase()),
            _ => ty,
        }
    }
}
