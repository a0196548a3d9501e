//! Storage collaborator consumed by the engine.
//!
//! The engine never implements cross-operation transactions itself; each
//! trait method must be individually atomic in the backing store. Filters
//! are typed so relational and document backends implement the same
//! contract without ad hoc key/value maps.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::WebhookError;
use crate::models::{Attempt, AttemptStatus, Config};

pub use memory::MemoryStore;

/// Typed query filter over attempt chains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptFilter {
    pub webhook_id: Option<Uuid>,
    pub status: Option<AttemptStatus>,
    /// Only attempts with `next_retry_after <= due_before`.
    pub due_before: Option<DateTime<Utc>>,
}

impl AttemptFilter {
    /// Filter for chains due for retry at `now`.
    #[must_use]
    pub fn due_for_retry(now: DateTime<Utc>) -> Self {
        Self {
            webhook_id: None,
            status: Some(AttemptStatus::ToRetry),
            due_before: Some(now),
        }
    }

    /// Whether the attempt satisfies every set field.
    #[must_use]
    pub fn matches(&self, attempt: &Attempt) -> bool {
        if let Some(id) = self.webhook_id {
            if attempt.webhook_id != id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if attempt.status != status {
                return false;
            }
        }
        if let Some(due) = self.due_before {
            match attempt.next_retry_after {
                Some(after) if after <= due => {}
                _ => return false,
            }
        }
        true
    }
}

/// Persistence operations required by the worker and the retry scheduler.
#[async_trait]
pub trait Store: Send + Sync {
    /// Active subscription snapshots listening for the given canonical type.
    async fn find_active_configs(&self, event_type: &str) -> Result<Vec<Config>, WebhookError>;

    /// Append one attempt to its chain. Never updates in place.
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), WebhookError>;

    /// Distinct chain identifiers with an attempt matching the filter.
    async fn find_webhook_ids_to_retry(
        &self,
        filter: AttemptFilter,
    ) -> Result<Vec<Uuid>, WebhookError>;

    /// Most recent attempt of a chain, by ordinal then creation time.
    async fn find_latest_attempt(&self, webhook_id: Uuid)
        -> Result<Option<Attempt>, WebhookError>;

    /// First attempt of a chain; its creation time is the chain start used
    /// by the abort deadline.
    async fn find_first_attempt(&self, webhook_id: Uuid)
        -> Result<Option<Attempt>, WebhookError>;

    /// Record the chain's current status on its bookkeeping row(s).
    /// Returns the number of records modified.
    async fn update_chain_status(
        &self,
        webhook_id: Uuid,
        status: AttemptStatus,
    ) -> Result<u64, WebhookError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use chrono::TimeDelta;

    fn attempt(status: AttemptStatus, next_retry_after: Option<DateTime<Utc>>) -> Attempt {
        let config = Config::new("https://example.com/hook", None, vec!["foo".to_string()]);
        Attempt {
            id: Uuid::new_v4(),
            webhook_id: Uuid::new_v4(),
            created_at: Utc::now(),
            config,
            payload: "{}".to_string(),
            status_code: 500,
            retry_attempt: 0,
            status,
            next_retry_after,
        }
    }

    #[test]
    fn test_filter_due_for_retry_matches_due_attempts() {
        let now = Utc::now();
        let filter = AttemptFilter::due_for_retry(now);

        let due = attempt(AttemptStatus::ToRetry, Some(now - TimeDelta::seconds(1)));
        assert!(filter.matches(&due));

        let not_yet = attempt(AttemptStatus::ToRetry, Some(now + TimeDelta::seconds(10)));
        assert!(!filter.matches(&not_yet));

        let terminal = attempt(AttemptStatus::Failed, None);
        assert!(!filter.matches(&terminal));
    }

    #[test]
    fn test_filter_by_webhook_id() {
        let due = attempt(AttemptStatus::ToRetry, Some(Utc::now()));
        let mut filter = AttemptFilter::default();
        filter.webhook_id = Some(due.webhook_id);
        assert!(filter.matches(&due));

        filter.webhook_id = Some(Uuid::new_v4());
        assert!(!filter.matches(&due));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = AttemptFilter::default();
        assert!(filter.matches(&attempt(AttemptStatus::Success, None)));
        assert!(filter.matches(&attempt(AttemptStatus::ToRetry, Some(Utc::now()))));
    }
}
