//! Retry backoff policies.
//!
//! A policy maps the attempt number within a chain (and the time elapsed
//! since the chain started) to the next retry delay, or reports exhaustion.
//! Policies are immutable configuration shared by all chains.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default fixed schedule: 1min, 5min, 30min, 5hr, 24hr.
pub const DEFAULT_SCHEDULE_SECS: [u64; 5] = [60, 300, 1800, 18_000, 86_400];

/// Default exponential parameters.
pub const DEFAULT_MIN_DELAY_SECS: u64 = 60;
pub const DEFAULT_MAX_DELAY_SECS: u64 = 3600;
pub const DEFAULT_ABORT_AFTER_SECS: u64 = 30 * 24 * 3600;

/// Rule computing retry delay and the exhaustion condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Fixed ordered list of delays indexed by attempt number; terminal
    /// after the last entry.
    Schedule(Vec<Duration>),

    /// `delay(n) = min(min_delay * 2^n, max_delay)`, with an absolute abort
    /// deadline measured from the first attempt of the chain.
    Exponential {
        min_delay: Duration,
        max_delay: Duration,
        abort_after: Duration,
    },
}

impl BackoffPolicy {
    /// Exponential policy with the given bounds.
    #[must_use]
    pub fn exponential(min_delay: Duration, max_delay: Duration, abort_after: Duration) -> Self {
        BackoffPolicy::Exponential {
            min_delay,
            max_delay,
            abort_after,
        }
    }

    /// Fixed-schedule policy.
    #[must_use]
    pub fn schedule(delays: Vec<Duration>) -> Self {
        BackoffPolicy::Schedule(delays)
    }

    /// Delay before retry number `attempt_number + 1`, or `None` once the
    /// policy is exhausted.
    ///
    /// `attempt_number` is the 0-based ordinal of the attempt that just
    /// failed; `chain_started_at` is the creation time of the chain's first
    /// attempt.
    #[must_use]
    pub fn next_delay(
        &self,
        attempt_number: u32,
        chain_started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        match self {
            BackoffPolicy::Schedule(delays) => delays.get(attempt_number as usize).copied(),
            BackoffPolicy::Exponential {
                min_delay,
                max_delay,
                abort_after,
            } => {
                let elapsed = (now - chain_started_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                if elapsed > *abort_after {
                    return None;
                }
                let delay = min_delay
                    .checked_mul(1u32.checked_shl(attempt_number).unwrap_or(u32::MAX))
                    .unwrap_or(*max_delay);
                Some(delay.min(*max_delay))
            }
        }
    }
}

impl Default for BackoffPolicy {
    /// Exponential with the original service defaults: 1min..1hr, abort
    /// after 30 days.
    fn default() -> Self {
        BackoffPolicy::exponential(
            Duration::from_secs(DEFAULT_MIN_DELAY_SECS),
            Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            Duration::from_secs(DEFAULT_ABORT_AFTER_SECS),
        )
    }
}

/// The legacy fixed schedule used before the exponential policy.
#[must_use]
pub fn default_schedule() -> Vec<Duration> {
    DEFAULT_SCHEDULE_SECS
        .iter()
        .map(|s| Duration::from_secs(*s))
        .collect()
}
