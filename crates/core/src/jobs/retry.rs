//! Fixed-delay bounded retry policy.

use chrono::{DateTime, Duration, Utc};

/// Default attempts cap.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 10;

/// Default delay before a failed job is claimable again.
pub const DEFAULT_RETRY_DELAY_SECS: i64 = 5;

/// Fixed-delay retry policy. No backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Cap stamped on newly enqueued jobs.
    pub max_attempts: i32,
    /// Delay between a failure and the next claim.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::seconds(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy from configuration values.
    #[must_use]
    pub fn new(max_attempts: i32, delay_secs: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::seconds(i64::try_from(delay_secs).unwrap_or(i64::MAX / 1000)),
        }
    }

    /// When a job failing at `now` becomes claimable again.
    #[must_use]
    pub fn next_available_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.delay
    }
}

/// What happened to a job after a failure was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Another attempt is allowed at `available_at`.
    RetryScheduled {
        /// Attempts so far.
        attempts: i32,
        /// Earliest next claim.
        available_at: DateTime<Utc>,
    },
    /// The cap is reached; the job stays failed for manual inspection.
    Exhausted {
        /// Attempts so far.
        attempts: i32,
    },
}

impl FailureOutcome {
    /// Returns true if the job will not run again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}
