//! Property-based tests for the job state machine.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use serde_json::json;

use crate::jobs::retry::RetryPolicy;
use crate::jobs::state::JobRecord;
use crate::jobs::types::{JobStatus, JobType};

/// One worker step: succeed, fail (retryable or not), or get cancelled.
#[derive(Debug, Clone, Copy)]
enum Step {
    Succeed,
    Fail { retryable: bool },
    Cancel,
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => Just(Step::Succeed),
        6 => any::<bool>().prop_map(|retryable| Step::Fail { retryable }),
        1 => Just(Step::Cancel),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Attempts never decrease, never exceed the cap, and a terminal job is
    /// never claimed again.
    #[test]
    fn prop_attempts_monotonic_and_capped(
        max_attempts in 1i32..=10,
        steps in prop::collection::vec(arb_step(), 1..40),
    ) {
        let policy = RetryPolicy::default();
        let mut now = Utc::now();
        let mut job = JobRecord::new(JobType::NightAudit, json!({}), max_attempts, now);
        let mut last_attempts = 0;

        for step in steps {
            now += policy.delay;
            let was_terminal = job.is_terminal();
            let claimed = job.claim("w", Duration::minutes(5), now).is_ok();
            prop_assert!(!(was_terminal && claimed));
            if !claimed {
                continue;
            }
            match step {
                Step::Succeed => job.complete("w", now).unwrap(),
                Step::Fail { retryable } => {
                    job.fail("w", "err", retryable, &policy, now).unwrap();
                }
                Step::Cancel => job.release(Some("w"), now).unwrap(),
            }
            prop_assert!(job.attempts >= last_attempts);
            prop_assert!(job.attempts <= max_attempts);
            last_attempts = job.attempts;
            prop_assert_ne!(job.status, JobStatus::Processing);
        }
    }
}
