//! Durable job queue state machine.
//!
//! `pending → processing → {completed | failed}`, with `failed → processing`
//! allowed while `attempts < max_attempts`. Storage (`innkeep-db`) and the
//! in-memory test store (`innkeep-worker`) both drive transitions through
//! [`JobRecord`] so the rules live in one place.

pub mod error;
pub mod retry;
pub mod state;
pub mod types;

#[cfg(test)]
mod state_props;

pub use error::JobError;
pub use retry::{FailureOutcome, RetryPolicy};
pub use state::JobRecord;
pub use types::{DailyReportPayload, JobPayload, JobStatus, JobType, NightAuditPayload};
