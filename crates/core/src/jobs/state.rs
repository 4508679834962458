//! Job record and its transitions.

use chrono::{DateTime, Duration, Utc};
use innkeep_shared::types::JobId;
use serde::{Deserialize, Serialize};

use super::error::JobError;
use super::retry::{FailureOutcome, RetryPolicy};
use super::types::{JobStatus, JobType};

/// A durable job row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job ID.
    pub id: JobId,
    /// Stored job type; may be unknown to this build.
    pub job_type: String,
    /// JSON payload.
    pub payload: serde_json::Value,
    /// Status.
    pub status: JobStatus,
    /// Failed attempts so far. Monotonic.
    pub attempts: i32,
    /// Attempts cap.
    pub max_attempts: i32,
    /// Error of the most recent failure.
    pub last_error: Option<String>,
    /// Earliest time the job may be claimed.
    pub available_at: DateTime<Utc>,
    /// Worker holding the lease.
    pub locked_by: Option<String>,
    /// When the lease expires.
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// When the job completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// Last transition.
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A new pending job, claimable immediately.
    #[must_use]
    pub fn new(
        job_type: JobType,
        payload: serde_json::Value,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            job_type: job_type.as_str().to_string(),
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            last_error: None,
            available_at: now,
            locked_by: None,
            lease_expires_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The claim predicate: pending or failed, under the cap, and due.
    #[must_use]
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Failed)
            && self.attempts < self.max_attempts
            && self.available_at <= now
    }

    /// Returns true if the job will never run again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self.status {
            JobStatus::Completed => true,
            JobStatus::Failed => self.attempts >= self.max_attempts,
            JobStatus::Pending | JobStatus::Processing => false,
        }
    }

    /// Returns true if the job is processing and its lease has run out.
    #[must_use]
    pub fn is_lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Processing && self.lease_expires_at.is_some_and(|at| at <= now)
    }

    /// `pending | failed → processing`.
    ///
    /// # Errors
    ///
    /// Returns `NotClaimable` if the claim predicate does not match.
    pub fn claim(
        &mut self,
        worker_id: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), JobError> {
        if !self.is_claimable(now) {
            return Err(self.not_claimable());
        }
        self.status = JobStatus::Processing;
        self.locked_by = Some(worker_id.to_string());
        self.lease_expires_at = Some(now + lease);
        self.updated_at = now;
        Ok(())
    }

    /// Pushes the lease of a running job out to `now + lease`.
    ///
    /// # Errors
    ///
    /// Returns `NotLockedBy` unless `worker_id` holds the lease.
    pub fn renew_lease(
        &mut self,
        worker_id: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), JobError> {
        self.ensure_held_by(worker_id)?;
        self.lease_expires_at = Some(now + lease);
        self.updated_at = now;
        Ok(())
    }

    /// `processing → completed`.
    ///
    /// # Errors
    ///
    /// Returns `NotLockedBy` unless `worker_id` holds the lease.
    pub fn complete(&mut self, worker_id: &str, now: DateTime<Utc>) -> Result<(), JobError> {
        self.ensure_held_by(worker_id)?;
        self.status = JobStatus::Completed;
        self.locked_by = None;
        self.lease_expires_at = None;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `processing → failed`, counting one attempt.
    ///
    /// A non-retryable failure raises `attempts` straight to the cap so the
    /// claim predicate never matches again.
    ///
    /// # Errors
    ///
    /// Returns `NotLockedBy` unless `worker_id` holds the lease.
    pub fn fail(
        &mut self,
        worker_id: &str,
        error: &str,
        retryable: bool,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, JobError> {
        self.ensure_held_by(worker_id)?;
        self.attempts = if retryable {
            self.attempts + 1
        } else {
            self.max_attempts.max(self.attempts + 1)
        };
        self.status = JobStatus::Failed;
        self.last_error = Some(error.to_string());
        self.locked_by = None;
        self.lease_expires_at = None;
        self.updated_at = now;

        if self.attempts < self.max_attempts {
            self.available_at = policy.next_available_at(now);
            Ok(FailureOutcome::RetryScheduled {
                attempts: self.attempts,
                available_at: self.available_at,
            })
        } else {
            Ok(FailureOutcome::Exhausted {
                attempts: self.attempts,
            })
        }
    }

    /// `processing → pending` without counting an attempt.
    ///
    /// Used for cancelled runs and by the lease sweeper. `worker_id = None`
    /// releases regardless of holder (sweeper).
    ///
    /// # Errors
    ///
    /// Returns `NotLockedBy` if the job is not processing, or is held by
    /// another worker.
    pub fn release(&mut self, worker_id: Option<&str>, now: DateTime<Utc>) -> Result<(), JobError> {
        match worker_id {
            Some(worker_id) => self.ensure_held_by(worker_id)?,
            None if self.status != JobStatus::Processing => {
                return Err(JobError::NotLockedBy {
                    job_id: self.id,
                    worker_id: String::new(),
                });
            }
            None => {}
        }
        self.status = JobStatus::Pending;
        self.locked_by = None;
        self.lease_expires_at = None;
        self.available_at = now;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_held_by(&self, worker_id: &str) -> Result<(), JobError> {
        if self.status == JobStatus::Processing && self.locked_by.as_deref() == Some(worker_id) {
            Ok(())
        } else {
            Err(JobError::NotLockedBy {
                job_id: self.id,
                worker_id: worker_id.to_string(),
            })
        }
    }

    fn not_claimable(&self) -> JobError {
        JobError::NotClaimable {
            job_id: self.id,
            status: self.status,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
        }
    }
}
