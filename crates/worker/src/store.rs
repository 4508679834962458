//! Durable job storage seam.
//!
//! `JobRepository` is the production store. `MemoryJobStore` drives the same
//! `JobRecord` transitions over a vector and backs the orchestrator tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use innkeep_core::jobs::{FailureOutcome, JobError, JobPayload, JobRecord, RetryPolicy};
use innkeep_db::JobRepository;
use innkeep_shared::types::JobId;

/// Storage operations the orchestrator needs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Enqueues a pending job, claimable immediately.
    async fn enqueue(&self, payload: &JobPayload, max_attempts: i32)
    -> Result<JobRecord, JobError>;

    /// Loads a job.
    async fn get(&self, job_id: JobId) -> Result<JobRecord, JobError>;

    /// Claims the oldest due job, if any.
    async fn claim_next(
        &self,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<JobRecord>, JobError>;

    /// Claims one specific job.
    async fn claim_by_id(
        &self,
        job_id: JobId,
        worker_id: &str,
        lease: Duration,
    ) -> Result<JobRecord, JobError>;

    /// `processing → completed`.
    async fn complete(&self, job_id: JobId, worker_id: &str) -> Result<JobRecord, JobError>;

    /// `processing → failed`, counting one attempt.
    async fn fail(
        &self,
        job_id: JobId,
        worker_id: &str,
        error: &str,
        retryable: bool,
        policy: &RetryPolicy,
    ) -> Result<(JobRecord, FailureOutcome), JobError>;

    /// Extends the lease held by `worker_id` to `now + lease`.
    async fn renew_lease(
        &self,
        job_id: JobId,
        worker_id: &str,
        lease: Duration,
    ) -> Result<JobRecord, JobError>;

    /// `processing → pending` without counting an attempt.
    async fn release(&self, job_id: JobId, worker_id: &str) -> Result<JobRecord, JobError>;

    /// Returns expired leases to pending. Returns how many were released.
    async fn sweep_expired(&self) -> Result<u64, JobError>;
}

#[async_trait]
impl JobStore for JobRepository {
    async fn enqueue(
        &self,
        payload: &JobPayload,
        max_attempts: i32,
    ) -> Result<JobRecord, JobError> {
        JobRepository::enqueue(self, payload, max_attempts).await
    }

    async fn get(&self, job_id: JobId) -> Result<JobRecord, JobError> {
        JobRepository::get(self, job_id).await
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<JobRecord>, JobError> {
        JobRepository::claim_next(self, worker_id, lease).await
    }

    async fn claim_by_id(
        &self,
        job_id: JobId,
        worker_id: &str,
        lease: Duration,
    ) -> Result<JobRecord, JobError> {
        JobRepository::claim_by_id(self, job_id, worker_id, lease).await
    }

    async fn complete(&self, job_id: JobId, worker_id: &str) -> Result<JobRecord, JobError> {
        JobRepository::complete(self, job_id, worker_id).await
    }

    async fn fail(
        &self,
        job_id: JobId,
        worker_id: &str,
        error: &str,
        retryable: bool,
        policy: &RetryPolicy,
    ) -> Result<(JobRecord, FailureOutcome), JobError> {
        JobRepository::fail(self, job_id, worker_id, error, retryable, policy).await
    }

    async fn renew_lease(
        &self,
        job_id: JobId,
        worker_id: &str,
        lease: Duration,
    ) -> Result<JobRecord, JobError> {
        JobRepository::renew_lease(self, job_id, worker_id, lease).await
    }

    async fn release(&self, job_id: JobId, worker_id: &str) -> Result<JobRecord, JobError> {
        JobRepository::release(self, job_id, worker_id).await
    }

    async fn sweep_expired(&self) -> Result<u64, JobError> {
        JobRepository::sweep_expired(self).await
    }
}

/// In-process job store.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<JobRecord>>,
}

impl MemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every job, in enqueue order.
    pub async fn all(&self) -> Vec<JobRecord> {
        self.jobs.lock().await.clone()
    }

    async fn update<T>(
        &self,
        job_id: JobId,
        apply: impl FnOnce(&mut JobRecord) -> Result<T, JobError> + Send,
    ) -> Result<(JobRecord, T), JobError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or(JobError::NotFound(job_id))?;

        // Transitions run on a copy so a rejected one leaves the row untouched.
        let mut next = job.clone();
        let value = apply(&mut next)?;
        *job = next.clone();
        Ok((next, value))
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(
        &self,
        payload: &JobPayload,
        max_attempts: i32,
    ) -> Result<JobRecord, JobError> {
        let record = JobRecord::new(payload.job_type(), payload.encode()?, max_attempts, Utc::now());
        self.jobs.lock().await.push(record.clone());
        Ok(record)
    }

    async fn get(&self, job_id: JobId) -> Result<JobRecord, JobError> {
        self.jobs
            .lock()
            .await
            .iter()
            .find(|j| j.id == job_id)
            .cloned()
            .ok_or(JobError::NotFound(job_id))
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<JobRecord>, JobError> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs
            .iter_mut()
            .filter(|j| j.is_claimable(now))
            .min_by_key(|j| (j.available_at, j.created_at))
        else {
            return Ok(None);
        };
        job.claim(worker_id, lease, now)?;
        Ok(Some(job.clone()))
    }

    async fn claim_by_id(
        &self,
        job_id: JobId,
        worker_id: &str,
        lease: Duration,
    ) -> Result<JobRecord, JobError> {
        let now = Utc::now();
        self.update(job_id, |job| job.claim(worker_id, lease, now))
            .await
            .map(|(job, ())| job)
    }

    async fn complete(&self, job_id: JobId, worker_id: &str) -> Result<JobRecord, JobError> {
        let now = Utc::now();
        self.update(job_id, |job| job.complete(worker_id, now))
            .await
            .map(|(job, ())| job)
    }

    async fn fail(
        &self,
        job_id: JobId,
        worker_id: &str,
        error: &str,
        retryable: bool,
        policy: &RetryPolicy,
    ) -> Result<(JobRecord, FailureOutcome), JobError> {
        let now = Utc::now();
        self.update(job_id, |job| job.fail(worker_id, error, retryable, policy, now))
            .await
    }

    async fn renew_lease(
        &self,
        job_id: JobId,
        worker_id: &str,
        lease: Duration,
    ) -> Result<JobRecord, JobError> {
        let now = Utc::now();
        self.update(job_id, |job| job.renew_lease(worker_id, lease, now))
            .await
            .map(|(job, ())| job)
    }

    async fn release(&self, job_id: JobId, worker_id: &str) -> Result<JobRecord, JobError> {
        let now = Utc::now();
        self.update(job_id, |job| job.release(Some(worker_id), now))
            .await
            .map(|(job, ())| job)
    }

    async fn sweep_expired(&self) -> Result<u64, JobError> {
        let now = Utc::now();
        let mut released = 0;
        for job in self.jobs.lock().await.iter_mut() {
            if job.is_lease_expired(now) {
                job.release(None, now)?;
                released += 1;
            }
        }
        Ok(released)
    }
}
