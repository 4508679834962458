//! Retry orchestrator.
//!
//! Claims a job, runs its handler and records the outcome:
//! - success → `completed`
//! - cancelled → back to `pending`, no attempt counted
//! - retryable failure → `failed`, claimable again after the retry delay
//! - anything else → `failed` at the attempts cap
//!
//! While a handler runs, the lease is renewed every third of its length so
//! the sweeper never hands a live job to another worker.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use innkeep_core::jobs::{FailureOutcome, JobError, JobPayload, JobRecord, JobType, RetryPolicy};
use innkeep_shared::types::JobId;

use crate::error::HandlerError;
use crate::handlers::JobHandler;
use crate::store::JobStore;

/// Dispatches jobs to their handlers under the bounded retry policy.
pub struct RetryOrchestrator {
    store: Arc<dyn JobStore>,
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
    policy: RetryPolicy,
    worker_id: String,
    lease: Duration,
}

impl RetryOrchestrator {
    /// Creates an orchestrator with no handlers.
    pub fn new(
        store: Arc<dyn JobStore>,
        policy: RetryPolicy,
        worker_id: impl Into<String>,
        lease: Duration,
    ) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            policy,
            worker_id: worker_id.into(),
            lease,
        }
    }

    /// Registers a handler for its job type, replacing any previous one.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(handler.job_type(), handler);
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Worker id stamped on claims.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Enqueues a job with the policy's attempts cap.
    pub async fn enqueue(&self, payload: &JobPayload) -> Result<JobRecord, JobError> {
        self.store.enqueue(payload, self.policy.max_attempts).await
    }

    /// Claims `job_id`, runs it and returns the updated row.
    ///
    /// # Errors
    ///
    /// Returns `NotClaimable` if the job is held, completed, not yet due or
    /// at its attempts cap; the handler is not invoked then.
    pub async fn dispatch(
        &self,
        job_id: JobId,
        cancel: &CancellationToken,
    ) -> Result<JobRecord, JobError> {
        let job = self
            .store
            .claim_by_id(job_id, &self.worker_id, self.lease)
            .await?;
        self.execute(job, cancel).await
    }

    /// Claims and runs the oldest due job. Returns `None` if nothing is due.
    pub async fn run_next(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<JobRecord>, JobError> {
        let Some(job) = self.store.claim_next(&self.worker_id, self.lease).await? else {
            return Ok(None);
        };
        self.execute(job, cancel).await.map(Some)
    }

    async fn execute(
        &self,
        job: JobRecord,
        cancel: &CancellationToken,
    ) -> Result<JobRecord, JobError> {
        let span = info_span!(
            "job",
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.attempts + 1,
            worker_id = %self.worker_id,
        );
        async {
            info!("Job started");
            match self.run_with_heartbeat(&job, cancel).await {
                Ok(()) => {
                    let done = self.store.complete(job.id, &self.worker_id).await?;
                    info!("Job completed");
                    Ok(done)
                }
                Err(HandlerError::Cancelled) => {
                    let released = self.store.release(job.id, &self.worker_id).await?;
                    info!("Job cancelled and returned to the queue");
                    Ok(released)
                }
                Err(e) => {
                    let (record, outcome) = self
                        .store
                        .fail(
                            job.id,
                            &self.worker_id,
                            &e.to_string(),
                            e.is_retryable(),
                            &self.policy,
                        )
                        .await?;
                    match outcome {
                        FailureOutcome::RetryScheduled {
                            attempts,
                            available_at,
                        } => warn!(
                            attempts,
                            %available_at,
                            kind = ?e.kind(),
                            error = %e,
                            "Job failed, retry scheduled"
                        ),
                        FailureOutcome::Exhausted { attempts } => error!(
                            attempts,
                            kind = ?e.kind(),
                            error = %e,
                            "Job failed permanently"
                        ),
                    }
                    Ok(record)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_with_heartbeat(
        &self,
        job: &JobRecord,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let period = (self.lease / 3)
            .to_std()
            .unwrap_or_default()
            .max(std::time::Duration::from_millis(10));
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let run = self.run_handler(job, cancel);
        tokio::pin!(run);
        loop {
            tokio::select! {
                result = &mut run => return result,
                _ = heartbeat.tick() => {
                    match self.store.renew_lease(job.id, &self.worker_id, self.lease).await {
                        Ok(renewed) => debug!(
                            lease_expires_at = ?renewed.lease_expires_at,
                            "Job lease renewed"
                        ),
                        Err(e) => warn!(error = %e, "Job lease renewal failed"),
                    }
                }
            }
        }
    }

    async fn run_handler(
        &self,
        job: &JobRecord,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let payload = JobPayload::decode(&job.job_type, &job.payload)?;
        let handler = self
            .handlers
            .get(&payload.job_type())
            .ok_or_else(|| JobError::UnknownJobType(job.job_type.clone()))?;
        handler.handle(&payload, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use innkeep_core::ErrorKind;
    use innkeep_core::jobs::{JobStatus, NightAuditPayload};
    use innkeep_shared::types::HotelId;
    use rstest::rstest;

    use crate::store::MemoryJobStore;

    /// Fails its first `failures` runs, then succeeds.
    struct Flaky {
        failures: u32,
        kind: ErrorKind,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, kind: ErrorKind) -> Arc<Self> {
            Arc::new(Self {
                failures,
                kind,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobHandler for Flaky {
        fn job_type(&self) -> JobType {
            JobType::NightAudit
        }

        async fn handle(
            &self,
            _payload: &JobPayload,
            cancel: &CancellationToken,
        ) -> Result<(), HandlerError> {
            if cancel.is_cancelled() {
                return Err(HandlerError::Cancelled);
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(HandlerError::failed(self.kind, format!("failure {call}")));
            }
            Ok(())
        }
    }

    /// Sleeps for a fixed time, then succeeds.
    struct Slow(std::time::Duration);

    #[async_trait]
    impl JobHandler for Slow {
        fn job_type(&self) -> JobType {
            JobType::NightAudit
        }

        async fn handle(
            &self,
            _payload: &JobPayload,
            _cancel: &CancellationToken,
        ) -> Result<(), HandlerError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    fn audit_payload() -> JobPayload {
        JobPayload::NightAudit(NightAuditPayload {
            audit_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            hotel_id: HotelId::new(),
            user_id: None,
            skip_report: true,
        })
    }

    fn orchestrator(store: Arc<MemoryJobStore>, handler: Arc<Flaky>) -> RetryOrchestrator {
        RetryOrchestrator::new(store, RetryPolicy::new(10, 0), "worker-test", Duration::minutes(5))
            .with_handler(handler)
    }

    /// Dispatches until the job is terminal or no longer claimable.
    async fn drive(orchestrator: &RetryOrchestrator, job_id: JobId) -> JobRecord {
        let cancel = CancellationToken::new();
        loop {
            match orchestrator.dispatch(job_id, &cancel).await {
                Ok(job) if job.is_terminal() => return job,
                Ok(_) => {}
                Err(JobError::NotClaimable { .. }) => {
                    return orchestrator.store().get(job_id).await.unwrap();
                }
                Err(e) => panic!("unexpected dispatch error: {e}"),
            }
        }
    }

    #[tokio::test]
    async fn test_nine_failures_then_success_completes() {
        let store = Arc::new(MemoryJobStore::new());
        let handler = Flaky::new(9, ErrorKind::Transient);
        let orchestrator = orchestrator(Arc::clone(&store), Arc::clone(&handler));
        let job = orchestrator.enqueue(&audit_payload()).await.unwrap();

        let done = drive(&orchestrator, job.id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.attempts, 9);
        assert_eq!(handler.calls(), 10);

        let again = orchestrator.dispatch(job.id, &CancellationToken::new()).await;
        assert!(matches!(again, Err(JobError::NotClaimable { .. })));
        assert_eq!(handler.calls(), 10);
    }

    #[tokio::test]
    async fn test_always_failing_job_is_never_run_an_eleventh_time() {
        let store = Arc::new(MemoryJobStore::new());
        let handler = Flaky::new(u32::MAX, ErrorKind::Transient);
        let orchestrator = orchestrator(Arc::clone(&store), Arc::clone(&handler));
        let job = orchestrator.enqueue(&audit_payload()).await.unwrap();

        let failed = drive(&orchestrator, job.id).await;
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.attempts, 10);
        assert_eq!(failed.last_error.as_deref(), Some("failure 10"));
        assert_eq!(handler.calls(), 10);

        let cancel = CancellationToken::new();
        assert!(orchestrator.dispatch(job.id, &cancel).await.is_err());
        assert!(orchestrator.run_next(&cancel).await.unwrap().is_none());
        assert_eq!(handler.calls(), 10);
    }

    #[rstest]
    #[case::configuration(ErrorKind::Configuration)]
    #[case::validation(ErrorKind::Validation)]
    #[case::not_found(ErrorKind::NotFound)]
    #[tokio::test]
    async fn test_non_retryable_failure_is_terminal_at_once(#[case] kind: ErrorKind) {
        let store = Arc::new(MemoryJobStore::new());
        let handler = Flaky::new(1, kind);
        let orchestrator = orchestrator(Arc::clone(&store), Arc::clone(&handler));
        let job = orchestrator.enqueue(&audit_payload()).await.unwrap();

        let failed = drive(&orchestrator, job.id).await;
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.attempts, failed.max_attempts);
        assert_eq!(handler.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_released_without_attempt() {
        let store = Arc::new(MemoryJobStore::new());
        let handler = Flaky::new(0, ErrorKind::Transient);
        let orchestrator = orchestrator(Arc::clone(&store), Arc::clone(&handler));
        let job = orchestrator.enqueue(&audit_payload()).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let released = orchestrator.dispatch(job.id, &cancel).await.unwrap();
        assert_eq!(released.status, JobStatus::Pending);
        assert_eq!(released.attempts, 0);
        assert!(released.locked_by.is_none());

        let done = orchestrator
            .dispatch(job.id, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_job_without_handler_fails_terminally() {
        let store = Arc::new(MemoryJobStore::new());
        let orchestrator = RetryOrchestrator::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            RetryPolicy::default(),
            "worker-test",
            Duration::minutes(5),
        );
        let job = orchestrator.enqueue(&audit_payload()).await.unwrap();

        let failed = orchestrator
            .dispatch(job.id, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.is_terminal());
        assert_eq!(failed.last_error.as_deref(), Some("Unknown job type: NIGHT_AUDIT"));
    }

    #[tokio::test]
    async fn test_lease_outlasting_handler_is_not_swept() {
        let store = Arc::new(MemoryJobStore::new());
        let orchestrator = RetryOrchestrator::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            RetryPolicy::new(10, 0),
            "worker-test",
            Duration::milliseconds(150),
        )
        .with_handler(Arc::new(Slow(std::time::Duration::from_millis(450))));
        let job = orchestrator.enqueue(&audit_payload()).await.unwrap();

        let sweeper = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut released = 0;
                for _ in 0..20 {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    released += store.sweep_expired().await.unwrap();
                }
                released
            })
        };

        let done = orchestrator
            .dispatch(job.id, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.attempts, 0);
        assert_eq!(sweeper.await.unwrap(), 0);
    }
}
