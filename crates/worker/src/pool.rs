//! Worker pool and expired-lease sweeper.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::orchestrator::RetryOrchestrator;
use crate::store::JobStore;

/// A fixed number of tasks sharing one queue.
pub struct WorkerPool {
    orchestrator: Arc<RetryOrchestrator>,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    /// Creates a pool. `concurrency` is raised to at least one task.
    pub fn new(
        orchestrator: Arc<RetryOrchestrator>,
        concurrency: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            concurrency: concurrency.max(1),
            poll_interval,
        }
    }

    /// Runs until `shutdown` fires and every task has finished its current job.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut tasks = JoinSet::new();
        for slot in 0..self.concurrency {
            tasks.spawn(worker_loop(
                slot,
                Arc::clone(&self.orchestrator),
                self.poll_interval,
                shutdown.clone(),
            ));
        }
        info!(
            concurrency = self.concurrency,
            worker_id = %self.orchestrator.worker_id(),
            "Worker pool started"
        );

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Worker task panicked");
            }
        }
        info!("Worker pool stopped");
    }
}

async fn worker_loop(
    slot: usize,
    orchestrator: Arc<RetryOrchestrator>,
    poll_interval: Duration,
    shutdown: CancellationToken,
) {
    debug!(slot, "Worker task started");
    while !shutdown.is_cancelled() {
        match orchestrator.run_next(&shutdown).await {
            // Drain the queue before sleeping.
            Ok(Some(_)) => continue,
            Ok(None) => {}
            Err(e) => warn!(slot, error = %e, "Job dispatch failed"),
        }

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(poll_interval) => {}
        }
    }
    debug!(slot, "Worker task stopped");
}

/// Returns `processing` jobs whose lease expired to `pending`.
pub struct LeaseSweeper {
    store: Arc<dyn JobStore>,
    interval: Duration,
}

impl LeaseSweeper {
    /// Creates a sweeper.
    pub fn new(store: Arc<dyn JobStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Sweeps every `interval` until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Lease sweeper started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
            match self.store.sweep_expired().await {
                Ok(0) => {}
                Ok(released) => info!(released, "Expired leases returned to the queue"),
                Err(e) => warn!(error = %e, "Lease sweep failed"),
            }
        }
        info!("Lease sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use innkeep_core::jobs::{
        DailyReportPayload, JobPayload, JobStatus, JobType, RetryPolicy,
    };
    use innkeep_shared::types::HotelId;

    use crate::error::HandlerError;
    use crate::handlers::JobHandler;
    use crate::store::MemoryJobStore;

    struct Counting(AtomicU32);

    #[async_trait]
    impl JobHandler for Counting {
        fn job_type(&self) -> JobType {
            JobType::DailyReport
        }

        async fn handle(
            &self,
            _payload: &JobPayload,
            _cancel: &CancellationToken,
        ) -> Result<(), HandlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn report_payload(day: u32) -> JobPayload {
        JobPayload::DailyReport(DailyReportPayload {
            hotel_id: HotelId::new(),
            audit_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        })
    }

    #[tokio::test]
    async fn test_pool_drains_queue_once_per_job() {
        let store = Arc::new(MemoryJobStore::new());
        let handler = Arc::new(Counting(AtomicU32::new(0)));
        let orchestrator = Arc::new(
            RetryOrchestrator::new(
                Arc::clone(&store) as Arc<dyn JobStore>,
                RetryPolicy::default(),
                "pool-test",
                chrono::Duration::minutes(5),
            )
            .with_handler(Arc::clone(&handler) as Arc<dyn JobHandler>),
        );
        for day in 1..=6 {
            orchestrator.enqueue(&report_payload(day)).await.unwrap();
        }

        let shutdown = CancellationToken::new();
        let pool = WorkerPool::new(orchestrator, 3, Duration::from_millis(10));
        let run = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { pool.run(shutdown).await })
        };

        for _ in 0..200 {
            let jobs = store.all().await;
            if jobs.iter().all(|j| j.status == JobStatus::Completed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.cancel();
        run.await.unwrap();

        assert!(store.all().await.iter().all(|j| j.status == JobStatus::Completed));
        assert_eq!(handler.0.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let store = Arc::new(MemoryJobStore::new());
        let job = store.enqueue(&report_payload(1), 10).await.unwrap();
        store
            .claim_by_id(job.id, "gone", chrono::Duration::seconds(-1))
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let sweeper = LeaseSweeper::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Duration::from_millis(5),
        );
        let run = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { sweeper.run(shutdown).await })
        };

        for _ in 0..200 {
            if store.get(job.id).await.unwrap().status == JobStatus::Pending {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.cancel();
        run.await.unwrap();
        assert_eq!(store.get(job.id).await.unwrap().status, JobStatus::Pending);
    }
}
