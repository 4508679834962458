//! Wiring shared by the worker process and the audit CLI.

use std::sync::Arc;

use chrono::Duration;
use sea_orm::DatabaseConnection;

use innkeep_core::jobs::RetryPolicy;
use innkeep_db::{
    BookedRatePricing, DailySummaryRepository, HotelRepository, JobRepository, NightAuditEngine,
    TaxRateRepository,
};
use innkeep_shared::AppConfig;

use crate::handlers::{DailyReportHandler, NightAuditHandler};
use crate::orchestrator::RetryOrchestrator;
use crate::pool::{LeaseSweeper, WorkerPool};
use crate::report::ReportSink;
use crate::scheduler::AuditScheduler;
use crate::store::JobStore;

/// Repositories, engine and orchestrator built from one configuration.
#[derive(Clone)]
pub struct WorkerContext {
    /// Hotels.
    pub hotels: HotelRepository,
    /// Durable jobs.
    pub jobs: JobRepository,
    /// Night audit engine.
    pub engine: NightAuditEngine,
    /// Orchestrator with both handlers registered.
    pub orchestrator: Arc<RetryOrchestrator>,
    config: AppConfig,
}

impl WorkerContext {
    /// Builds the context over a connected pool.
    pub fn new(db: &DatabaseConnection, config: &AppConfig, sink: Arc<dyn ReportSink>) -> Self {
        let taxes = TaxRateRepository::with_cache_ttl(db.clone(), config.audit.tax_cache_ttl_secs);
        let pricing = BookedRatePricing::new(db.clone(), taxes.clone());
        let policy = RetryPolicy::new(config.worker.max_attempts, config.worker.retry_delay_secs);
        let engine = NightAuditEngine::new(db.clone(), taxes, Arc::new(pricing))
            .with_report_max_attempts(policy.max_attempts);
        let hotels = HotelRepository::new(db.clone());
        let jobs = JobRepository::new(db.clone());

        let orchestrator = RetryOrchestrator::new(
            Arc::new(jobs.clone()),
            policy,
            config.worker.id.clone(),
            lease(config.worker.lease_secs),
        )
        .with_handler(Arc::new(NightAuditHandler::new(engine.clone())))
        .with_handler(Arc::new(DailyReportHandler::new(
            hotels.clone(),
            DailySummaryRepository::new(db.clone()),
            sink,
        )));

        Self {
            hotels,
            jobs,
            engine,
            orchestrator: Arc::new(orchestrator),
            config: config.clone(),
        }
    }

    /// The worker pool sized from configuration.
    pub fn pool(&self) -> WorkerPool {
        WorkerPool::new(
            Arc::clone(&self.orchestrator),
            self.config.worker.concurrency,
            std::time::Duration::from_millis(self.config.worker.poll_interval_ms),
        )
    }

    /// The expired-lease sweeper.
    pub fn sweeper(&self) -> LeaseSweeper {
        LeaseSweeper::new(
            Arc::new(self.jobs.clone()) as Arc<dyn JobStore>,
            std::time::Duration::from_secs(self.config.worker.sweep_interval_secs),
        )
    }

    /// The audit scheduler, or `None` if disabled.
    pub fn scheduler(&self) -> Option<AuditScheduler> {
        self.config.audit.scheduler_enabled.then(|| {
            AuditScheduler::new(
                self.hotels.clone(),
                self.jobs.clone(),
                self.config.worker.max_attempts,
                std::time::Duration::from_secs(self.config.audit.scheduler_interval_secs),
            )
        })
    }
}

fn lease(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
}
