//! End-to-end dispatch through the durable queue.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use innkeep_core::jobs::{JobPayload, JobStatus, JobType, NightAuditPayload, RetryPolicy};
use innkeep_db::{DailySummaryRepository, FolioRepository, HotelRepository, JobRepository, TaxRateRepository};
use innkeep_worker::{
    AuditScheduler, DailyReport, DailyReportHandler, HandlerError, JobStore, NightAuditHandler,
    ReportSink, RetryOrchestrator,
};

use common::{connect, d, engine, hotel, in_house_stay, stay_without_folio};

#[derive(Default)]
struct Collecting(Mutex<Vec<DailyReport>>);

#[async_trait]
impl ReportSink for Collecting {
    async fn deliver(&self, report: &DailyReport) -> Result<(), HandlerError> {
        self.0.lock().await.push(report.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_dispatched_audit_posts_and_reports() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 6, 3)).await;
    let folio_id = in_house_stay(&db, hotel_id, d(2024, 6, 2), d(2024, 6, 5), dec!(120)).await;

    let jobs = JobRepository::new(db.clone());
    let sink = Arc::new(Collecting::default());
    let orchestrator = RetryOrchestrator::new(
        Arc::new(jobs.clone()) as Arc<dyn JobStore>,
        RetryPolicy::default(),
        format!("dispatch-test-{hotel_id}"),
        Duration::minutes(5),
    )
    .with_handler(Arc::new(NightAuditHandler::new(engine(&db))))
    .with_handler(Arc::new(DailyReportHandler::new(
        HotelRepository::new(db.clone()),
        DailySummaryRepository::new(db.clone()),
        Arc::clone(&sink) as Arc<dyn ReportSink>,
    )));
    let cancel = CancellationToken::new();

    let job = orchestrator
        .enqueue(&JobPayload::NightAudit(NightAuditPayload {
            audit_date: d(2024, 6, 3),
            hotel_id,
            user_id: None,
            skip_report: false,
        }))
        .await
        .unwrap();
    let done = orchestrator.dispatch(job.id, &cancel).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed, "{:?}", done.last_error);
    assert_eq!(done.attempts, 0);

    let folio = FolioRepository::new(db.clone(), TaxRateRepository::new(db.clone()))
        .find_folio(folio_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(folio.balance, dec!(120));

    let report_job = jobs
        .find_active(JobType::DailyReport, hotel_id, d(2024, 6, 3))
        .await
        .unwrap()
        .expect("daily report queued");
    let delivered = orchestrator.dispatch(report_job.id, &cancel).await.unwrap();
    assert_eq!(delivered.status, JobStatus::Completed);

    let reports = sink.0.lock().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].currency, "EUR");
    assert_eq!(reports[0].summary.room_revenue, dec!(120));
    assert_eq!(reports[0].summary.rooms_occupied, 1);
}

#[tokio::test]
async fn test_audit_with_isolated_failure_completes() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 6, 3)).await;
    let folio_id = in_house_stay(&db, hotel_id, d(2024, 6, 2), d(2024, 6, 5), dec!(120)).await;
    stay_without_folio(&db, hotel_id, d(2024, 6, 2), d(2024, 6, 5), dec!(90)).await;

    let orchestrator = RetryOrchestrator::new(
        Arc::new(JobRepository::new(db.clone())) as Arc<dyn JobStore>,
        RetryPolicy::default(),
        format!("dispatch-test-{hotel_id}"),
        Duration::minutes(5),
    )
    .with_handler(Arc::new(NightAuditHandler::new(engine(&db))));

    let job = orchestrator
        .enqueue(&JobPayload::NightAudit(NightAuditPayload {
            audit_date: d(2024, 6, 3),
            hotel_id,
            user_id: None,
            skip_report: true,
        }))
        .await
        .unwrap();
    let done = orchestrator
        .dispatch(job.id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed, "{:?}", done.last_error);
    assert_eq!(done.attempts, 0);

    let folio = FolioRepository::new(db.clone(), TaxRateRepository::new(db.clone()))
        .find_folio(folio_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(folio.balance, dec!(120));
    let hotel = HotelRepository::new(db.clone()).find_hotel(hotel_id).await.unwrap();
    assert_eq!(hotel.current_working_date, d(2024, 6, 4));
}

#[tokio::test]
async fn test_rejected_audit_date_fails_without_retry() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 6, 3)).await;
    let orchestrator = RetryOrchestrator::new(
        Arc::new(JobRepository::new(db.clone())) as Arc<dyn JobStore>,
        RetryPolicy::default(),
        format!("dispatch-test-{hotel_id}"),
        Duration::minutes(5),
    )
    .with_handler(Arc::new(NightAuditHandler::new(engine(&db))));

    let job = orchestrator
        .enqueue(&JobPayload::NightAudit(NightAuditPayload {
            audit_date: d(2024, 6, 9),
            hotel_id,
            user_id: None,
            skip_report: true,
        }))
        .await
        .unwrap();
    let failed = orchestrator
        .dispatch(job.id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.is_terminal());
    assert!(failed.last_error.unwrap().contains("after the working date"));
}

#[tokio::test]
async fn test_scheduler_enqueues_once_per_working_date() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 6, 3)).await;
    let jobs = JobRepository::new(db.clone());
    let scheduler = AuditScheduler::new(
        HotelRepository::new(db.clone()),
        jobs.clone(),
        10,
        std::time::Duration::from_secs(60),
    );

    // Lisbon is UTC+1 in June; the window opens 2024-06-04 03:00 local.
    let before = Utc.with_ymd_and_hms(2024, 6, 4, 1, 59, 0).unwrap();
    let after = Utc.with_ymd_and_hms(2024, 6, 4, 2, 0, 0).unwrap();

    scheduler.tick(before).await.unwrap();
    assert!(jobs
        .find_latest(JobType::NightAudit, hotel_id, d(2024, 6, 3))
        .await
        .unwrap()
        .is_none());

    scheduler.tick(after).await.unwrap();
    scheduler.tick(after).await.unwrap();
    let queued = jobs
        .find_active(JobType::NightAudit, hotel_id, d(2024, 6, 3))
        .await
        .unwrap()
        .expect("night audit queued");
    assert_eq!(queued.status, JobStatus::Pending);
    assert_eq!(queued.max_attempts, 10);
}
