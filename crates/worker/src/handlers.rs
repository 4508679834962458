//! Job handlers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use innkeep_core::ErrorKind;
use innkeep_core::jobs::{JobPayload, JobType};
use innkeep_core::night_audit::{AuditMode, NightAuditError, NightAuditRequest};
use innkeep_db::repositories::to_summary;
use innkeep_db::{DailySummaryRepository, HotelRepository, NightAuditEngine};

use crate::error::HandlerError;
use crate::report::{DailyReport, ReportSink};

/// Executes one job type.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type this handler runs.
    fn job_type(&self) -> JobType;

    /// Runs the job. `Err(Cancelled)` returns it to the queue untouched.
    async fn handle(
        &self,
        payload: &JobPayload,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError>;
}

fn wrong_payload(expected: JobType, payload: &JobPayload) -> HandlerError {
    HandlerError::failed(
        ErrorKind::Validation,
        format!("{expected} handler received a {} payload", payload.job_type()),
    )
}

/// Runs a live night audit.
///
/// Per-reservation failures are logged and left in the report; only an
/// error from the run itself fails the job.
pub struct NightAuditHandler {
    engine: NightAuditEngine,
}

impl NightAuditHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new(engine: NightAuditEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl JobHandler for NightAuditHandler {
    fn job_type(&self) -> JobType {
        JobType::NightAudit
    }

    async fn handle(
        &self,
        payload: &JobPayload,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let JobPayload::NightAudit(job) = payload else {
            return Err(wrong_payload(JobType::NightAudit, payload));
        };
        let request = NightAuditRequest {
            hotel_id: job.hotel_id,
            audit_date: job.audit_date,
            skip_report: job.skip_report,
            mode: AuditMode::Live,
            requested_by: job.user_id,
        };

        let report = self.engine.calculate_night_audit(&request, cancel).await?;
        if let Some(first) = report.failures.first() {
            warn!(
                hotel_id = %report.hotel_id,
                audit_date = %report.audit_date,
                failures = report.failures.len(),
                first_error = %first.error,
                "Night audit finished with isolated failures"
            );
        } else {
            info!(
                hotel_id = %report.hotel_id,
                audit_date = %report.audit_date,
                posted = report.room_charges_posted,
                "Night audit finished"
            );
        }
        Ok(())
    }
}

/// Assembles the daily report from the summary facts and hands it to a sink.
pub struct DailyReportHandler {
    hotels: HotelRepository,
    summaries: DailySummaryRepository,
    sink: Arc<dyn ReportSink>,
}

impl DailyReportHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(
        hotels: HotelRepository,
        summaries: DailySummaryRepository,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            hotels,
            summaries,
            sink,
        }
    }
}

#[async_trait]
impl JobHandler for DailyReportHandler {
    fn job_type(&self) -> JobType {
        JobType::DailyReport
    }

    async fn handle(
        &self,
        payload: &JobPayload,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let JobPayload::DailyReport(job) = payload else {
            return Err(wrong_payload(JobType::DailyReport, payload));
        };
        if cancel.is_cancelled() {
            return Err(HandlerError::Cancelled);
        }

        let row = self
            .summaries
            .find(job.hotel_id, job.audit_date)
            .await?
            .ok_or_else(|| {
                HandlerError::failed(
                    ErrorKind::NotFound,
                    format!("No daily summary for hotel {} on {}", job.hotel_id, job.audit_date),
                )
            })?;
        let hotel = self
            .hotels
            .find_hotel(job.hotel_id)
            .await
            .map_err(NightAuditError::from)?;

        let report = DailyReport {
            hotel_name: hotel.name,
            currency: hotel.currency,
            summary: to_summary(&row)?,
            generated_at: Utc::now(),
        };
        self.sink.deliver(&report).await?;
        info!(hotel_id = %job.hotel_id, audit_date = %job.audit_date, "Daily report delivered");
        Ok(())
    }
}
