//! Enqueues live night audits when a hotel's audit window opens.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use innkeep_core::jobs::{JobPayload, JobType, NightAuditPayload};
use innkeep_core::night_audit::NightAuditError;
use innkeep_db::{HotelRepository, JobRepository};
use innkeep_db::entities::hotels;
use innkeep_shared::AppError;
use innkeep_shared::types::HotelId;

/// Returns true once the hotel-local time has reached `start_time` on the
/// day after `working_date`.
#[must_use]
pub fn audit_due(
    timezone: Tz,
    working_date: NaiveDate,
    start_time: NaiveTime,
    now: DateTime<Utc>,
) -> bool {
    let Some(next_day) = working_date.succ_opt() else {
        return false;
    };
    now.with_timezone(&timezone).naive_local() >= next_day.and_time(start_time)
}

/// Periodic audit scheduler.
pub struct AuditScheduler {
    hotels: HotelRepository,
    jobs: JobRepository,
    max_attempts: i32,
    interval: Duration,
}

impl AuditScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub const fn new(
        hotels: HotelRepository,
        jobs: JobRepository,
        max_attempts: i32,
        interval: Duration,
    ) -> Self {
        Self {
            hotels,
            jobs,
            max_attempts,
            interval,
        }
    }

    /// Checks every hotel every `interval` until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Audit scheduler started");
        loop {
            match self.tick(Utc::now()).await {
                Ok(0) => {}
                Ok(enqueued) => info!(enqueued, "Night audits enqueued"),
                Err(e) => warn!(error = %e, "Audit scheduler tick failed"),
            }
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Audit scheduler stopped");
    }

    /// One pass over all hotels. Returns how many audits were enqueued.
    ///
    /// # Errors
    ///
    /// Returns an error if hotels cannot be listed. Per-hotel failures are
    /// logged and skipped.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let hotels = self
            .hotels
            .list_hotels()
            .await
            .map_err(NightAuditError::from)?;

        let mut enqueued = 0;
        for hotel in &hotels {
            match self.schedule_hotel(hotel, now).await {
                Ok(true) => enqueued += 1,
                Ok(false) => {}
                Err(e) => warn!(hotel_id = %hotel.id, error = %e, "Could not schedule night audit"),
            }
        }
        Ok(enqueued)
    }

    async fn schedule_hotel(&self, hotel: &hotels::Model, now: DateTime<Utc>) -> Result<bool, AppError> {
        let hotel_id = HotelId::from_uuid(hotel.id);
        let working_date = hotel.current_working_date;

        let timezone: Tz = hotel
            .timezone
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid timezone {}", hotel.timezone)))?;
        if !audit_due(timezone, working_date, hotel.night_audit_start_time, now) {
            return Ok(false);
        }
        if hotel.last_night_audit_date.is_some_and(|last| last >= working_date) {
            return Ok(false);
        }

        // Any existing job for the day blocks a new one. A terminally failed
        // audit waits for manual action instead of being re-enqueued.
        if let Some(existing) = self
            .jobs
            .find_latest(JobType::NightAudit, hotel_id, working_date)
            .await?
        {
            if existing.is_terminal() {
                warn!(
                    %hotel_id,
                    %working_date,
                    job_id = %existing.id,
                    status = %existing.status,
                    "Night audit job already terminal; not re-enqueuing"
                );
            } else {
                debug!(%hotel_id, %working_date, job_id = %existing.id, "Night audit already queued");
            }
            return Ok(false);
        }

        let payload = JobPayload::NightAudit(NightAuditPayload {
            audit_date: working_date,
            hotel_id,
            user_id: None,
            skip_report: false,
        });
        let job = self.jobs.enqueue(&payload, self.max_attempts).await?;
        info!(%hotel_id, %working_date, job_id = %job.id, "Night audit enqueued");
        Ok(true)
    }
}
