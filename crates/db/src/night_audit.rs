//! Night audit engine.
//!
//! One run audits one hotel and date:
//! 1. Validate the date against the hotel's working date
//! 2. Post room (and separate meal plan) charges for every covered stay,
//!    skipping nights that already carry a room charge
//! 3. Mark no-shows and post their fees
//! 4. Flag due-outs
//! 5. Replay every folio touched by steps 2-4
//! 6. Upsert the daily summary facts
//! 7. Advance the working date (live day only)
//! 8. Enqueue the daily report unless suppressed or already requested
//!
//! The run is not one transaction. Each reservation room is its own atomic
//! unit, and its failure is recorded in the report without stopping the run.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use innkeep_core::jobs::{DailyReportPayload, JobPayload, JobType, RetryPolicy};
use innkeep_core::night_audit::{
    AuditMode, AuditStep, DailySummaryBuilder, HotelAuditState, NightAuditError, NightAuditReport,
    NightAuditRequest, NoShowFeePolicy, PostingFailure, StayLine, backfill_dates, plan_audit,
};
use innkeep_shared::types::{FolioId, HotelId, ReservationId};

use crate::pricing::StayPricing;
use crate::repositories::{
    DailySummaryRepository, FolioRepository, HotelRepository, JobRepository,
    ReservationRepository, RoomNightOutcome, TaxRateRepository,
};

/// One day of a backfill.
#[derive(Debug)]
pub struct BackfillDay {
    /// Audited date.
    pub date: NaiveDate,
    /// Report, or the error that stopped the day.
    pub result: Result<NightAuditReport, NightAuditError>,
}

/// Night audit engine.
#[derive(Clone)]
pub struct NightAuditEngine {
    hotels: HotelRepository,
    reservations: ReservationRepository,
    folios: FolioRepository,
    summaries: DailySummaryRepository,
    jobs: JobRepository,
    pricing: Arc<dyn StayPricing>,
    report_max_attempts: i32,
}

impl NightAuditEngine {
    /// Creates an engine over one connection pool.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        taxes: TaxRateRepository,
        pricing: Arc<dyn StayPricing>,
    ) -> Self {
        let folios = FolioRepository::new(db.clone(), taxes);
        Self {
            hotels: HotelRepository::new(db.clone()),
            reservations: ReservationRepository::new(db.clone(), folios.clone()),
            folios,
            summaries: DailySummaryRepository::new(db.clone()),
            jobs: JobRepository::new(db),
            pricing,
            report_max_attempts: RetryPolicy::default().max_attempts,
        }
    }

    /// Sets the attempts cap of enqueued report jobs.
    #[must_use]
    pub const fn with_report_max_attempts(mut self, max_attempts: i32) -> Self {
        self.report_max_attempts = max_attempts;
        self
    }

    /// Runs the audit for one hotel and date.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a rejected date, `Cancelled` if the
    /// token fired mid-run, and `Database`/`WorkingDateMoved` for systemic
    /// failures. Per-reservation failures are in the report instead.
    pub async fn calculate_night_audit(
        &self,
        request: &NightAuditRequest,
        cancel: &CancellationToken,
    ) -> Result<NightAuditReport, NightAuditError> {
        let span = info_span!(
            "night_audit",
            hotel_id = %request.hotel_id,
            audit_date = %request.audit_date,
            mode = %request.mode,
        );
        self.run(request, cancel).instrument(span).await
    }

    /// Audits every day in `[start, end]` in backfill mode, reporting
    /// suppressed. A failed day does not stop the next; cancellation does.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange` if `end < start`.
    pub async fn backfill(
        &self,
        hotel_id: HotelId,
        start: NaiveDate,
        end: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Vec<BackfillDay>, NightAuditError> {
        let dates = backfill_dates(start, end)?;
        let mut days = Vec::with_capacity(dates.len());

        for date in dates {
            let result = self
                .calculate_night_audit(&NightAuditRequest::backfill(hotel_id, date), cancel)
                .await;
            let cancelled = matches!(result, Err(NightAuditError::Cancelled));
            if let Err(e) = &result {
                warn!(%hotel_id, %date, error = %e, "Backfill day failed");
            }
            days.push(BackfillDay { date, result });
            if cancelled {
                break;
            }
        }
        Ok(days)
    }

    async fn run(
        &self,
        request: &NightAuditRequest,
        cancel: &CancellationToken,
    ) -> Result<NightAuditReport, NightAuditError> {
        let hotel_id = request.hotel_id;
        let date = request.audit_date;

        // 1. validate
        let hotel = self.hotels.find_hotel(hotel_id).await?;
        let state = HotelAuditState {
            hotel_id,
            current_working_date: hotel.current_working_date,
            last_night_audit_date: hotel.last_night_audit_date,
        };
        let plan = plan_audit(&state, request)?;
        let fee_policy: NoShowFeePolicy = hotel.no_show_fee_policy.parse()?;
        let mut report = NightAuditReport::new(hotel_id, &plan);
        let mut touched = BTreeSet::new();
        info!(working_date = %state.current_working_date, "Night audit started");

        // 2. room charges
        let lines = self.reservations.stay_lines(hotel_id, date).await?;
        let covered: Vec<&StayLine> = lines.iter().filter(|l| l.covers(date)).collect();
        for line in &covered {
            ensure_running(cancel)?;
            self.post_room_night(line, request, &mut report, &mut touched)
                .await;
        }

        // 3. no-shows
        let candidates = self.reservations.no_show_candidates(hotel_id, date).await?;
        for candidate in candidates.iter().filter(|c| c.is_no_show(date)) {
            ensure_running(cancel)?;
            self.mark_no_show(candidate.reservation_id, fee_policy, request, &mut report, &mut touched)
                .await;
        }

        // 4. due-outs
        let due_out: Vec<&StayLine> = lines.iter().filter(|l| l.is_due_out(date)).collect();
        for line in &due_out {
            ensure_running(cancel)?;
            match self.reservations.flag_due_out(line.reservation_room_id).await {
                Ok(true) => report.due_outs_flagged += 1,
                Ok(false) => {}
                Err(e) => record(&mut report, AuditStep::DueOut, Some(*line), None, e),
            }
        }

        // 5. replay touched folios
        for folio_id in &touched {
            ensure_running(cancel)?;
            match self.folios.recalculate_folio_totals(*folio_id).await {
                Ok(_) => report.folios_recalculated += 1,
                Err(e) => {
                    warn!(%folio_id, error = %e, "Folio recalculation failed");
                    report.record_failure(PostingFailure {
                        step: AuditStep::Recalculate,
                        reservation_id: None,
                        reservation_room_id: None,
                        folio_id: Some(*folio_id),
                        error: e.to_string(),
                    });
                }
            }
        }
        ensure_running(cancel)?;

        // 6. daily summary
        let entries = self.summaries.summary_entries(hotel_id, date).await?;
        let balances = self.summaries.ledger_balances(hotel_id).await?;
        let no_shows = self.reservations.count_no_shows(hotel_id, date).await?;
        let summary = DailySummaryBuilder::new(hotel_id, date, plan.mode)
            .with_entries(&entries)
            .with_balances(balances)
            .with_counts(count(covered.len()), count(no_shows), count(due_out.len()))
            .build();
        self.summaries.upsert(&summary).await?;

        // 7. advance
        if let Some(next) = plan.advance_to {
            self.hotels
                .advance_working_date(hotel_id, plan.expected_working_date, next, date)
                .await?;
            report.working_date_advanced_to = Some(next);
        }

        // 8. report
        if !request.skip_report && plan.mode == AuditMode::Live {
            let payload = JobPayload::DailyReport(DailyReportPayload {
                hotel_id,
                audit_date: date,
            });
            // One report per date, whatever became of an earlier one.
            let existing = self
                .jobs
                .find_latest(JobType::DailyReport, hotel_id, date)
                .await
                .map_err(|e| NightAuditError::Database(e.to_string()))?;
            if existing.is_none() {
                self.jobs
                    .enqueue(&payload, self.report_max_attempts)
                    .await
                    .map_err(|e| NightAuditError::Database(e.to_string()))?;
            }
            report.report_enqueued = true;
        }

        info!(
            room_charges_posted = report.room_charges_posted,
            room_charges_skipped = report.room_charges_skipped,
            no_shows_marked = report.no_shows_marked,
            due_outs_flagged = report.due_outs_flagged,
            folios_recalculated = report.folios_recalculated,
            failures = report.failures.len(),
            "Night audit finished"
        );
        Ok(report)
    }

    async fn post_room_night(
        &self,
        line: &StayLine,
        request: &NightAuditRequest,
        report: &mut NightAuditReport,
        touched: &mut BTreeSet<FolioId>,
    ) {
        let date = request.audit_date;
        let quote = match self
            .pricing
            .calculate_stay_price(&line.one_night_request(date))
            .await
        {
            Ok(quote) => quote,
            Err(e) => return record(report, AuditStep::RoomCharge, Some(line), None, e),
        };
        let postings = match line.nightly_postings(date, quote.base_amount, request.requested_by) {
            Ok(postings) => postings,
            Err(e) => return record(report, AuditStep::RoomCharge, Some(line), None, e),
        };

        match self
            .folios
            .post_room_night(line.hotel_id, line.reservation_room_id, date, &postings)
            .await
        {
            Ok(RoomNightOutcome::Posted(_)) => {
                report.room_charges_posted += 1;
                touched.extend(line.folio_id);
            }
            Ok(RoomNightOutcome::AlreadyPosted) => report.room_charges_skipped += 1,
            Err(e) => record(report, AuditStep::RoomCharge, Some(line), None, e),
        }
    }

    async fn mark_no_show(
        &self,
        reservation_id: ReservationId,
        fee_policy: NoShowFeePolicy,
        request: &NightAuditRequest,
        report: &mut NightAuditReport,
        touched: &mut BTreeSet<FolioId>,
    ) {
        let mut fees = Vec::new();
        if fee_policy == NoShowFeePolicy::FirstNight {
            let rooms = match self.reservations.rooms_of(reservation_id).await {
                Ok(rooms) => rooms,
                Err(e) => {
                    return record(report, AuditStep::NoShow, None, Some(reservation_id), e);
                }
            };
            for room in rooms.iter().filter(|r| r.folio_id.is_some()) {
                let first_night = room.one_night_request(room.arrival_date);
                let fee = match self.pricing.calculate_stay_price(&first_night).await {
                    Ok(quote) => {
                        room.no_show_fee(request.audit_date, quote.base_amount, request.requested_by)
                    }
                    Err(e) => {
                        return record(report, AuditStep::NoShow, Some(room), None, e);
                    }
                };
                match fee {
                    Ok(fee) => fees.push(fee),
                    Err(e) => return record(report, AuditStep::NoShow, Some(room), None, e),
                }
            }
        }

        match self
            .reservations
            .mark_no_show(request.hotel_id, reservation_id, request.audit_date, &fees)
            .await {
            Ok(Some(_)) => {
                report.no_shows_marked += 1;
                touched.extend(fees.iter().map(|f| f.folio_id));
            }
            Ok(None) => {}
            Err(e) => record(report, AuditStep::NoShow, None, Some(reservation_id), e),
        }
    }
}

fn ensure_running(cancel: &CancellationToken) -> Result<(), NightAuditError> {
    if cancel.is_cancelled() {
        warn!("Night audit cancelled");
        return Err(NightAuditError::Cancelled);
    }
    Ok(())
}

fn record(
    report: &mut NightAuditReport,
    step: AuditStep,
    line: Option<&StayLine>,
    reservation_id: Option<ReservationId>,
    error: impl Display,
) {
    let failure = PostingFailure {
        step,
        reservation_id: line.map(|l| l.reservation_id).or(reservation_id),
        reservation_room_id: line.map(|l| l.reservation_room_id),
        folio_id: line.and_then(|l| l.folio_id),
        error: error.to_string(),
    };
    warn!(
        ?step,
        reservation_id = ?failure.reservation_id,
        reservation_room_id = ?failure.reservation_room_id,
        error = %failure.error,
        "Night audit step failed for one reservation"
    );
    report.record_failure(failure);
}

fn count(n: impl TryInto<i32>) -> i32 {
    n.try_into().unwrap_or(i32::MAX)
}
