//! Audit date validation.

use chrono::{Days, NaiveDate};

use super::error::NightAuditError;
use super::types::{AuditMode, AuditPlan, HotelAuditState, NightAuditRequest};

/// Validates an audit request against the hotel's working date.
///
/// Live mode accepts the working date itself (the live day, which advances
/// the date) and the day before it (an idempotent re-run). Backfill accepts
/// any closed day and never advances.
///
/// # Errors
///
/// Returns a validation `NightAuditError` describing why the date is rejected.
pub fn plan_audit(
    hotel: &HotelAuditState,
    request: &NightAuditRequest,
) -> Result<AuditPlan, NightAuditError> {
    let cwd = hotel.current_working_date;
    let date = request.audit_date;

    let advance_to = match request.mode {
        AuditMode::Live => {
            if date > cwd {
                return Err(NightAuditError::FutureDate {
                    audit_date: date,
                    working_date: cwd,
                });
            }
            if date == cwd {
                if let Some(last) = hotel.last_night_audit_date
                    && last >= date
                {
                    return Err(NightAuditError::AlreadyAudited {
                        audit_date: date,
                        last_audit_date: last,
                    });
                }
                Some(next_day(date))
            } else if Some(date) == cwd.checked_sub_days(Days::new(1)) {
                None
            } else {
                return Err(NightAuditError::TooFarInPast {
                    audit_date: date,
                    working_date: cwd,
                });
            }
        }
        AuditMode::Backfill => {
            if date >= cwd {
                return Err(NightAuditError::BackfillOfOpenDay {
                    audit_date: date,
                    working_date: cwd,
                });
            }
            None
        }
    };

    Ok(AuditPlan {
        audit_date: date,
        mode: request.mode,
        expected_working_date: cwd,
        advance_to,
    })
}

/// Expands an inclusive backfill range into days.
///
/// # Errors
///
/// Returns `InvalidDateRange` if `end < start`.
pub fn backfill_dates(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, NightAuditError> {
    if end < start {
        return Err(NightAuditError::InvalidDateRange { start, end });
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}
