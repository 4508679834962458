//! Night audit error types.

use chrono::NaiveDate;
use innkeep_shared::types::{HotelId, ReservationRoomId};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::folio::LedgerError;

/// Errors that can occur during a night audit.
#[derive(Debug, Error)]
pub enum NightAuditError {
    // ========== Validation Errors ==========
    /// Live audit requested for a day that has not started yet.
    #[error("Audit date {audit_date} is after the working date {working_date}")]
    FutureDate {
        /// Requested date.
        audit_date: NaiveDate,
        /// Hotel working date.
        working_date: NaiveDate,
    },

    /// Live audit requested more than one day back.
    #[error("Audit date {audit_date} is earlier than the day before the working date {working_date}")]
    TooFarInPast {
        /// Requested date.
        audit_date: NaiveDate,
        /// Hotel working date.
        working_date: NaiveDate,
    },

    /// The live day was already audited.
    #[error("Audit date {audit_date} was already audited (last audit {last_audit_date})")]
    AlreadyAudited {
        /// Requested date.
        audit_date: NaiveDate,
        /// Hotel's last audited date.
        last_audit_date: NaiveDate,
    },

    /// Backfill requested for the open business day or later.
    #[error("Backfill date {audit_date} is not before the working date {working_date}")]
    BackfillOfOpenDay {
        /// Requested date.
        audit_date: NaiveDate,
        /// Hotel working date.
        working_date: NaiveDate,
    },

    /// Backfill range with `end < start`.
    #[error("Invalid date range: {start} to {end}")]
    InvalidDateRange {
        /// Range start.
        start: NaiveDate,
        /// Range end.
        end: NaiveDate,
    },

    /// A stay line has no folio to post to.
    #[error("Reservation room {0} has no folio")]
    NoFolio(ReservationRoomId),

    /// Stored enum text not recognized.
    #[error("Unknown {field} value: {value}")]
    UnknownValue {
        /// Column the value came from.
        field: &'static str,
        /// The rejected text.
        value: String,
    },

    // ========== Not Found Errors ==========
    /// Hotel not found.
    #[error("Hotel not found: {0}")]
    HotelNotFound(HotelId),

    // ========== Concurrency Errors ==========
    /// The working date changed between validation and advance.
    #[error("Working date moved: expected {expected}, found {actual}")]
    WorkingDateMoved {
        /// Date the audit validated against.
        expected: NaiveDate,
        /// Date found when advancing.
        actual: NaiveDate,
    },

    /// Run stopped by a cancellation signal.
    #[error("Night audit cancelled")]
    Cancelled,

    // ========== Collaborator Errors ==========
    /// Posting failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Pricing lookup failed.
    #[error("Pricing error: {0}")]
    Pricing(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl NightAuditError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FutureDate { .. } => "AUDIT_DATE_IN_FUTURE",
            Self::TooFarInPast { .. } => "AUDIT_DATE_TOO_FAR_IN_PAST",
            Self::AlreadyAudited { .. } => "AUDIT_DATE_ALREADY_AUDITED",
            Self::BackfillOfOpenDay { .. } => "BACKFILL_OF_OPEN_DAY",
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::NoFolio(_) => "NO_FOLIO",
            Self::UnknownValue { .. } => "UNKNOWN_VALUE",
            Self::HotelNotFound(_) => "HOTEL_NOT_FOUND",
            Self::WorkingDateMoved { .. } => "WORKING_DATE_MOVED",
            Self::Cancelled => "AUDIT_CANCELLED",
            Self::Ledger(e) => e.error_code(),
            Self::Pricing(_) => "PRICING_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::FutureDate { .. }
            | Self::TooFarInPast { .. }
            | Self::BackfillOfOpenDay { .. }
            | Self::InvalidDateRange { .. }
            | Self::NoFolio(_) => 400,
            Self::HotelNotFound(_) => 404,
            Self::AlreadyAudited { .. } | Self::WorkingDateMoved { .. } => 409,
            Self::Cancelled => 503,
            Self::Ledger(e) => e.http_status_code(),
            Self::Pricing(_) => 502,
            Self::UnknownValue { .. } | Self::Database(_) => 500,
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FutureDate { .. }
            | Self::TooFarInPast { .. }
            | Self::AlreadyAudited { .. }
            | Self::BackfillOfOpenDay { .. }
            | Self::InvalidDateRange { .. }
            | Self::NoFolio(_) => ErrorKind::Validation,
            Self::UnknownValue { .. } => ErrorKind::Configuration,
            Self::HotelNotFound(_) => ErrorKind::NotFound,
            Self::WorkingDateMoved { .. } => ErrorKind::Conflict,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Ledger(e) => e.kind(),
            Self::Pricing(_) | Self::Database(_) => ErrorKind::Transient,
        }
    }

    /// Returns true if retrying the same operation later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_not_retried() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let err = NightAuditError::AlreadyAudited {
            audit_date: d,
            last_audit_date: d,
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
        assert_eq!(err.http_status_code(), 409);
    }

    #[test]
    fn test_storage_errors_retried() {
        assert!(NightAuditError::Database("timeout".into()).is_retryable());
        assert!(NightAuditError::Ledger(LedgerError::ConcurrentModification).is_retryable());
        assert!(!NightAuditError::Cancelled.is_retryable());
    }
}
