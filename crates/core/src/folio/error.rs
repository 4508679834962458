//! Ledger error types for posting, void and state errors.

use chrono::NaiveDate;
use innkeep_shared::types::{FolioId, FolioTransactionId, HotelId, ReservationRoomId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{FolioStatus, TransactionCategory, TransactionStatus, TransactionType};
use crate::error::ErrorKind;
use crate::tax::TaxError;

/// Errors that can occur during folio ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Amount rounds to zero.
    #[error("Transaction amount cannot be zero")]
    ZeroAmount,

    /// Charge categories require a positive amount.
    #[error("Amount for category {0} must be positive")]
    NegativeCharge(TransactionCategory),

    /// Transaction type disagrees with the category or the amount sign.
    #[error("Transaction type {transaction_type} does not match category {category}")]
    TransactionTypeMismatch {
        /// Posting category.
        category: TransactionCategory,
        /// Type given by the caller.
        transaction_type: TransactionType,
    },

    /// Discount or service charge on a category that cannot carry one.
    #[error("Category {0} does not accept discounts or service charges")]
    ModifierNotAllowed(TransactionCategory),

    /// Discount or service charge rate or amount out of range.
    #[error("Invalid {0}: rates must be within 0-100 and amounts non-negative")]
    InvalidModifier(&'static str),

    /// Void without a reason.
    #[error("Void reason is required")]
    VoidReasonRequired,

    /// Stored enum text not recognized.
    #[error("Unknown {field} value: {value}")]
    UnknownValue {
        /// Column the value came from.
        field: &'static str,
        /// The rejected text.
        value: String,
    },

    // ========== Not Found Errors ==========
    /// Folio not found.
    #[error("Folio not found: {0}")]
    FolioNotFound(FolioId),

    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(FolioTransactionId),

    /// Hotel not found.
    #[error("Hotel not found: {0}")]
    HotelNotFound(HotelId),

    // ========== State Errors ==========
    /// Folio status does not accept postings.
    #[error("Folio {folio_id} is {status} and does not accept postings")]
    FolioNotPostable {
        /// The folio.
        folio_id: FolioId,
        /// Its current status.
        status: FolioStatus,
    },

    /// Transaction is already voided.
    #[error("Transaction {0} is already voided")]
    AlreadyVoided(FolioTransactionId),

    /// Balancing entries cannot be voided.
    #[error("Transaction {0} is a balancing entry and cannot be voided")]
    CannotVoidBalancingEntry(FolioTransactionId),

    /// Only posted transactions can be voided.
    #[error("Transaction {transaction_id} is {status} and cannot be voided")]
    CannotVoidStatus {
        /// The transaction.
        transaction_id: FolioTransactionId,
        /// Its current status.
        status: TransactionStatus,
    },

    /// Transaction belongs to a different folio than the one locked.
    #[error("Transaction {transaction_id} does not belong to folio {folio_id}")]
    FolioMismatch {
        /// The transaction.
        transaction_id: FolioTransactionId,
        /// The folio that was locked.
        folio_id: FolioId,
    },

    /// A room charge for this reservation room and business date exists.
    #[error("Room charge for reservation room {reservation_room_id} on {working_date} is already posted")]
    AlreadyPosted {
        /// The reservation room.
        reservation_room_id: ReservationRoomId,
        /// The business date.
        working_date: NaiveDate,
    },

    /// Folio cannot be voided with an outstanding balance.
    #[error("Folio {folio_id} has balance {balance} and cannot be voided")]
    FolioHasBalance {
        /// The folio.
        folio_id: FolioId,
        /// Its balance.
        balance: Decimal,
    },

    // ========== Configuration Errors ==========
    /// The hotel's tax configuration is invalid.
    #[error(transparent)]
    Tax(#[from] TaxError),

    // ========== Concurrency Errors ==========
    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    // ========== Database Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::NegativeCharge(_) => "NEGATIVE_CHARGE",
            Self::TransactionTypeMismatch { .. } => "TRANSACTION_TYPE_MISMATCH",
            Self::ModifierNotAllowed(_) => "MODIFIER_NOT_ALLOWED",
            Self::InvalidModifier(_) => "INVALID_MODIFIER",
            Self::VoidReasonRequired => "VOID_REASON_REQUIRED",
            Self::UnknownValue { .. } => "UNKNOWN_VALUE",
            Self::FolioNotFound(_) => "FOLIO_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::HotelNotFound(_) => "HOTEL_NOT_FOUND",
            Self::FolioNotPostable { .. } => "FOLIO_NOT_POSTABLE",
            Self::AlreadyVoided(_) => "ALREADY_VOIDED",
            Self::CannotVoidBalancingEntry(_) => "CANNOT_VOID_BALANCING_ENTRY",
            Self::CannotVoidStatus { .. } => "CANNOT_VOID_STATUS",
            Self::FolioMismatch { .. } => "FOLIO_MISMATCH",
            Self::AlreadyPosted { .. } => "ALREADY_POSTED",
            Self::FolioHasBalance { .. } => "FOLIO_HAS_BALANCE",
            Self::Tax(e) => e.error_code(),
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::ZeroAmount
            | Self::NegativeCharge(_)
            | Self::TransactionTypeMismatch { .. }
            | Self::ModifierNotAllowed(_)
            | Self::InvalidModifier(_)
            | Self::VoidReasonRequired => 400,

            // 404 Not Found
            Self::FolioNotFound(_) | Self::TransactionNotFound(_) | Self::HotelNotFound(_) => 404,

            // 409 Conflict - state and concurrency
            Self::FolioNotPostable { .. }
            | Self::AlreadyVoided(_)
            | Self::CannotVoidBalancingEntry(_)
            | Self::CannotVoidStatus { .. }
            | Self::AlreadyPosted { .. }
            | Self::FolioHasBalance { .. }
            | Self::ConcurrentModification => 409,

            // 422 Unprocessable - configuration
            Self::Tax(e) => e.http_status_code(),

            // 500 Internal Server Error
            Self::UnknownValue { .. }
            | Self::FolioMismatch { .. }
            | Self::Database(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount
            | Self::NegativeCharge(_)
            | Self::TransactionTypeMismatch { .. }
            | Self::ModifierNotAllowed(_)
            | Self::InvalidModifier(_)
            | Self::VoidReasonRequired
            | Self::FolioNotPostable { .. }
            | Self::AlreadyVoided(_)
            | Self::CannotVoidBalancingEntry(_)
            | Self::CannotVoidStatus { .. }
            | Self::FolioMismatch { .. }
            | Self::AlreadyPosted { .. }
            | Self::FolioHasBalance { .. } => ErrorKind::Validation,
            Self::UnknownValue { .. } => ErrorKind::Configuration,
            Self::FolioNotFound(_) | Self::TransactionNotFound(_) | Self::HotelNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Tax(e) => e.kind(),
            Self::ConcurrentModification => ErrorKind::Conflict,
            Self::Database(_) | Self::Internal(_) => ErrorKind::Transient,
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
    fn test_tax_errors_keep_their_code() {
        let err = LedgerError::from(TaxError::SelfDependency(innkeep_shared::types::TaxRateId::new()));
        assert_eq!(err.error_code(), "SELF_TAX_DEPENDENCY");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.http_status_code(), 422);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_database_errors_are_retryable() {
        let err = LedgerError::Database("connection reset".into());
        assert!(err.is_retryable());
        assert_eq!(err.http_status_code(), 500);
    }

    #[test]
    fn test_state_errors_conflict() {
        let err = LedgerError::FolioNotPostable {
            folio_id: FolioId::new(),
            status: FolioStatus::Voided,
        };
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("voided"));
    }
}
