//! Cross-module error classification.

use innkeep_shared::AppError;
use serde::{Deserialize, Serialize};

use crate::folio::LedgerError;
use crate::jobs::JobError;
use crate::night_audit::NightAuditError;
use crate::tax::TaxError;

/// Broad class of a domain error.
///
/// The job orchestrator retries only `Transient` and `Conflict` failures;
/// everything else leaves the job terminally failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid configuration, e.g. a circular tax dependency.
    Configuration,
    /// Invalid input, e.g. an audit date outside the allowed window.
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// Optimistic check or claim lost to a concurrent writer.
    Conflict,
    /// Storage or network failure.
    Transient,
    /// Work stopped by a cancellation signal.
    Cancelled,
}

impl ErrorKind {
    /// Returns true if the failed operation may succeed when retried.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::Conflict)
    }

    /// Wraps `message` in the `AppError` variant of this kind.
    #[must_use]
    pub fn into_app_error(self, message: String) -> AppError {
        match self {
            Self::Configuration => AppError::Configuration(message),
            Self::Validation => AppError::Validation(message),
            Self::NotFound => AppError::NotFound(message),
            Self::Conflict => AppError::Conflict(message),
            Self::Transient => AppError::Database(message),
            Self::Cancelled => AppError::Internal(message),
        }
    }
}

macro_rules! into_app_error {
    ($($error:ty),+ $(,)?) => {
        $(
            impl From<$error> for AppError {
                fn from(err: $error) -> Self {
                    err.kind().into_app_error(err.to_string())
                }
            }
        )+
    };
}

into_app_error!(TaxError, LedgerError, NightAuditError, JobError);
