//! Handler failure classification.

use innkeep_core::ErrorKind;
use innkeep_core::jobs::JobError;
use innkeep_core::night_audit::NightAuditError;
use thiserror::Error;

/// Why a job handler did not finish.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Stopped by the shutdown token. The job goes back to pending without
    /// counting an attempt.
    #[error("Job cancelled")]
    Cancelled,

    /// The handler failed.
    #[error("{message}")]
    Failed {
        /// Classification; decides whether the job is retried.
        kind: ErrorKind,
        /// Recorded as the job's `last_error`.
        message: String,
    },
}

impl HandlerError {
    /// A failure of the given kind.
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Failed { kind, .. } => *kind,
        }
    }

    /// Returns true if the job should be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<NightAuditError> for HandlerError {
    fn from(err: NightAuditError) -> Self {
        match err {
            NightAuditError::Cancelled => Self::Cancelled,
            err => Self::failed(err.kind(), err.to_string()),
        }
    }
}

impl From<JobError> for HandlerError {
    fn from(err: JobError) -> Self {
        Self::failed(err.kind(), err.to_string())
    }
}
