//! Job queue error types.

use innkeep_shared::types::JobId;
use thiserror::Error;

use super::types::{JobStatus, JobType};
use crate::error::ErrorKind;

/// Errors raised by job state transitions and payload decoding.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Claim predicate did not match.
    #[error("Job {job_id} is not claimable (status {status}, attempts {attempts}/{max_attempts})")]
    NotClaimable {
        /// The job.
        job_id: JobId,
        /// Its status.
        status: JobStatus,
        /// Attempts so far.
        attempts: i32,
        /// Cap.
        max_attempts: i32,
    },

    /// Completion or failure by a worker that does not hold the lease.
    #[error("Job {job_id} is not held by worker {worker_id}")]
    NotLockedBy {
        /// The job.
        job_id: JobId,
        /// The worker that tried.
        worker_id: String,
    },

    /// Stored type has no handler.
    #[error("Unknown job type: {0}")]
    UnknownJobType(String),

    /// Payload does not match its type.
    #[error("Invalid {job_type} payload: {message}")]
    InvalidPayload {
        /// Job type.
        job_type: JobType,
        /// Decoder message.
        message: String,
    },

    /// Stored enum text not recognized.
    #[error("Unknown {field} value: {value}")]
    UnknownValue {
        /// Column the value came from.
        field: &'static str,
        /// The rejected text.
        value: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl JobError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "JOB_NOT_FOUND",
            Self::NotClaimable { .. } => "JOB_NOT_CLAIMABLE",
            Self::NotLockedBy { .. } => "JOB_NOT_LOCKED_BY_WORKER",
            Self::UnknownJobType(_) => "UNKNOWN_JOB_TYPE",
            Self::InvalidPayload { .. } => "INVALID_JOB_PAYLOAD",
            Self::UnknownValue { .. } => "UNKNOWN_VALUE",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::NotClaimable { .. } | Self::NotLockedBy { .. } => 409,
            Self::UnknownJobType(_) | Self::InvalidPayload { .. } => 400,
            Self::UnknownValue { .. } | Self::Database(_) => 500,
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotClaimable { .. } | Self::NotLockedBy { .. } => ErrorKind::Conflict,
            Self::UnknownJobType(_) | Self::InvalidPayload { .. } => ErrorKind::Validation,
            Self::UnknownValue { .. } => ErrorKind::Configuration,
            Self::Database(_) => ErrorKind::Transient,
        }
    }

    /// Returns true if retrying the same operation later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
