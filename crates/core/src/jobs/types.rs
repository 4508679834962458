//! Job types, statuses and payloads.

use chrono::NaiveDate;
use innkeep_shared::types::{HotelId, UserId};
use serde::{Deserialize, Serialize};

use super::error::JobError;

/// Job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Handler succeeded.
    Completed,
    /// Handler failed; retried while attempts remain.
    Failed,
}

string_enum!(
    JobStatus,
    JobError,
    |value| JobError::UnknownValue { field: "job.status", value };
    {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
);

/// Known job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Night audit for one hotel and date.
    #[serde(rename = "NIGHT_AUDIT")]
    NightAudit,
    /// Daily report delivery for one hotel and date.
    #[serde(rename = "DAILY_REPORT")]
    DailyReport,
}

string_enum!(
    JobType,
    JobError,
    |value| JobError::UnknownJobType(value);
    {
        NightAudit => "NIGHT_AUDIT",
        DailyReport => "DAILY_REPORT",
    }
);

/// `NIGHT_AUDIT` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NightAuditPayload {
    /// Business date to audit.
    pub audit_date: NaiveDate,
    /// Hotel.
    pub hotel_id: HotelId,
    /// Requesting user.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Suppresses the daily report.
    #[serde(default)]
    pub skip_report: bool,
}

/// `DAILY_REPORT` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportPayload {
    /// Hotel.
    pub hotel_id: HotelId,
    /// Audited date.
    pub audit_date: NaiveDate,
}

/// A decoded job payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    /// `NIGHT_AUDIT`.
    NightAudit(NightAuditPayload),
    /// `DAILY_REPORT`.
    DailyReport(DailyReportPayload),
}

impl JobPayload {
    /// Decodes a stored `(job_type, payload)` pair.
    ///
    /// # Errors
    ///
    /// Returns `UnknownJobType` or `InvalidPayload`; neither is retryable.
    pub fn decode(job_type: &str, payload: &serde_json::Value) -> Result<Self, JobError> {
        let job_type: JobType = job_type.parse()?;
        let invalid = |e: serde_json::Error| JobError::InvalidPayload {
            job_type,
            message: e.to_string(),
        };
        match job_type {
            JobType::NightAudit => serde_json::from_value(payload.clone())
                .map(Self::NightAudit)
                .map_err(invalid),
            JobType::DailyReport => serde_json::from_value(payload.clone())
                .map(Self::DailyReport)
                .map_err(invalid),
        }
    }

    /// The job type of this payload.
    #[must_use]
    pub const fn job_type(&self) -> JobType {
        match self {
            Self::NightAudit(_) => JobType::NightAudit,
            Self::DailyReport(_) => JobType::DailyReport,
        }
    }

    /// Encodes the payload as stored JSON.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if serialization fails.
    pub fn encode(&self) -> Result<serde_json::Value, JobError> {
        let value = match self {
            Self::NightAudit(p) => serde_json::to_value(p),
            Self::DailyReport(p) => serde_json::to_value(p),
        };
        value.map_err(|e| JobError::InvalidPayload {
            job_type: self.job_type(),
            message: e.to_string(),
        })
    }
}
