//! Daily report assembly and delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use innkeep_core::night_audit::DailySummary;

use crate::error::HandlerError;

/// The report sent after a live night audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    /// Hotel display name.
    pub hotel_name: String,
    /// Hotel currency.
    pub currency: String,
    /// Summary facts for the audited date.
    pub summary: DailySummary,
    /// When the report was assembled.
    pub generated_at: DateTime<Utc>,
}

impl DailyReport {
    /// Total net revenue of the day.
    #[must_use]
    pub fn total_revenue(&self) -> Decimal {
        self.summary.total_revenue()
    }

    /// One-line subject for delivery channels.
    #[must_use]
    pub fn subject(&self) -> String {
        format!(
            "{} daily report for {}",
            self.hotel_name, self.summary.audit_date
        )
    }
}

/// Where finished reports go. Email delivery lives outside this crate.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Delivers one report.
    async fn deliver(&self, report: &DailyReport) -> Result<(), HandlerError>;
}

/// Writes reports to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReportSink;

#[async_trait]
impl ReportSink for LogReportSink {
    async fn deliver(&self, report: &DailyReport) -> Result<(), HandlerError> {
        let summary = &report.summary;
        info!(
            hotel_id = %summary.hotel_id,
            audit_date = %summary.audit_date,
            currency = %report.currency,
            total_revenue = %report.total_revenue(),
            room_revenue = %summary.room_revenue,
            tax_total = %summary.tax_total,
            payment_total = %summary.payment_total,
            rooms_occupied = summary.rooms_occupied,
            no_show_count = summary.no_show_count,
            total_ledger_balance = %summary.total_ledger_balance,
            "{}",
            report.subject()
        );
        if let Ok(body) = serde_json::to_string(report) {
            debug!(%body, "Daily report body");
        }
        Ok(())
    }
}
