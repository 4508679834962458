//! Night audit rules.
//!
//! The storage-bound engine lives in `innkeep-db`. This module holds the
//! parts that need no database:
//! - Audit date validation per mode (live, backfill)
//! - Stay coverage, no-show and due-out rules
//! - Room charge and meal plan posting plans
//! - Daily summary fact accumulation

pub mod error;
pub mod rules;
pub mod summary;
pub mod types;
pub mod validation;

pub use error::NightAuditError;
pub use rules::{NoShowCandidate, StayLine};
pub use summary::{DailySummary, DailySummaryBuilder, FolioBalanceLine, SummaryEntry};
pub use types::{
    AuditMode, AuditPlan, AuditStep, HotelAuditState, MealPlan, NightAuditReport,
    NightAuditRequest, NoShowFeePolicy, PostingFailure, ReservationStatus, RoomStayStatus,
};
pub use validation::{backfill_dates, plan_audit};
