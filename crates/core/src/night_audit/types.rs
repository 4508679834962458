//! Night audit domain types.

use chrono::NaiveDate;
use innkeep_shared::types::{FolioId, HotelId, ReservationId, ReservationRoomId, UserId};
use serde::{Deserialize, Serialize};

use super::error::NightAuditError;

/// How an audit was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// Job queue, scheduler or test dispatch; may advance the working date.
    Live,
    /// Historical re-run; never advances the working date.
    Backfill,
}

string_enum!(
    AuditMode,
    NightAuditError,
    |value| NightAuditError::UnknownValue { field: "audit_mode", value };
    {
        Live => "live",
        Backfill => "backfill",
    }
);

/// Reservation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Booked, not yet arrived.
    Confirmed,
    /// At least one room checked in.
    CheckedIn,
    /// Departed.
    CheckedOut,
    /// Cancelled.
    Cancelled,
    /// Never arrived.
    NoShow,
}

string_enum!(
    ReservationStatus,
    NightAuditError,
    |value| NightAuditError::UnknownValue { field: "reservation.status", value };
    {
        Confirmed => "confirmed",
        CheckedIn => "checked_in",
        CheckedOut => "checked_out",
        Cancelled => "cancelled",
        NoShow => "no_show",
    }
);

/// Status of one room within a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStayStatus {
    /// Not yet checked in.
    Reserved,
    /// Checked in.
    InHouse,
    /// Checked out.
    CheckedOut,
    /// Cancelled.
    Cancelled,
    /// Never arrived.
    NoShow,
}

string_enum!(
    RoomStayStatus,
    NightAuditError,
    |value| NightAuditError::UnknownValue { field: "reservation_room.status", value };
    {
        Reserved => "reserved",
        InHouse => "in_house",
        CheckedOut => "checked_out",
        Cancelled => "cancelled",
        NoShow => "no_show",
    }
);

/// Board basis of a reservation room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealPlan {
    /// No meals.
    RoomOnly,
    /// Breakfast.
    Breakfast,
    /// Breakfast and one main meal.
    HalfBoard,
    /// All meals.
    FullBoard,
}

string_enum!(
    MealPlan,
    NightAuditError,
    |value| NightAuditError::UnknownValue { field: "reservation_room.meal_plan", value };
    {
        RoomOnly => "room_only",
        Breakfast => "breakfast",
        HalfBoard => "half_board",
        FullBoard => "full_board",
    }
);

impl MealPlan {
    /// Human-readable label for posting descriptions.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RoomOnly => "room only",
            Self::Breakfast => "breakfast",
            Self::HalfBoard => "half board",
            Self::FullBoard => "full board",
        }
    }
}

/// Hotel policy for charging no-shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoShowFeePolicy {
    /// No fee.
    #[default]
    None,
    /// Charge the first night's base rate.
    FirstNight,
}

string_enum!(
    NoShowFeePolicy,
    NightAuditError,
    |value| NightAuditError::UnknownValue { field: "hotel.no_show_fee_policy", value };
    {
        None => "none",
        FirstNight => "first_night",
    }
);

/// `calculateNightAudit` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightAuditRequest {
    /// Hotel.
    pub hotel_id: HotelId,
    /// Business date to audit.
    pub audit_date: NaiveDate,
    /// Suppresses the daily report.
    pub skip_report: bool,
    /// Live or backfill.
    pub mode: AuditMode,
    /// Acting user, stamped on postings.
    pub requested_by: Option<UserId>,
}

impl NightAuditRequest {
    /// A live audit.
    #[must_use]
    pub const fn live(hotel_id: HotelId, audit_date: NaiveDate) -> Self {
        Self {
            hotel_id,
            audit_date,
            skip_report: false,
            mode: AuditMode::Live,
            requested_by: None,
        }
    }

    /// A backfill day; reporting is always suppressed.
    #[must_use]
    pub const fn backfill(hotel_id: HotelId, audit_date: NaiveDate) -> Self {
        Self {
            hotel_id,
            audit_date,
            skip_report: true,
            mode: AuditMode::Backfill,
            requested_by: None,
        }
    }
}

/// Hotel fields the audit validates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotelAuditState {
    /// Hotel.
    pub hotel_id: HotelId,
    /// Current business date.
    pub current_working_date: NaiveDate,
    /// Last date a live audit completed.
    pub last_night_audit_date: Option<NaiveDate>,
}

/// A validated audit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditPlan {
    /// Date being audited.
    pub audit_date: NaiveDate,
    /// Mode.
    pub mode: AuditMode,
    /// Working date the hotel must still be on when advancing.
    pub expected_working_date: NaiveDate,
    /// New working date, for the live day only.
    pub advance_to: Option<NaiveDate>,
}

/// Audit step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStep {
    /// Posting a room or meal plan charge.
    RoomCharge,
    /// Marking a no-show or posting its fee.
    NoShow,
    /// Flagging a due-out.
    DueOut,
    /// Recalculating a folio.
    Recalculate,
}

/// One isolated failure inside an audit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingFailure {
    /// Step.
    pub step: AuditStep,
    /// Reservation, when known.
    pub reservation_id: Option<ReservationId>,
    /// Reservation room, when known.
    pub reservation_room_id: Option<ReservationRoomId>,
    /// Folio, when known.
    pub folio_id: Option<FolioId>,
    /// Error message.
    pub error: String,
}

/// `calculateNightAudit` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightAuditReport {
    /// Hotel.
    pub hotel_id: HotelId,
    /// Audited date.
    pub audit_date: NaiveDate,
    /// Mode.
    pub mode: AuditMode,
    /// Room charges posted by this run.
    pub room_charges_posted: u32,
    /// Room charges that already existed.
    pub room_charges_skipped: u32,
    /// Reservations marked no-show.
    pub no_shows_marked: u32,
    /// Rooms flagged due-out.
    pub due_outs_flagged: u32,
    /// Folios replayed.
    pub folios_recalculated: u32,
    /// Isolated failures.
    pub failures: Vec<PostingFailure>,
    /// New working date, if advanced.
    pub working_date_advanced_to: Option<NaiveDate>,
    /// Whether a DAILY_REPORT job exists for the date.
    pub report_enqueued: bool,
}

impl NightAuditReport {
    /// An empty report for a validated plan.
    #[must_use]
    pub const fn new(hotel_id: HotelId, plan: &AuditPlan) -> Self {
        Self {
            hotel_id,
            audit_date: plan.audit_date,
            mode: plan.mode,
            room_charges_posted: 0,
            room_charges_skipped: 0,
            no_shows_marked: 0,
            due_outs_flagged: 0,
            folios_recalculated: 0,
            failures: Vec::new(),
            working_date_advanced_to: None,
            report_enqueued: false,
        }
    }

    /// Records an isolated failure.
    pub fn record_failure(&mut self, failure: PostingFailure) {
        self.failures.push(failure);
    }

    /// Returns true if no step failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
