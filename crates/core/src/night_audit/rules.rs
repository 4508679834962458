//! Stay coverage, no-show and due-out rules, and the postings they produce.

use chrono::NaiveDate;
use innkeep_shared::types::{
    FolioId, HotelId, RateTypeId, ReservationId, ReservationRoomId, RoomTypeId, UserId,
};
use rust_decimal::Decimal;

use super::error::NightAuditError;
use super::types::{MealPlan, ReservationStatus, RoomStayStatus};
use crate::folio::{PostingInput, TransactionCategory, TransactionType};
use crate::pricing::StayPriceRequest;

/// A reservation room as the audit sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StayLine {
    /// Reservation room.
    pub reservation_room_id: ReservationRoomId,
    /// Parent reservation.
    pub reservation_id: ReservationId,
    /// Hotel.
    pub hotel_id: HotelId,
    /// Folio charges go to.
    pub folio_id: Option<FolioId>,
    /// Room type, for pricing.
    pub room_type_id: Option<RoomTypeId>,
    /// Rate plan, for pricing.
    pub rate_type_id: Option<RateTypeId>,
    /// First night.
    pub arrival_date: NaiveDate,
    /// Departure day (not a night of the stay).
    pub departure_date: NaiveDate,
    /// Adults.
    pub adults: i32,
    /// Children.
    pub children: i32,
    /// Room status.
    pub status: RoomStayStatus,
    /// Board basis.
    pub meal_plan: MealPlan,
    /// Whether meals are part of the room rate.
    pub meal_plan_included: bool,
    /// Nightly meal plan price when not included.
    pub meal_plan_amount: Decimal,
}

impl StayLine {
    /// Returns true if the night of `date` is a chargeable night of this stay.
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.arrival_date <= date
            && date < self.departure_date
            && matches!(self.status, RoomStayStatus::InHouse | RoomStayStatus::CheckedOut)
    }

    /// Returns true if the room is in house and leaves on `date`.
    #[must_use]
    pub fn is_due_out(&self, date: NaiveDate) -> bool {
        self.status == RoomStayStatus::InHouse && self.departure_date == date
    }

    /// Pricing request for the single night `[date, date + 1)`.
    #[must_use]
    pub fn one_night_request(&self, date: NaiveDate) -> StayPriceRequest {
        StayPriceRequest {
            hotel_id: self.hotel_id,
            room_type_id: self.room_type_id,
            rate_type_id: self.rate_type_id,
            start_date: date,
            end_date: date.succ_opt().unwrap_or(date),
            adults: self.adults,
            children: self.children,
            reservation_room_id: Some(self.reservation_room_id),
        }
    }

    /// Returns true if a separate meal plan charge is posted.
    #[must_use]
    pub fn bills_meal_plan_separately(&self) -> bool {
        self.meal_plan != MealPlan::RoomOnly
            && !self.meal_plan_included
            && self.meal_plan_amount > Decimal::ZERO
    }

    /// Postings for one audited night: the room charge, and the meal plan
    /// charge when billed separately.
    ///
    /// # Errors
    ///
    /// Returns `NoFolio` if the line has no folio.
    pub fn nightly_postings(
        &self,
        date: NaiveDate,
        room_amount: Decimal,
        actor: Option<UserId>,
    ) -> Result<Vec<PostingInput>, NightAuditError> {
        let folio_id = self
            .folio_id
            .ok_or(NightAuditError::NoFolio(self.reservation_room_id))?;

        let mut description = format!("Room charge {date}");
        if self.meal_plan != MealPlan::RoomOnly && self.meal_plan_included {
            description.push_str(&format!(" ({} included)", self.meal_plan.label()));
        }

        let mut postings = vec![self.posting(
            folio_id,
            TransactionCategory::Room,
            room_amount,
            description,
            date,
            actor,
        )];

        if self.bills_meal_plan_separately() {
            postings.push(self.posting(
                folio_id,
                TransactionCategory::FoodAndBeverage,
                self.meal_plan_amount,
                format!("Meal plan ({}) {date}", self.meal_plan.label()),
                date,
                actor,
            ));
        }
        Ok(postings)
    }

    /// The no-show fee posting for the first night.
    ///
    /// # Errors
    ///
    /// Returns `NoFolio` if the line has no folio.
    pub fn no_show_fee(
        &self,
        date: NaiveDate,
        first_night_amount: Decimal,
        actor: Option<UserId>,
    ) -> Result<PostingInput, NightAuditError> {
        let folio_id = self
            .folio_id
            .ok_or(NightAuditError::NoFolio(self.reservation_room_id))?;
        Ok(self.posting(
            folio_id,
            TransactionCategory::NoShowFee,
            first_night_amount,
            format!("No-show fee {}", self.arrival_date),
            date,
            actor,
        ))
    }

    fn posting(
        &self,
        folio_id: FolioId,
        category: TransactionCategory,
        amount: Decimal,
        description: String,
        date: NaiveDate,
        actor: Option<UserId>,
    ) -> PostingInput {
        let mut input = PostingInput::new(folio_id, category, TransactionType::Debit, amount)
            .with_description(description)
            .for_reservation_room(self.reservation_room_id)
            .on_date(date);
        input.created_by = actor;
        input
    }
}

/// A reservation checked for no-show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoShowCandidate {
    /// Reservation.
    pub reservation_id: ReservationId,
    /// Current status.
    pub status: ReservationStatus,
    /// Expected arrival.
    pub arrival_date: NaiveDate,
}

impl NoShowCandidate {
    /// Returns true if the guest was due by `date` and never checked in.
    #[must_use]
    pub fn is_no_show(&self, date: NaiveDate) -> bool {
        self.status == ReservationStatus::Confirmed && self.arrival_date <= date
    }
}
