//! Reservation repository: the stays the night audit reads and flags.

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{info, instrument};

use innkeep_core::folio::PostingInput;
use innkeep_core::night_audit::{
    NightAuditError, NoShowCandidate, ReservationStatus, RoomStayStatus, StayLine,
};
use innkeep_shared::types::{
    FolioId, HotelId, RateTypeId, ReservationId, ReservationRoomId, RoomTypeId,
};

use super::folio::{FolioRepository, PostingResult, lock_folios};
use crate::entities::{reservation_rooms, reservations};

/// Result of marking a reservation as no-show.
#[derive(Debug, Clone)]
pub struct NoShowOutcome {
    /// Rooms moved from `reserved` to `no_show`.
    pub rooms_marked: u64,
    /// Fee postings written in the same unit.
    pub fees: Vec<PostingResult>,
}

/// Reservation repository.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    db: DatabaseConnection,
    folios: FolioRepository,
}

impl ReservationRepository {
    /// Creates a new reservation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, folios: FolioRepository) -> Self {
        Self { db, folios }
    }

    /// Rooms in house or checked out whose stay touches `date`, either as a
    /// night of the stay or as the departure day.
    pub async fn stay_lines(
        &self,
        hotel_id: HotelId,
        date: NaiveDate,
    ) -> Result<Vec<StayLine>, NightAuditError> {
        reservation_rooms::Entity::find()
            .filter(reservation_rooms::Column::HotelId.eq(hotel_id.into_inner()))
            .filter(reservation_rooms::Column::ArrivalDate.lte(date))
            .filter(reservation_rooms::Column::DepartureDate.gte(date))
            .filter(reservation_rooms::Column::Status.is_in([
                RoomStayStatus::InHouse.as_str(),
                RoomStayStatus::CheckedOut.as_str(),
            ]))
            .order_by_asc(reservation_rooms::Column::ArrivalDate)
            .order_by_asc(reservation_rooms::Column::Id)
            .all(&self.db)
            .await
            .map_err(database_error)?
            .into_iter()
            .map(stay_line)
            .collect()
    }

    /// Rooms of a reservation, in any status.
    pub async fn rooms_of(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Vec<StayLine>, NightAuditError> {
        reservation_rooms::Entity::find()
            .filter(reservation_rooms::Column::ReservationId.eq(reservation_id.into_inner()))
            .order_by_asc(reservation_rooms::Column::Id)
            .all(&self.db)
            .await
            .map_err(database_error)?
            .into_iter()
            .map(stay_line)
            .collect()
    }

    /// Confirmed reservations due to arrive by `date`.
    pub async fn no_show_candidates(
        &self,
        hotel_id: HotelId,
        date: NaiveDate,
    ) -> Result<Vec<NoShowCandidate>, NightAuditError> {
        reservations::Entity::find()
            .filter(reservations::Column::HotelId.eq(hotel_id.into_inner()))
            .filter(reservations::Column::Status.eq(ReservationStatus::Confirmed.as_str()))
            .filter(reservations::Column::ArrivalDate.lte(date))
            .order_by_asc(reservations::Column::ArrivalDate)
            .order_by_asc(reservations::Column::Id)
            .all(&self.db)
            .await
            .map_err(database_error)?
            .into_iter()
            .map(|r| {
                Ok(NoShowCandidate {
                    reservation_id: ReservationId::from_uuid(r.id),
                    status: r.status.parse()?,
                    arrival_date: r.arrival_date,
                })
            })
            .collect()
    }

    /// Reservations the audit of `date` marked no-show, including late
    /// arrivals carried over from earlier days.
    pub async fn count_no_shows(
        &self,
        hotel_id: HotelId,
        date: NaiveDate,
    ) -> Result<u64, NightAuditError> {
        reservations::Entity::find()
            .filter(reservations::Column::HotelId.eq(hotel_id.into_inner()))
            .filter(reservations::Column::Status.eq(ReservationStatus::NoShow.as_str()))
            .filter(reservations::Column::NoShowDate.eq(date))
            .count(&self.db)
            .await
            .map_err(database_error)
    }

    /// Marks a confirmed reservation and its reserved rooms as no-show on
    /// `audit_date` and posts the given fees, all in one unit.
    ///
    /// Every fee folio is locked up front in id order, before the first
    /// posting takes the hotel sequence row.
    ///
    /// Returns `None` if the reservation is no longer confirmed.
    #[instrument(skip(self, fees), fields(reservation_id = %reservation_id, %audit_date))]
    pub async fn mark_no_show(
        &self,
        hotel_id: HotelId,
        reservation_id: ReservationId,
        audit_date: NaiveDate,
        fees: &[PostingInput],
    ) -> Result<Option<NoShowOutcome>, NightAuditError> {
        let graph = self.folios.tax_graph(hotel_id).await?;
        let txn = self.db.begin().await.map_err(database_error)?;

        let Some(reservation) = reservations::Entity::find_by_id(reservation_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(database_error)?
        else {
            return Ok(None);
        };
        if reservation.status.parse::<ReservationStatus>()? != ReservationStatus::Confirmed {
            return Ok(None);
        }

        let now = Utc::now();
        let mut model: reservations::ActiveModel = reservation.into();
        model.status = Set(ReservationStatus::NoShow.as_str().to_string());
        model.no_show_date = Set(Some(audit_date));
        model.updated_at = Set(now.into());
        model.update(&txn).await.map_err(database_error)?;

        let rooms_marked = reservation_rooms::Entity::update_many()
            .col_expr(
                reservation_rooms::Column::Status,
                Expr::value(RoomStayStatus::NoShow.as_str()),
            )
            .col_expr(reservation_rooms::Column::UpdatedAt, Expr::value(now))
            .filter(reservation_rooms::Column::ReservationId.eq(reservation_id.into_inner()))
            .filter(reservation_rooms::Column::Status.eq(RoomStayStatus::Reserved.as_str()))
            .exec(&txn)
            .await
            .map_err(database_error)?
            .rows_affected;

        lock_folios(&txn, fees.iter().map(|f| f.folio_id)).await?;
        let mut posted = Vec::with_capacity(fees.len());
        for fee in fees {
            posted.push(self.folios.post_in(&txn, fee, &graph).await?);
        }

        txn.commit().await.map_err(database_error)?;
        info!(rooms_marked, fees = posted.len(), "Reservation marked no-show");
        Ok(Some(NoShowOutcome {
            rooms_marked,
            fees: posted,
        }))
    }

    /// Flags an in-house room as due out. Returns false if it was already
    /// flagged or is no longer in house.
    pub async fn flag_due_out(
        &self,
        reservation_room_id: ReservationRoomId,
    ) -> Result<bool, NightAuditError> {
        let result = reservation_rooms::Entity::update_many()
            .col_expr(reservation_rooms::Column::IsDueOut, Expr::value(true))
            .col_expr(reservation_rooms::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(reservation_rooms::Column::Id.eq(reservation_room_id.into_inner()))
            .filter(reservation_rooms::Column::Status.eq(RoomStayStatus::InHouse.as_str()))
            .filter(reservation_rooms::Column::IsDueOut.eq(false))
            .exec(&self.db)
            .await
            .map_err(database_error)?;
        Ok(result.rows_affected == 1)
    }
}

fn stay_line(room: reservation_rooms::Model) -> Result<StayLine, NightAuditError> {
    Ok(StayLine {
        reservation_room_id: ReservationRoomId::from_uuid(room.id),
        reservation_id: ReservationId::from_uuid(room.reservation_id),
        hotel_id: HotelId::from_uuid(room.hotel_id),
        folio_id: room.folio_id.map(FolioId::from_uuid),
        room_type_id: room.room_type_id.map(RoomTypeId::from_uuid),
        rate_type_id: room.rate_type_id.map(RateTypeId::from_uuid),
        arrival_date: room.arrival_date,
        departure_date: room.departure_date,
        adults: room.adults,
        children: room.children,
        status: room.status.parse()?,
        meal_plan: room.meal_plan.parse()?,
        meal_plan_included: room.meal_plan_included,
        meal_plan_amount: room.meal_plan_amount,
    })
}

fn database_error(err: DbErr) -> NightAuditError {
    NightAuditError::Database(err.to_string())
}
