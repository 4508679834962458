//! Shared fixtures for database integration tests.
//!
//! Tests run against PostgreSQL at `DATABASE_URL` and are skipped when it is
//! not set. Every fixture creates its own hotel, so tests never share rows.

#![allow(dead_code)]

use std::env;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};
use sea_orm_migration::MigratorTrait;
use tokio::sync::OnceCell;
use uuid::Uuid;

use innkeep_core::night_audit::NoShowFeePolicy;
use innkeep_db::entities::{reservation_rooms, reservations};
use innkeep_db::migration::Migrator;
use innkeep_db::repositories::{CreateFolioInput, CreateHotelInput};
use innkeep_db::{
    BookedRatePricing, FolioRepository, HotelRepository, NightAuditEngine, TaxRateRepository,
};
use innkeep_shared::types::{FolioId, HotelId, ReservationId, ReservationRoomId};

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Connects and migrates, or returns `None` if `DATABASE_URL` is unset.
pub async fn connect() -> Option<DatabaseConnection> {
    let Ok(url) = env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };
    let db = innkeep_db::connect(&url).await.expect("connect to DATABASE_URL");
    MIGRATED
        .get_or_init(|| async {
            Migrator::up(&db, None).await.expect("run migrations");
        })
        .await;
    Some(db)
}

pub fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A hotel on `working_date` with no audits yet.
pub async fn hotel(
    db: &DatabaseConnection,
    working_date: NaiveDate,
    policy: NoShowFeePolicy,
) -> HotelId {
    let hotel = HotelRepository::new(db.clone())
        .create_hotel(CreateHotelInput {
            name: format!("Test Hotel {}", Uuid::new_v4()),
            timezone: "Asia/Jakarta".to_string(),
            currency: "USD".to_string(),
            current_working_date: working_date,
            night_audit_start_time: NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            night_audit_end_time: NaiveTime::from_hms_opt(5, 0, 0).unwrap(),
            no_show_fee_policy: policy,
        })
        .await
        .expect("create hotel");
    HotelId::from_uuid(hotel.id)
}

pub fn folio_repository(db: &DatabaseConnection) -> FolioRepository {
    FolioRepository::new(db.clone(), TaxRateRepository::new(db.clone()))
}

pub async fn open_folio(db: &DatabaseConnection, hotel_id: HotelId) -> FolioId {
    let folio = folio_repository(db)
        .create_folio(CreateFolioInput {
            hotel_id,
            ..Default::default()
        })
        .await
        .expect("create folio");
    FolioId::from_uuid(folio.id)
}

/// A stay and its folio.
pub struct Stay {
    pub reservation_id: ReservationId,
    pub reservation_room_id: ReservationRoomId,
    pub folio_id: FolioId,
}

/// Inserts a single-room reservation with its own folio.
pub async fn stay(
    db: &DatabaseConnection,
    hotel_id: HotelId,
    arrival: NaiveDate,
    departure: NaiveDate,
    reservation_status: &str,
    room_status: &str,
    nightly_rate: Decimal,
) -> Stay {
    let reservation_id = reservation(db, hotel_id, arrival, departure, reservation_status).await;
    let folio_id = reservation_folio(db, hotel_id, reservation_id).await;
    let reservation_room_id = add_room(
        db,
        hotel_id,
        reservation_id,
        Some(folio_id),
        room_status,
        nightly_rate,
    )
    .await;

    Stay {
        reservation_id,
        reservation_room_id,
        folio_id,
    }
}

/// Inserts a reservation with no rooms.
pub async fn reservation(
    db: &DatabaseConnection,
    hotel_id: HotelId,
    arrival: NaiveDate,
    departure: NaiveDate,
    status: &str,
) -> ReservationId {
    let now = Utc::now();
    let reservation = reservations::ActiveModel {
        id: Set(Uuid::now_v7()),
        hotel_id: Set(hotel_id.into_inner()),
        guest_id: Set(Some(Uuid::now_v7())),
        company_id: Set(None),
        status: Set(status.to_string()),
        arrival_date: Set(arrival),
        departure_date: Set(departure),
        no_show_date: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .expect("insert reservation");
    ReservationId::from_uuid(reservation.id)
}

/// Opens a folio attached to `reservation_id`.
pub async fn reservation_folio(
    db: &DatabaseConnection,
    hotel_id: HotelId,
    reservation_id: ReservationId,
) -> FolioId {
    let folio = folio_repository(db)
        .create_folio(CreateFolioInput {
            hotel_id,
            reservation_id: Some(reservation_id),
            ..Default::default()
        })
        .await
        .expect("create folio");
    FolioId::from_uuid(folio.id)
}

/// Adds a room to a reservation, spanning the reservation's dates.
pub async fn add_room(
    db: &DatabaseConnection,
    hotel_id: HotelId,
    reservation_id: ReservationId,
    folio_id: Option<FolioId>,
    room_status: &str,
    nightly_rate: Decimal,
) -> ReservationRoomId {
    let parent = reservations::Entity::find_by_id(reservation_id.into_inner())
        .one(db)
        .await
        .expect("load reservation")
        .expect("reservation exists");
    let now = Utc::now();
    let room = reservation_rooms::ActiveModel {
        id: Set(Uuid::now_v7()),
        reservation_id: Set(parent.id),
        hotel_id: Set(hotel_id.into_inner()),
        folio_id: Set(folio_id.map(FolioId::into_inner)),
        room_type_id: Set(None),
        rate_type_id: Set(None),
        arrival_date: Set(parent.arrival_date),
        departure_date: Set(parent.departure_date),
        adults: Set(2),
        children: Set(0),
        nightly_rate: Set(nightly_rate),
        meal_plan: Set("room_only".to_string()),
        meal_plan_included: Set(false),
        meal_plan_amount: Set(Decimal::ZERO),
        status: Set(room_status.to_string()),
        is_due_out: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .expect("insert reservation room");
    ReservationRoomId::from_uuid(room.id)
}

/// An engine wired to booked-rate pricing.
pub fn engine(db: &DatabaseConnection) -> NightAuditEngine {
    let taxes = TaxRateRepository::new(db.clone());
    let pricing = BookedRatePricing::new(db.clone(), taxes.clone());
    NightAuditEngine::new(db.clone(), taxes, Arc::new(pricing))
}
