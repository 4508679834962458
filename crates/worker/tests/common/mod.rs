//! Fixtures for worker tests against PostgreSQL at `DATABASE_URL`.

#![allow(dead_code)]

use std::env;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
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
use innkeep_shared::types::{FolioId, HotelId, ReservationId};

static MIGRATED: OnceCell<()> = OnceCell::const_new();

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

pub async fn hotel(db: &DatabaseConnection, working_date: NaiveDate) -> HotelId {
    let hotel = HotelRepository::new(db.clone())
        .create_hotel(CreateHotelInput {
            name: format!("Worker Hotel {}", Uuid::new_v4()),
            timezone: "Europe/Lisbon".to_string(),
            currency: "EUR".to_string(),
            current_working_date: working_date,
            night_audit_start_time: NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
            night_audit_end_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            no_show_fee_policy: NoShowFeePolicy::None,
        })
        .await
        .expect("create hotel");
    HotelId::from_uuid(hotel.id)
}

pub fn engine(db: &DatabaseConnection) -> NightAuditEngine {
    let taxes = TaxRateRepository::new(db.clone());
    let pricing = BookedRatePricing::new(db.clone(), taxes.clone());
    NightAuditEngine::new(db.clone(), taxes, Arc::new(pricing))
}

/// An in-house single-room stay; returns its folio.
pub async fn in_house_stay(
    db: &DatabaseConnection,
    hotel_id: HotelId,
    arrival: NaiveDate,
    departure: NaiveDate,
    nightly_rate: Decimal,
) -> FolioId {
    let reservation_id = checked_in_reservation(db, hotel_id, arrival, departure).await;
    let folio = FolioRepository::new(db.clone(), TaxRateRepository::new(db.clone()))
        .create_folio(CreateFolioInput {
            hotel_id,
            reservation_id: Some(ReservationId::from_uuid(reservation_id)),
            ..Default::default()
        })
        .await
        .expect("create folio");

    in_house_room(db, hotel_id, reservation_id, Some(folio.id), arrival, departure, nightly_rate).await;
    FolioId::from_uuid(folio.id)
}

/// An in-house stay whose room was never given a folio.
pub async fn stay_without_folio(
    db: &DatabaseConnection,
    hotel_id: HotelId,
    arrival: NaiveDate,
    departure: NaiveDate,
    nightly_rate: Decimal,
) {
    let reservation_id = checked_in_reservation(db, hotel_id, arrival, departure).await;
    in_house_room(db, hotel_id, reservation_id, None, arrival, departure, nightly_rate).await;
}

async fn checked_in_reservation(
    db: &DatabaseConnection,
    hotel_id: HotelId,
    arrival: NaiveDate,
    departure: NaiveDate,
) -> Uuid {
    let now = Utc::now();
    reservations::ActiveModel {
        id: Set(Uuid::now_v7()),
        hotel_id: Set(hotel_id.into_inner()),
        guest_id: Set(Some(Uuid::now_v7())),
        company_id: Set(None),
        status: Set("checked_in".to_string()),
        arrival_date: Set(arrival),
        departure_date: Set(departure),
        no_show_date: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .expect("insert reservation")
    .id
}

async fn in_house_room(
    db: &DatabaseConnection,
    hotel_id: HotelId,
    reservation_id: Uuid,
    folio_id: Option<Uuid>,
    arrival: NaiveDate,
    departure: NaiveDate,
    nightly_rate: Decimal,
) {
    let now = Utc::now();
    reservation_rooms::ActiveModel {
        id: Set(Uuid::now_v7()),
        reservation_id: Set(reservation_id),
        hotel_id: Set(hotel_id.into_inner()),
        folio_id: Set(folio_id),
        room_type_id: Set(None),
        rate_type_id: Set(None),
        arrival_date: Set(arrival),
        departure_date: Set(departure),
        adults: Set(1),
        children: Set(0),
        nightly_rate: Set(nightly_rate),
        meal_plan: Set("room_only".to_string()),
        meal_plan_included: Set(false),
        meal_plan_amount: Set(Decimal::ZERO),
        status: Set("in_house".to_string()),
        is_due_out: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .expect("insert reservation room");
}
