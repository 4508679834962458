//! Database seeder for Innkeep development and testing.
//!
//! Seeds a demo hotel whose working date is today, two dependent taxes
//! (a service charge and a VAT levied on top of it) and three stays that
//! exercise the night audit: one in house, one arriving today that will
//! become a no-show, and one departing tomorrow.
//!
//! Usage: cargo run --bin seeder

use chrono::{Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use uuid::Uuid;

use innkeep_core::night_audit::{MealPlan, NoShowFeePolicy, ReservationStatus, RoomStayStatus};
use innkeep_core::tax::{ApplyTax, PostingType, TaxRate};
use innkeep_db::entities::{reservation_rooms, reservations};
use innkeep_db::repositories::{CreateFolioInput, CreateHotelInput};
use innkeep_db::{FolioRepository, HotelRepository, TaxRateRepository};
use innkeep_shared::types::{HotelId, ReservationId, TaxRateId};

const DEMO_HOTEL_NAME: &str = "Innkeep Demo Hotel";
/// Fixed so re-running the seeder finds the existing rows.
const SERVICE_CHARGE_ID: Uuid = Uuid::from_u128(0x0101);
const VAT_ID: Uuid = Uuid::from_u128(0x0102);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set in environment"))?;

    println!("Connecting to database...");
    let db = innkeep_db::connect(&database_url).await?;

    println!("Seeding demo hotel...");
    let (hotel_id, working_date) = seed_hotel(&db).await?;

    println!("Seeding tax rates...");
    seed_tax_rates(&db, hotel_id).await?;

    println!("Seeding reservations...");
    seed_reservations(&db, hotel_id, working_date).await?;

    println!("Seeding complete!");
    Ok(())
}

/// Returns the demo hotel, creating it on first run.
async fn seed_hotel(db: &DatabaseConnection) -> anyhow::Result<(HotelId, NaiveDate)> {
    let hotels = HotelRepository::new(db.clone());
    if let Some(existing) = hotels
        .list_hotels()
        .await?
        .into_iter()
        .find(|h| h.name == DEMO_HOTEL_NAME)
    {
        println!("  Demo hotel already exists, skipping...");
        return Ok((
            HotelId::from_uuid(existing.id),
            existing.current_working_date,
        ));
    }

    let start = NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN);
    let end = NaiveTime::from_hms_opt(5, 0, 0).unwrap_or(NaiveTime::MIN);
    let hotel = hotels
        .create_hotel(CreateHotelInput {
            name: DEMO_HOTEL_NAME.to_string(),
            timezone: "Asia/Jakarta".to_string(),
            currency: "USD".to_string(),
            current_working_date: Utc::now().date_naive(),
            night_audit_start_time: start,
            night_audit_end_time: end,
            no_show_fee_policy: NoShowFeePolicy::FirstNight,
        })
        .await?;

    println!(
        "  Created demo hotel {} (working date {})",
        hotel.id, hotel.current_working_date
    );
    Ok((HotelId::from_uuid(hotel.id), hotel.current_working_date))
}

/// Seeds a 10% service charge and an 11% VAT whose base includes it.
async fn seed_tax_rates(db: &DatabaseConnection, hotel_id: HotelId) -> anyhow::Result<()> {
    let taxes = TaxRateRepository::new(db.clone());
    let existing = taxes.list_tax_rates(hotel_id).await?;

    let effective_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN);
    let service_charge = TaxRate {
        id: TaxRateId::from_uuid(SERVICE_CHARGE_ID),
        hotel_id,
        name: "Service Charge".to_string(),
        rate_percentage: Decimal::new(10, 0),
        posting_type: PostingType::FlatPercentage,
        apply_tax: ApplyTax::AfterDiscount,
        applies_to_room_rate: true,
        applies_to_fnb: true,
        applies_to_other: false,
        effective_date,
        end_date: None,
        exempt_after: None,
        tax_apply_after: Vec::new(),
        priority: 0,
        is_active: true,
        slabs: Vec::new(),
    };
    let vat = TaxRate {
        id: TaxRateId::from_uuid(VAT_ID),
        name: "VAT".to_string(),
        rate_percentage: Decimal::new(11, 0),
        tax_apply_after: vec![service_charge.id],
        priority: 1,
        ..service_charge.clone()
    };

    // Service charge first; VAT depends on it.
    for rate in [service_charge, vat] {
        if existing.iter().any(|r| r.id == rate.id) {
            println!("  {} already exists, skipping...", rate.name);
            continue;
        }
        let name = rate.name.clone();
        taxes.save_tax_rate(rate).await?;
        println!("  Created tax rate: {name}");
    }
    Ok(())
}

async fn seed_reservations(
    db: &DatabaseConnection,
    hotel_id: HotelId,
    working_date: NaiveDate,
) -> anyhow::Result<()> {
    if reservations::Entity::find()
        .filter(reservations::Column::HotelId.eq(hotel_id.into_inner()))
        .one(db)
        .await?
        .is_some()
    {
        println!("  Reservations already exist, skipping...");
        return Ok(());
    }

    let day = |offset: i64| -> anyhow::Result<NaiveDate> {
        let shifted = if offset >= 0 {
            working_date.checked_add_days(Days::new(offset.unsigned_abs()))
        } else {
            working_date.checked_sub_days(Days::new(offset.unsigned_abs()))
        };
        shifted.ok_or_else(|| anyhow::anyhow!("date out of range"))
    };

    let stays = [
        (
            "in house",
            day(-1)?,
            day(2)?,
            ReservationStatus::CheckedIn,
            RoomStayStatus::InHouse,
            Decimal::new(150, 0),
        ),
        (
            "arriving today",
            working_date,
            day(3)?,
            ReservationStatus::Confirmed,
            RoomStayStatus::Reserved,
            Decimal::new(120, 0),
        ),
        (
            "departing tomorrow",
            day(-2)?,
            day(1)?,
            ReservationStatus::CheckedIn,
            RoomStayStatus::InHouse,
            Decimal::new(180, 0),
        ),
    ];

    for (label, arrival, departure, status, room_status, rate) in stays {
        insert_stay(db, hotel_id, arrival, departure, status, room_status, rate).await?;
        println!("  Created reservation ({label}): {arrival} to {departure} at {rate}");
    }
    Ok(())
}

/// Inserts a one-room reservation billed to its own folio.
async fn insert_stay(
    db: &DatabaseConnection,
    hotel_id: HotelId,
    arrival: NaiveDate,
    departure: NaiveDate,
    status: ReservationStatus,
    room_status: RoomStayStatus,
    nightly_rate: Decimal,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let reservation = reservations::ActiveModel {
        id: Set(Uuid::now_v7()),
        hotel_id: Set(hotel_id.into_inner()),
        guest_id: Set(Some(Uuid::now_v7())),
        company_id: Set(None),
        status: Set(status.as_str().to_string()),
        arrival_date: Set(arrival),
        departure_date: Set(departure),
        no_show_date: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await?;

    let folio = FolioRepository::new(db.clone(), TaxRateRepository::new(db.clone()))
        .create_folio(CreateFolioInput {
            hotel_id,
            reservation_id: Some(ReservationId::from_uuid(reservation.id)),
            ..Default::default()
        })
        .await?;

    reservation_rooms::ActiveModel {
        id: Set(Uuid::now_v7()),
        reservation_id: Set(reservation.id),
        hotel_id: Set(hotel_id.into_inner()),
        folio_id: Set(Some(folio.id)),
        room_type_id: Set(None),
        rate_type_id: Set(None),
        arrival_date: Set(arrival),
        departure_date: Set(departure),
        adults: Set(2),
        children: Set(0),
        nightly_rate: Set(nightly_rate),
        meal_plan: Set(MealPlan::RoomOnly.as_str().to_string()),
        meal_plan_included: Set(false),
        meal_plan_amount: Set(Decimal::ZERO),
        status: Set(room_status.as_str().to_string()),
        is_due_out: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await?;
    Ok(())
}
