//! Hotel repository integration tests.

mod common;

use chrono::NaiveTime;

use innkeep_core::night_audit::NoShowFeePolicy;
use innkeep_db::HotelRepository;
use innkeep_db::repositories::{CreateHotelInput, HotelError};

use common::{connect, d, hotel};

#[tokio::test]
async fn test_unknown_timezone_rejected() {
    let Some(db) = connect().await else { return };

    let result = HotelRepository::new(db)
        .create_hotel(CreateHotelInput {
            name: "Nowhere Inn".to_string(),
            timezone: "Mars/Olympus_Mons".to_string(),
            currency: "USD".to_string(),
            current_working_date: d(2024, 5, 10),
            night_audit_start_time: NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            night_audit_end_time: NaiveTime::from_hms_opt(5, 0, 0).unwrap(),
            no_show_fee_policy: NoShowFeePolicy::None,
        })
        .await;

    assert!(matches!(result, Err(HotelError::InvalidTimezone(tz)) if tz == "Mars/Olympus_Mons"));
}

#[tokio::test]
async fn test_advance_requires_expected_working_date() {
    let Some(db) = connect().await else { return };
    let hotel_id = hotel(&db, d(2024, 5, 10), NoShowFeePolicy::None).await;
    let hotels = HotelRepository::new(db.clone());

    let advanced = hotels
        .advance_working_date(hotel_id, d(2024, 5, 10), d(2024, 5, 11), d(2024, 5, 10))
        .await
        .unwrap();
    assert_eq!(advanced.current_working_date, d(2024, 5, 11));
    assert_eq!(advanced.last_night_audit_date, Some(d(2024, 5, 10)));

    // A second run still holding the old date loses.
    let stale = hotels
        .advance_working_date(hotel_id, d(2024, 5, 10), d(2024, 5, 11), d(2024, 5, 10))
        .await;
    assert!(matches!(
        stale,
        Err(HotelError::WorkingDateMoved { expected, actual })
            if expected == d(2024, 5, 10) && actual == d(2024, 5, 11)
    ));

    let state = hotels.audit_state(hotel_id).await.unwrap();
    assert_eq!(state.current_working_date, d(2024, 5, 11));
}
