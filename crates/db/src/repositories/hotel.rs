//! Hotel repository: the working date anchor of the night audit.
//!
//! `advance_working_date` is the only writer of `current_working_date`.

use chrono::{NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tracing::{info, instrument};

use innkeep_core::night_audit::{HotelAuditState, NightAuditError, NoShowFeePolicy};
use innkeep_shared::types::HotelId;

use crate::entities::{hotel_transaction_sequences, hotels};

/// Error types for hotel operations.
#[derive(Debug, thiserror::Error)]
pub enum HotelError {
    /// Hotel not found.
    #[error("Hotel not found: {0}")]
    NotFound(HotelId),

    /// Timezone is not a known IANA name.
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    /// The working date is no longer the one the caller validated against.
    #[error("Working date moved: expected {expected}, found {actual}")]
    WorkingDateMoved {
        /// Date the caller expected.
        expected: NaiveDate,
        /// Date found under the lock.
        actual: NaiveDate,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<HotelError> for NightAuditError {
    fn from(err: HotelError) -> Self {
        match err {
            HotelError::NotFound(id) => Self::HotelNotFound(id),
            HotelError::WorkingDateMoved { expected, actual } => {
                Self::WorkingDateMoved { expected, actual }
            }
            HotelError::InvalidTimezone(value) => Self::UnknownValue {
                field: "hotel.timezone",
                value,
            },
            HotelError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

/// Input for creating a hotel.
#[derive(Debug, Clone)]
pub struct CreateHotelInput {
    /// Display name.
    pub name: String,
    /// IANA timezone, e.g. `Asia/Jakarta`.
    pub timezone: String,
    /// Currency code.
    pub currency: String,
    /// First business date.
    pub current_working_date: NaiveDate,
    /// Local time the audit window opens.
    pub night_audit_start_time: NaiveTime,
    /// Local time the audit window closes.
    pub night_audit_end_time: NaiveTime,
    /// No-show fee policy.
    pub no_show_fee_policy: NoShowFeePolicy,
}

/// Hotel repository.
#[derive(Debug, Clone)]
pub struct HotelRepository {
    db: DatabaseConnection,
}

impl HotelRepository {
    /// Creates a new hotel repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a hotel together with its transaction number sequence.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_hotel(&self, input: CreateHotelInput) -> Result<hotels::Model, HotelError> {
        input
            .timezone
            .parse::<Tz>()
            .map_err(|_| HotelError::InvalidTimezone(input.timezone.clone()))?;

        let now = Utc::now().into();
        let txn = self.db.begin().await?;

        let hotel = hotels::ActiveModel {
            id: Set(HotelId::new().into_inner()),
            name: Set(input.name),
            timezone: Set(input.timezone),
            currency: Set(input.currency),
            current_working_date: Set(input.current_working_date),
            night_audit_start_time: Set(input.night_audit_start_time),
            night_audit_end_time: Set(input.night_audit_end_time),
            last_night_audit_date: Set(None),
            no_show_fee_policy: Set(input.no_show_fee_policy.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        hotel_transaction_sequences::ActiveModel {
            hotel_id: Set(hotel.id),
            last_number: Set(0),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(hotel_id = %hotel.id, "Hotel created");
        Ok(hotel)
    }

    /// Finds a hotel by ID.
    pub async fn find_hotel(&self, hotel_id: HotelId) -> Result<hotels::Model, HotelError> {
        hotels::Entity::find_by_id(hotel_id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(HotelError::NotFound(hotel_id))
    }

    /// Lists every hotel, for the scheduler.
    pub async fn list_hotels(&self) -> Result<Vec<hotels::Model>, HotelError> {
        Ok(hotels::Entity::find()
            .order_by_asc(hotels::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// The fields an audit validates against.
    pub async fn audit_state(&self, hotel_id: HotelId) -> Result<HotelAuditState, HotelError> {
        let hotel = self.find_hotel(hotel_id).await?;
        Ok(HotelAuditState {
            hotel_id,
            current_working_date: hotel.current_working_date,
            last_night_audit_date: hotel.last_night_audit_date,
        })
    }

    /// Advances the working date to `new_date` and records `audited_date` as
    /// the last live audit, provided the hotel is still on `expected`.
    ///
    /// # Errors
    ///
    /// Returns `WorkingDateMoved` if another run advanced the date first.
    #[instrument(skip(self), fields(hotel_id = %hotel_id))]
    pub async fn advance_working_date(
        &self,
        hotel_id: HotelId,
        expected: NaiveDate,
        new_date: NaiveDate,
        audited_date: NaiveDate,
    ) -> Result<hotels::Model, HotelError> {
        let txn = self.db.begin().await?;
        let hotel = hotels::Entity::find_by_id(hotel_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(HotelError::NotFound(hotel_id))?;

        if hotel.current_working_date != expected {
            return Err(HotelError::WorkingDateMoved {
                expected,
                actual: hotel.current_working_date,
            });
        }

        let mut model: hotels::ActiveModel = hotel.into();
        model.current_working_date = Set(new_date);
        model.last_night_audit_date = Set(Some(audited_date));
        model.updated_at = Set(Utc::now().into());
        let hotel = model.update(&txn).await?;
        txn.commit().await?;

        info!(%expected, %new_date, "Working date advanced");
        Ok(hotel)
    }
}
