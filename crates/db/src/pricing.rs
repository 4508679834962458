//! Stay pricing contract and the booked-rate implementation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use std::collections::HashMap;

use innkeep_core::pricing::{StayPriceRequest, StayQuote};
use innkeep_core::tax::{TaxContext, TaxEngine, TaxableCategory};
use innkeep_shared::types::ReservationRoomId;

use crate::entities::{hotels, reservation_rooms};
use crate::repositories::tax_rate::{TaxRateError, TaxRateRepository};

/// Error types for pricing lookups.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    /// No rate is known for the request.
    #[error("No rate available for reservation room {0:?}")]
    NoRate(Option<ReservationRoomId>),

    /// Tax configuration could not be loaded.
    #[error(transparent)]
    Tax(#[from] TaxRateError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// `calculateStayPrice`.
#[async_trait]
pub trait StayPricing: Send + Sync {
    /// Prices the nights `[start_date, end_date)` of a stay.
    async fn calculate_stay_price(&self, request: &StayPriceRequest)
    -> Result<StayQuote, PricingError>;
}

/// Prices a booked stay from `reservation_rooms.nightly_rate`.
///
/// The reported `tax_amount` keeps the `base + computed tax` shape of the
/// existing pricing output; the ledger never posts it.
#[derive(Debug, Clone)]
pub struct BookedRatePricing {
    db: DatabaseConnection,
    taxes: TaxRateRepository,
}

impl BookedRatePricing {
    /// Creates a new booked-rate pricing source.
    #[must_use]
    pub const fn new(db: DatabaseConnection, taxes: TaxRateRepository) -> Self {
        Self { db, taxes }
    }
}

#[async_trait]
impl StayPricing for BookedRatePricing {
    async fn calculate_stay_price(
        &self,
        request: &StayPriceRequest,
    ) -> Result<StayQuote, PricingError> {
        let room_id = request
            .reservation_room_id
            .ok_or(PricingError::NoRate(None))?;
        let room = reservation_rooms::Entity::find_by_id(room_id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(PricingError::NoRate(Some(room_id)))?;
        let currency = hotels::Entity::find_by_id(request.hotel_id.into_inner())
            .one(&self.db)
            .await?
            .map_or_else(String::new, |h| h.currency);

        let nights = request.nights();
        let base = room.nightly_rate * Decimal::from(nights);
        let graph = self.taxes.load_graph(request.hotel_id).await?;
        let taxes = TaxEngine::compute(
            &graph,
            &TaxContext {
                date: request.start_date,
                category: Some(TaxableCategory::RoomRate),
                amount: base,
                discount: Decimal::ZERO,
                prior_occurrences: HashMap::new(),
            },
        );

        Ok(StayQuote::from_booked_rate(
            room.nightly_rate,
            nights,
            taxes.total,
            currency,
        ))
    }
}
