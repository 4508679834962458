//! Stay pricing contract types.
//!
//! The pricing collaborator itself is async and lives in `innkeep-db`;
//! these are the request and quote shapes it exchanges.

use chrono::NaiveDate;
use innkeep_shared::types::{HotelId, RateTypeId, ReservationRoomId, RoomTypeId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::round_money;

/// `calculateStayPrice` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayPriceRequest {
    /// Hotel.
    pub hotel_id: HotelId,
    /// Room type.
    pub room_type_id: Option<RoomTypeId>,
    /// Rate plan.
    pub rate_type_id: Option<RateTypeId>,
    /// First night.
    pub start_date: NaiveDate,
    /// Day after the last night.
    pub end_date: NaiveDate,
    /// Adults.
    pub adults: i32,
    /// Children.
    pub children: i32,
    /// Booked room being priced, when the quote is for an existing stay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_room_id: Option<ReservationRoomId>,
}

impl StayPriceRequest {
    /// Number of nights in `[start_date, end_date)`, never negative.
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days().max(0)
    }
}

/// `calculateStayPrice` response.
///
/// `tax_amount` is carried exactly as the pricing collaborator returns it;
/// the ledger never posts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayQuote {
    /// Base plus computed tax.
    pub total_amount: Decimal,
    /// Room revenue for the stay.
    pub base_amount: Decimal,
    /// Reported tax figure.
    pub tax_amount: Decimal,
    /// `base_amount / nights`.
    pub average_nightly_rate: Decimal,
    /// Currency code.
    pub currency: String,
}

impl StayQuote {
    /// Builds a quote from a booked nightly rate.
    ///
    /// NOTE: `tax_amount` is `base_amount + computed_tax`, so it includes the
    /// base. This mirrors the existing pricing output and may double-count;
    /// it stays as-is until product confirms the intended figure.
    #[must_use]
    pub fn from_booked_rate(
        nightly_rate: Decimal,
        nights: i64,
        computed_tax: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let base_amount = round_money(nightly_rate * Decimal::from(nights));
        let computed_tax = round_money(computed_tax);
        let tax_amount = base_amount + computed_tax;
        let average_nightly_rate = if nights > 0 {
            round_money(base_amount / Decimal::from(nights))
        } else {
            Decimal::ZERO
        };
        Self {
            total_amount: base_amount + computed_tax,
            base_amount,
            tax_amount,
            average_nightly_rate,
            currency: currency.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_booked_rate_quote_keeps_reported_tax_shape() {
        let quote = StayQuote::from_booked_rate(dec!(120), 1, dec!(12), "USD");
        assert_eq!(quote.base_amount, dec!(120));
        assert_eq!(quote.tax_amount, dec!(132));
        assert_eq!(quote.total_amount, dec!(132));
        assert_eq!(quote.average_nightly_rate, dec!(120));
    }

    #[test]
    fn test_nights() {
        let request = StayPriceRequest {
            hotel_id: HotelId::new(),
            room_type_id: None,
            rate_type_id: None,
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(),
            adults: 2,
            children: 0,
            reservation_room_id: None,
        };
        assert_eq!(request.nights(), 3);
    }

    #[test]
    fn test_quote_serializes_camel_case() {
        let quote = StayQuote::from_booked_rate(dec!(100), 2, dec!(0), "EUR");
        let json = serde_json::to_value(&quote).unwrap();
        assert!(json.get("averageNightlyRate").is_some());
        assert!(json.get("baseAmount").is_some());
    }
}
