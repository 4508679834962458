//! Money rounding helpers.
//!
//! CRITICAL: every stored amount is rounded to 2 decimal places with
//! banker's rounding (round half to even).

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

/// Decimal places of every posted amount.
pub const MONEY_DP: u32 = 2;

/// Rounds an amount to money precision using banker's rounding.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointNearestEven)
}

/// Returns `rate` percent of `amount`, rounded to money precision.
#[must_use]
pub fn percent_of(amount: Decimal, rate: Decimal) -> Decimal {
    round_money(amount * rate / Decimal::ONE_HUNDRED)
}
