//! Tax configuration and computation types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use innkeep_shared::types::{HotelId, TaxRateId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::TaxError;

/// How a tax amount is derived from its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingType {
    /// A fixed amount per posting, held in `rate_percentage`.
    FlatAmount,
    /// `base * rate / 100`.
    FlatPercentage,
    /// Percentage looked up from the slab containing the base.
    Slab,
}

impl PostingType {
    /// Returns the database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FlatAmount => "flat_amount",
            Self::FlatPercentage => "flat_percentage",
            Self::Slab => "slab",
        }
    }
}

impl fmt::Display for PostingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostingType {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat_amount" => Ok(Self::FlatAmount),
            "flat_percentage" => Ok(Self::FlatPercentage),
            "slab" => Ok(Self::Slab),
            other => Err(TaxError::UnknownPostingType(other.to_string())),
        }
    }
}

/// Whether the base is taken before or after the posting's discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyTax {
    /// Base is the undiscounted amount.
    BeforeDiscount,
    /// Base is the amount minus the discount.
    AfterDiscount,
}

impl ApplyTax {
    /// Returns the database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeDiscount => "before_discount",
            Self::AfterDiscount => "after_discount",
        }
    }
}

impl FromStr for ApplyTax {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before_discount" => Ok(Self::BeforeDiscount),
            "after_discount" => Ok(Self::AfterDiscount),
            other => Err(TaxError::UnknownApplyTax(other.to_string())),
        }
    }
}

/// The category flag a posting is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxableCategory {
    /// Room rate postings.
    RoomRate,
    /// Food and beverage postings.
    FoodAndBeverage,
    /// Everything else that is taxable.
    Other,
}

/// One row of a slab table. `max_amount == None` is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSlab {
    /// Inclusive lower bound.
    pub min_amount: Decimal,
    /// Exclusive upper bound.
    pub max_amount: Option<Decimal>,
    /// Percentage applied when the base falls in this slab.
    pub rate_percentage: Decimal,
}

impl TaxSlab {
    /// Returns true if `amount` lies in `[min_amount, max_amount)`.
    #[must_use]
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && self.max_amount.is_none_or(|max| amount < max)
    }

    fn overlaps(&self, other: &Self) -> bool {
        let self_below_other = self.max_amount.is_some_and(|max| max <= other.min_amount);
        let other_below_self = other.max_amount.is_some_and(|max| max <= self.min_amount);
        !(self_below_other || other_below_self)
    }
}

/// A hotel-scoped tax rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate {
    /// Tax rate ID.
    pub id: TaxRateId,
    /// Owning hotel.
    pub hotel_id: HotelId,
    /// Display name, copied into posting descriptions.
    pub name: String,
    /// Percentage, or the fixed amount for `FlatAmount`.
    pub rate_percentage: Decimal,
    /// How the amount is derived.
    pub posting_type: PostingType,
    /// Base before or after discount.
    pub apply_tax: ApplyTax,
    /// Applies to room postings.
    pub applies_to_room_rate: bool,
    /// Applies to food and beverage postings.
    pub applies_to_fnb: bool,
    /// Applies to other taxable postings.
    pub applies_to_other: bool,
    /// First day the tax is effective.
    pub effective_date: NaiveDate,
    /// Last day the tax is effective, inclusive.
    pub end_date: Option<NaiveDate>,
    /// Applies only to the first N occurrences.
    pub exempt_after: Option<u32>,
    /// Taxes whose applied amounts are added to this tax's base.
    pub tax_apply_after: Vec<TaxRateId>,
    /// Tie-breaker among taxes with no ordering constraint.
    pub priority: i32,
    /// Inactive taxes never apply.
    pub is_active: bool,
    /// Slab table for `PostingType::Slab`.
    pub slabs: Vec<TaxSlab>,
}

impl TaxRate {
    /// Returns true if the tax is active and `date` is within its effective range.
    #[must_use]
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.effective_date <= date
            && self.end_date.is_none_or(|end| date <= end)
    }

    /// Returns true if the tax's category flag covers `category`.
    #[must_use]
    pub const fn applies_to(&self, category: TaxableCategory) -> bool {
        match category {
            TaxableCategory::RoomRate => self.applies_to_room_rate,
            TaxableCategory::FoodAndBeverage => self.applies_to_fnb,
            TaxableCategory::Other => self.applies_to_other,
        }
    }

    /// Returns true if `prior_occurrences` already exhausted the `exempt_after` limit.
    #[must_use]
    pub fn is_exempt(&self, prior_occurrences: u32) -> bool {
        self.exempt_after.is_some_and(|limit| prior_occurrences >= limit)
    }

    /// Validates the rate on its own, ignoring dependencies.
    ///
    /// # Errors
    ///
    /// Returns `TaxError` for a negative rate, an inverted effective range,
    /// or a slab tax without slabs or with overlapping slabs.
    pub fn validate(&self) -> Result<(), TaxError> {
        if self.rate_percentage < Decimal::ZERO {
            return Err(TaxError::NegativeRate(self.id));
        }
        if let Some(end) = self.end_date
            && end < self.effective_date
        {
            return Err(TaxError::InvalidEffectiveRange {
                tax_rate_id: self.id,
                effective_date: self.effective_date,
                end_date: end,
            });
        }
        if self.posting_type == PostingType::Slab {
            if self.slabs.is_empty() {
                return Err(TaxError::MissingSlabs(self.id));
            }
            for (i, slab) in self.slabs.iter().enumerate() {
                if slab.rate_percentage < Decimal::ZERO {
                    return Err(TaxError::NegativeRate(self.id));
                }
                if slab.max_amount.is_some_and(|max| max <= slab.min_amount) {
                    return Err(TaxError::InvalidSlab(self.id));
                }
                if self.slabs[i + 1..].iter().any(|other| slab.overlaps(other)) {
                    return Err(TaxError::OverlappingSlabs(self.id));
                }
            }
        }
        Ok(())
    }
}

/// Inputs for computing the taxes of one posting.
#[derive(Debug, Clone)]
pub struct TaxContext {
    /// Posting date the effective range is checked against.
    pub date: NaiveDate,
    /// Category flag to match. `None` means the posting is never taxed.
    pub category: Option<TaxableCategory>,
    /// Undiscounted amount.
    pub amount: Decimal,
    /// Discount already applied to the posting.
    pub discount: Decimal,
    /// Prior occurrence counts per tax, for `exempt_after`.
    pub prior_occurrences: HashMap<TaxRateId, u32>,
}

/// One applied tax, persisted as a `folio_transaction_taxes` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    /// The tax rate that produced this line.
    pub tax_rate_id: TaxRateId,
    /// Tax name at posting time.
    pub name: String,
    /// Rounded tax amount.
    pub tax_amount: Decimal,
    /// Base the amount was computed from.
    pub taxable_amount: Decimal,
    /// Percentage applied; zero for fixed-amount taxes.
    pub rate_percentage: Decimal,
    /// Posting type at posting time.
    pub posting_type: PostingType,
}

/// Ordered tax lines for one posting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxComputation {
    /// Lines in dependency order.
    pub lines: Vec<TaxLine>,
    /// Sum of line amounts.
    pub total: Decimal,
    /// Sum of the percentages of percentage and slab lines.
    pub aggregate_rate: Decimal,
}

impl TaxComputation {
    /// Returns true if no tax applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
