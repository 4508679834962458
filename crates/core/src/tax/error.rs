//! Tax configuration errors.
//!
//! Every variant is a configuration problem detected when a hotel's tax
//! graph is built, so it is rejected before any posting happens.

use chrono::NaiveDate;
use innkeep_shared::types::{HotelId, TaxRateId};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors raised while validating tax configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxError {
    /// `tax_apply_after` forms a cycle.
    #[error("Circular tax dependency: {}", format_cycle(.cycle))]
    CircularDependency {
        /// Members of the cycle, in dependency order.
        cycle: Vec<TaxRateId>,
    },

    /// A dependency names a tax rate that does not exist for the hotel.
    #[error("Tax rate {tax_rate_id} depends on unknown tax rate {depends_on}")]
    UnknownDependency {
        /// The dependent tax.
        tax_rate_id: TaxRateId,
        /// The missing dependency.
        depends_on: TaxRateId,
    },

    /// A tax lists itself in `tax_apply_after`.
    #[error("Tax rate {0} depends on itself")]
    SelfDependency(TaxRateId),

    /// A tax rate belongs to another hotel.
    #[error("Tax rate {tax_rate_id} belongs to hotel {actual}, expected {expected}")]
    CrossHotel {
        /// The offending tax.
        tax_rate_id: TaxRateId,
        /// The hotel being configured.
        expected: HotelId,
        /// The hotel the tax belongs to.
        actual: HotelId,
    },

    /// Rate or slab percentage is negative.
    #[error("Tax rate {0} has a negative rate")]
    NegativeRate(TaxRateId),

    /// `end_date` precedes `effective_date`.
    #[error("Tax rate {tax_rate_id} ends {end_date} before it starts {effective_date}")]
    InvalidEffectiveRange {
        /// The offending tax.
        tax_rate_id: TaxRateId,
        /// Start of the range.
        effective_date: NaiveDate,
        /// End of the range.
        end_date: NaiveDate,
    },

    /// A slab tax has no slabs.
    #[error("Slab tax rate {0} has no slabs")]
    MissingSlabs(TaxRateId),

    /// A slab has `max_amount <= min_amount`.
    #[error("Slab tax rate {0} has an empty slab")]
    InvalidSlab(TaxRateId),

    /// Two slabs of the same tax overlap.
    #[error("Slab tax rate {0} has overlapping slabs")]
    OverlappingSlabs(TaxRateId),

    /// Unrecognized `posting_type` value in storage.
    #[error("Unknown tax posting type: {0}")]
    UnknownPostingType(String),

    /// Unrecognized `apply_tax` value in storage.
    #[error("Unknown apply_tax value: {0}")]
    UnknownApplyTax(String),
}

fn format_cycle(cycle: &[TaxRateId]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl TaxError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::CircularDependency { .. } => "CIRCULAR_TAX_DEPENDENCY",
            Self::UnknownDependency { .. } => "UNKNOWN_TAX_DEPENDENCY",
            Self::SelfDependency(_) => "SELF_TAX_DEPENDENCY",
            Self::CrossHotel { .. } => "CROSS_HOTEL_TAX_RATE",
            Self::NegativeRate(_) => "NEGATIVE_TAX_RATE",
            Self::InvalidEffectiveRange { .. } => "INVALID_TAX_EFFECTIVE_RANGE",
            Self::MissingSlabs(_) => "MISSING_TAX_SLABS",
            Self::InvalidSlab(_) => "INVALID_TAX_SLAB",
            Self::OverlappingSlabs(_) => "OVERLAPPING_TAX_SLABS",
            Self::UnknownPostingType(_) => "UNKNOWN_TAX_POSTING_TYPE",
            Self::UnknownApplyTax(_) => "UNKNOWN_APPLY_TAX",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        422
    }

    /// Configuration errors are never retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}
