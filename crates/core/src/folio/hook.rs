//! Transaction status hook.
//!
//! Runs after every posting, void or repair, inside the same storage
//! transaction, so balance and status never disagree.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::FolioStatus;

/// A folio status transition decided by the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Status before.
    pub from: FolioStatus,
    /// Status after.
    pub to: FolioStatus,
}

/// Closes settled folios and reopens closed folios that owe money again.
pub struct TransactionStatusHook;

impl TransactionStatusHook {
    /// Decides the status transition for a recomputed balance.
    ///
    /// - open, balance == 0 → closed
    /// - closed, balance > 0 → open
    ///
    /// A negative balance (guest in credit) and folios that are not open or
    /// closed are left untouched.
    #[must_use]
    pub fn evaluate(status: FolioStatus, balance: Decimal) -> Option<StatusChange> {
        let to = match status {
            FolioStatus::Open if balance.is_zero() => FolioStatus::Closed,
            FolioStatus::Closed if balance > Decimal::ZERO => FolioStatus::Open,
            _ => return None,
        };
        Some(StatusChange { from: status, to })
    }

    /// Returns the status after applying [`Self::evaluate`].
    #[must_use]
    pub fn resulting_status(status: FolioStatus, balance: Decimal) -> FolioStatus {
        Self::evaluate(status, balance).map_or(status, |change| change.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(FolioStatus::Open, dec!(0), Some(FolioStatus::Closed))]
    #[case(FolioStatus::Open, dec!(10), None)]
    #[case(FolioStatus::Open, dec!(-5), None)]
    #[case(FolioStatus::Closed, dec!(10), Some(FolioStatus::Open))]
    #[case(FolioStatus::Closed, dec!(0), None)]
    #[case(FolioStatus::Closed, dec!(-5), None)]
    #[case(FolioStatus::Disputed, dec!(0), None)]
    #[case(FolioStatus::Transferred, dec!(10), None)]
    #[case(FolioStatus::Voided, dec!(0), None)]
    fn test_evaluate(
        #[case] status: FolioStatus,
        #[case] balance: Decimal,
        #[case] expected: Option<FolioStatus>,
    ) {
        assert_eq!(
            TransactionStatusHook::evaluate(status, balance).map(|c| c.to),
            expected
        );
    }
}
