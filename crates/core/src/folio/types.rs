//! Folio domain types.

use chrono::NaiveDate;
use innkeep_shared::types::{FolioId, GuestId, HotelId, ReservationRoomId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use crate::tax::TaxableCategory;

/// Folio status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolioStatus {
    /// Accepting postings, balance outstanding or new.
    Open,
    /// Settled at zero balance; reopens on a positive balance.
    Closed,
    /// Moved to another folio.
    Transferred,
    /// Under dispute; postings are frozen.
    Disputed,
    /// Voided at zero balance; terminal.
    Voided,
}

string_enum!(
    FolioStatus,
    LedgerError,
    |value| LedgerError::UnknownValue { field: "folio.status", value };
    {
        Open => "open",
        Closed => "closed",
        Transferred => "transferred",
        Disputed => "disputed",
        Voided => "voided",
    }
);

impl FolioStatus {
    /// Returns true if postings and voids are accepted.
    ///
    /// These are also the only statuses the status hook manages.
    #[must_use]
    pub const fn is_postable(self) -> bool {
        matches!(self, Self::Open | Self::Closed)
    }
}

/// Folio review workflow, independent from the financial status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolioWorkflowStatus {
    /// Being prepared.
    Draft,
    /// In use.
    Active,
    /// Under review.
    Review,
    /// Approved.
    Approved,
    /// Finalized.
    Finalized,
    /// Closed.
    Closed,
}

string_enum!(
    FolioWorkflowStatus,
    LedgerError,
    |value| LedgerError::UnknownValue { field: "folio.workflow_status", value };
    {
        Draft => "draft",
        Active => "active",
        Review => "review",
        Approved => "approved",
        Finalized => "finalized",
        Closed => "closed",
    }
);

/// Effect of a category on the folio balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Increases the balance; amount must be positive.
    Charge,
    /// Decreases the balance; amount is normalised to negative.
    Credit,
    /// Keeps the caller's sign.
    Signed,
}

/// Transaction category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    /// Nightly room charge.
    Room,
    /// Food and beverage, including meal plans.
    FoodAndBeverage,
    /// Other charges.
    Miscellaneous,
    /// Standalone service charge.
    ServiceCharge,
    /// Manually posted tax.
    Tax,
    /// No-show penalty.
    NoShowFee,
    /// Money returned to the guest.
    Refund,
    /// Guest payment.
    Payment,
    /// Standalone discount.
    Discount,
    /// Manual correction in either direction.
    Adjustment,
    /// Balancing entry of a void.
    Void,
    /// Balance moved between folios.
    Transfer,
}

string_enum!(
    TransactionCategory,
    LedgerError,
    |value| LedgerError::UnknownValue { field: "folio_transaction.category", value };
    {
        Room => "room",
        FoodAndBeverage => "food_and_beverage",
        Miscellaneous => "miscellaneous",
        ServiceCharge => "service_charge",
        Tax => "tax",
        NoShowFee => "no_show_fee",
        Refund => "refund",
        Payment => "payment",
        Discount => "discount",
        Adjustment => "adjustment",
        Void => "void",
        Transfer => "transfer",
    }
);

impl TransactionCategory {
    /// Returns the balance direction of the category.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Room
            | Self::FoodAndBeverage
            | Self::Miscellaneous
            | Self::ServiceCharge
            | Self::Tax
            | Self::NoShowFee
            | Self::Refund => Direction::Charge,
            Self::Payment | Self::Discount => Direction::Credit,
            Self::Adjustment | Self::Void | Self::Transfer => Direction::Signed,
        }
    }

    /// Returns the tax flag this category is matched against, if taxable.
    #[must_use]
    pub const fn taxable_category(self) -> Option<TaxableCategory> {
        match self {
            Self::Room => Some(TaxableCategory::RoomRate),
            Self::FoodAndBeverage => Some(TaxableCategory::FoodAndBeverage),
            Self::Miscellaneous | Self::ServiceCharge | Self::NoShowFee => {
                Some(TaxableCategory::Other)
            }
            _ => None,
        }
    }

    /// Returns true if discounts and service charges may be attached.
    #[must_use]
    pub const fn accepts_modifiers(self) -> bool {
        self.taxable_category().is_some()
    }
}

/// Debit or credit, as seen from the folio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Increases what the guest owes.
    Debit,
    /// Decreases what the guest owes.
    Credit,
}

string_enum!(
    TransactionType,
    LedgerError,
    |value| LedgerError::UnknownValue { field: "folio_transaction.transaction_type", value };
    {
        Debit => "debit",
        Credit => "credit",
    }
);

impl TransactionType {
    /// Returns the type matching the sign of a signed amount.
    #[must_use]
    pub fn for_amount(amount: Decimal) -> Self {
        if amount < Decimal::ZERO {
            Self::Credit
        } else {
            Self::Debit
        }
    }
}

/// Folio transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Not yet posted.
    Pending,
    /// Posted.
    Posted,
    /// Voided; offset by a balancing entry.
    Voided,
    /// Moved to another folio.
    Transferred,
    /// Posted but disputed by the guest.
    Disputed,
    /// Refunded.
    Refunded,
    /// Written off.
    WriteOff,
    /// Correction of an earlier entry.
    Correction,
    /// Completed.
    Completed,
    /// Failed before posting.
    Failed,
    /// Cancelled before posting.
    Cancelled,
}

string_enum!(
    TransactionStatus,
    LedgerError,
    |value| LedgerError::UnknownValue { field: "folio_transaction.status", value };
    {
        Pending => "pending",
        Posted => "posted",
        Voided => "voided",
        Transferred => "transferred",
        Disputed => "disputed",
        Refunded => "refunded",
        WriteOff => "write_off",
        Correction => "correction",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
);

impl TransactionStatus {
    /// Returns true if an entry in this status contributes to the folio balance.
    #[must_use]
    pub const fn affects_balance(self) -> bool {
        matches!(
            self,
            Self::Posted | Self::Completed | Self::Correction | Self::Disputed
        )
    }
}

/// Folio state read under lock before a posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolioSnapshot {
    /// Folio ID.
    pub id: FolioId,
    /// Owning hotel.
    pub hotel_id: HotelId,
    /// Current status.
    pub status: FolioStatus,
    /// Incrementally maintained balance.
    pub balance: Decimal,
}

/// A discount or service charge, given as a rate or an amount.
///
/// When both are set, the rate wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingModifier {
    /// Percentage.
    pub rate: Option<Decimal>,
    /// Absolute amount.
    pub amount: Option<Decimal>,
}

impl PostingModifier {
    /// A modifier given as a percentage.
    #[must_use]
    pub const fn rate(rate: Decimal) -> Self {
        Self {
            rate: Some(rate),
            amount: None,
        }
    }

    /// A modifier given as an absolute amount.
    #[must_use]
    pub const fn amount(amount: Decimal) -> Self {
        Self {
            rate: None,
            amount: Some(amount),
        }
    }

    /// Returns true if neither rate nor amount is set.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.rate.is_none() && self.amount.is_none()
    }
}

/// Input for posting one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingInput {
    /// Target folio.
    pub folio_id: FolioId,
    /// Category.
    pub category: TransactionCategory,
    /// Debit or credit; must agree with the category and amount sign.
    pub transaction_type: TransactionType,
    /// Amount before discount, tax and service charge.
    pub amount: Decimal,
    /// Free-text description.
    pub description: Option<String>,
    /// Discount.
    pub discount: PostingModifier,
    /// Service charge, computed on the net amount.
    pub service_charge: PostingModifier,
    /// Reservation room the posting belongs to.
    pub reservation_room_id: Option<ReservationRoomId>,
    /// Guest the posting belongs to.
    pub guest_id: Option<GuestId>,
    /// Business date override; defaults to the hotel's working date.
    pub working_date: Option<NaiveDate>,
    /// Acting user.
    pub created_by: Option<UserId>,
}

impl PostingInput {
    /// Creates an input with no modifiers, references or date override.
    #[must_use]
    pub const fn new(
        folio_id: FolioId,
        category: TransactionCategory,
        transaction_type: TransactionType,
        amount: Decimal,
    ) -> Self {
        Self {
            folio_id,
            category,
            transaction_type,
            amount,
            description: None,
            discount: PostingModifier {
                rate: None,
                amount: None,
            },
            service_charge: PostingModifier {
                rate: None,
                amount: None,
            },
            reservation_room_id: None,
            guest_id: None,
            working_date: None,
            created_by: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the discount.
    #[must_use]
    pub const fn with_discount(mut self, discount: PostingModifier) -> Self {
        self.discount = discount;
        self
    }

    /// Sets the service charge.
    #[must_use]
    pub const fn with_service_charge(mut self, service_charge: PostingModifier) -> Self {
        self.service_charge = service_charge;
        self
    }

    /// Links the posting to a reservation room.
    #[must_use]
    pub const fn for_reservation_room(mut self, reservation_room_id: ReservationRoomId) -> Self {
        self.reservation_room_id = Some(reservation_room_id);
        self
    }

    /// Overrides the business date.
    #[must_use]
    pub const fn on_date(mut self, date: NaiveDate) -> Self {
        self.working_date = Some(date);
        self
    }

    /// Sets the acting user.
    #[must_use]
    pub const fn by(mut self, user_id: UserId) -> Self {
        self.created_by = Some(user_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TransactionCategory::Room, Direction::Charge)]
    #[case(TransactionCategory::Refund, Direction::Charge)]
    #[case(TransactionCategory::Payment, Direction::Credit)]
    #[case(TransactionCategory::Discount, Direction::Credit)]
    #[case(TransactionCategory::Adjustment, Direction::Signed)]
    #[case(TransactionCategory::Void, Direction::Signed)]
    fn test_category_direction(#[case] category: TransactionCategory, #[case] expected: Direction) {
        assert_eq!(category.direction(), expected);
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for category in [
            TransactionCategory::FoodAndBeverage,
            TransactionCategory::NoShowFee,
            TransactionCategory::ServiceCharge,
        ] {
            assert_eq!(category.as_str().parse::<TransactionCategory>().unwrap(), category);
        }
        assert!("minibar".parse::<TransactionCategory>().is_err());
    }

    #[test]
    fn test_only_open_and_closed_are_postable() {
        assert!(FolioStatus::Open.is_postable());
        assert!(FolioStatus::Closed.is_postable());
        assert!(!FolioStatus::Voided.is_postable());
        assert!(!FolioStatus::Transferred.is_postable());
        assert!(!FolioStatus::Disputed.is_postable());
    }

    #[test]
    fn test_voided_does_not_affect_balance() {
        assert!(TransactionStatus::Posted.affects_balance());
        assert!(!TransactionStatus::Voided.affects_balance());
        assert!(!TransactionStatus::Pending.affects_balance());
        assert_eq!(TransactionStatus::WriteOff.as_str(), "write_off");
    }
}
