//! Void planning.
//!
//! A void never mutates the original amounts. The original is marked
//! `voided` and a balancing `void` entry carrying the negated gross is
//! appended, so replay and the incremental balance agree.

use chrono::NaiveDate;
use innkeep_shared::types::{FolioId, FolioTransactionId};
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::hook::{StatusChange, TransactionStatusHook};
use super::posting::FolioService;
use super::types::{FolioSnapshot, FolioStatus, TransactionStatus, TransactionType};

/// The transaction a void targets, as read under the folio lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoidTarget {
    /// Transaction ID.
    pub id: FolioTransactionId,
    /// Folio the transaction was posted to.
    pub folio_id: FolioId,
    /// Per-hotel transaction number.
    pub transaction_number: i64,
    /// Current status.
    pub status: TransactionStatus,
    /// Whether the target is itself a balancing entry.
    pub is_balancing_entry: bool,
    /// Signed effect on the balance.
    pub gross_amount: Decimal,
}

/// The balancing entry and folio update for one void.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoidPlan {
    /// Transaction being voided.
    pub reverses_transaction_id: FolioTransactionId,
    /// Amount, net and gross of the balancing entry.
    pub balancing_amount: Decimal,
    /// Debit or credit of the balancing entry.
    pub transaction_type: TransactionType,
    /// Trimmed reason stamped on the original.
    pub reason: String,
    /// Description of the balancing entry.
    pub description: String,
    /// Balance read under lock.
    pub previous_balance: Decimal,
    /// Balance after the balancing entry.
    pub balance_after: Decimal,
    /// Status transition decided by the hook.
    pub status_change: Option<StatusChange>,
    /// Business date stamped on the balancing entry.
    pub working_date: NaiveDate,
}

impl VoidPlan {
    /// Folio status after the void.
    #[must_use]
    pub fn resulting_status(&self, current: FolioStatus) -> FolioStatus {
        self.status_change.map_or(current, |c| c.to)
    }
}

impl FolioService {
    /// Validate a void and plan its balancing entry.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the reason is empty, the folio is not postable,
    /// or the target is already voided, a balancing entry, or not posted.
    pub fn prepare_void(
        folio: &FolioSnapshot,
        target: &VoidTarget,
        reason: &str,
        working_date: NaiveDate,
    ) -> Result<VoidPlan, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::VoidReasonRequired);
        }
        if target.folio_id != folio.id {
            return Err(LedgerError::FolioMismatch {
                transaction_id: target.id,
                folio_id: folio.id,
            });
        }
        if !folio.status.is_postable() {
            return Err(LedgerError::FolioNotPostable {
                folio_id: folio.id,
                status: folio.status,
            });
        }
        if target.status == TransactionStatus::Voided {
            return Err(LedgerError::AlreadyVoided(target.id));
        }
        if target.is_balancing_entry {
            return Err(LedgerError::CannotVoidBalancingEntry(target.id));
        }
        if !target.status.affects_balance() {
            return Err(LedgerError::CannotVoidStatus {
                transaction_id: target.id,
                status: target.status,
            });
        }

        let balancing_amount = -target.gross_amount;
        let balance_after = folio.balance + balancing_amount;

        Ok(VoidPlan {
            reverses_transaction_id: target.id,
            balancing_amount,
            transaction_type: TransactionType::for_amount(balancing_amount),
            reason: reason.to_string(),
            description: format!("Void of #{}: {reason}", target.transaction_number),
            previous_balance: folio.balance,
            balance_after,
            status_change: TransactionStatusHook::evaluate(folio.status, balance_after),
            working_date,
        })
    }
}
