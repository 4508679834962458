//! Balance replay and consistency checks.

use innkeep_shared::types::FolioId;
use rust_decimal::Decimal;
use serde::Serialize;

use super::hook::{StatusChange, TransactionStatusHook};
use super::posting::FolioService;
use super::types::{FolioSnapshot, TransactionStatus};

/// The fields of a stored transaction that replay needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Per-hotel transaction number.
    pub transaction_number: i64,
    /// Current status.
    pub status: TransactionStatus,
    /// Whether the entry is the balancing half of a void.
    pub is_balancing_entry: bool,
    /// Signed effect on the balance.
    pub gross_amount: Decimal,
}

/// Result of comparing the stored balance with a full replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// The folio.
    pub folio_id: FolioId,
    /// Incrementally maintained balance.
    pub stored_balance: Decimal,
    /// Balance from replaying every entry.
    pub replayed_balance: Decimal,
    /// `replayed - stored`.
    pub drift: Decimal,
    /// Status transition for the replayed balance.
    #[serde(skip)]
    pub status_change: Option<StatusChange>,
}

impl Reconciliation {
    /// Returns true if the stored balance matches the replay.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.drift.is_zero()
    }
}

impl FolioService {
    /// Replays entries in transaction-number order.
    ///
    /// Sums the gross of every entry that affects the balance, skipping
    /// voided originals and the balancing entries that offset them.
    #[must_use]
    pub fn replay_balance(entries: &[LedgerEntry]) -> Decimal {
        let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
        ordered.sort_by_key(|e| e.transaction_number);
        ordered
            .into_iter()
            .filter(|e| e.status.affects_balance() && !e.is_balancing_entry)
            .map(|e| e.gross_amount)
            .sum()
    }

    /// Sums every posted entry, letting voided originals and their balancing
    /// entries cancel each other.
    ///
    /// Always equals [`Self::replay_balance`] for a ledger written through
    /// [`Self::prepare_posting`] and [`Self::prepare_void`].
    #[must_use]
    pub fn audit_trail_balance(entries: &[LedgerEntry]) -> Decimal {
        entries
            .iter()
            .filter(|e| e.status.affects_balance() || e.status == TransactionStatus::Voided)
            .map(|e| e.gross_amount)
            .sum()
    }

    /// Compares the stored balance with a replay and decides the hook outcome
    /// for the replayed balance.
    #[must_use]
    pub fn reconcile(folio: &FolioSnapshot, entries: &[LedgerEntry]) -> Reconciliation {
        let replayed_balance = Self::replay_balance(entries);
        Reconciliation {
            folio_id: folio.id,
            stored_balance: folio.balance,
            replayed_balance,
            drift: replayed_balance - folio.balance,
            status_change: TransactionStatusHook::evaluate(folio.status, replayed_balance),
        }
    }
}
