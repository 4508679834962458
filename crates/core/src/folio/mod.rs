//! Folio ledger logic.
//!
//! This module implements the pure side of the folio ledger:
//! - Folio and transaction status/category types
//! - Posting math (discount, tax, service charge, net/gross, running balance)
//! - The transaction status hook closing and reopening folios
//! - Void planning with an explicit balancing entry
//! - Balance replay for consistency checks and repair
//!
//! Storage and locking live in `innkeep-db`; every function here is
//! deterministic over its inputs.

pub mod error;
pub mod hook;
pub mod posting;
pub mod replay;
pub mod types;
pub mod void;

#[cfg(test)]
mod ledger_props;

pub use error::LedgerError;
pub use hook::{StatusChange, TransactionStatusHook};
pub use posting::{FolioService, PostingPlan};
pub use replay::{LedgerEntry, Reconciliation};
pub use types::{
    Direction, FolioSnapshot, FolioStatus, FolioWorkflowStatus, PostingInput, PostingModifier,
    TransactionCategory, TransactionStatus, TransactionType,
};
pub use void::{VoidPlan, VoidTarget};
