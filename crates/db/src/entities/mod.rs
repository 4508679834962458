//! `SeaORM` entity definitions.
//!
//! Status-like columns are stored as `TEXT` with `CHECK` constraints and
//! mapped through the `as_str`/`FromStr` pairs of the matching
//! `innkeep-core` enums.

pub mod daily_summary_facts;
pub mod folio_transaction_taxes;
pub mod folio_transactions;
pub mod folios;
pub mod hotel_transaction_sequences;
pub mod hotels;
pub mod jobs;
pub mod reservation_rooms;
pub mod reservations;
pub mod tax_rate_dependencies;
pub mod tax_rate_slabs;
pub mod tax_rates;
