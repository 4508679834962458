//! Repository abstractions for data access.
//!
//! Repositories own the atomic storage units of the ledger and the audit,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod daily_summary;
pub mod folio;
pub mod hotel;
pub mod job;
pub mod reservation;
pub mod tax_rate;

pub use daily_summary::{DailySummaryRepository, to_summary};
pub use folio::{
    CreateFolioInput, FolioRepository, PostingResult, RecalculationResult, RoomNightOutcome,
    VoidResult,
};
pub use hotel::{CreateHotelInput, HotelError, HotelRepository};
pub use job::JobRepository;
pub use reservation::{NoShowOutcome, ReservationRepository};
pub use tax_rate::{TaxRateError, TaxRateRepository};
