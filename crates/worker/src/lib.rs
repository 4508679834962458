//! Job orchestration for Innkeep.
//!
//! This crate provides:
//! - The `JobStore` seam over the durable jobs table, plus an in-memory store
//! - Job handlers for `NIGHT_AUDIT` and `DAILY_REPORT`
//! - The retry orchestrator (`dispatch`, `run_next`)
//! - The worker pool, the expired-lease sweeper and the audit scheduler
//! - Process wiring and tracing setup for the binaries

pub mod context;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod pool;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod telemetry;

pub use context::WorkerContext;
pub use error::HandlerError;
pub use handlers::{DailyReportHandler, JobHandler, NightAuditHandler};
pub use orchestrator::RetryOrchestrator;
pub use pool::{LeaseSweeper, WorkerPool};
pub use report::{DailyReport, LogReportSink, ReportSink};
pub use scheduler::{AuditScheduler, audit_due};
pub use store::{JobStore, MemoryJobStore};
pub use telemetry::init_tracing;
