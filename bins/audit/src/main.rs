//! Night audit operations CLI.
//!
//! Usage:
//!   innkeep-audit backfill --hotel-id <UUID> --start <DATE> --end <DATE>
//!   innkeep-audit dispatch --hotel-id <UUID> --audit-date <DATE> [--user-id <UUID>] [--skip-report]

use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use innkeep_core::jobs::{JobPayload, JobStatus, NightAuditPayload};
use innkeep_db::connect_with;
use innkeep_shared::AppConfig;
use innkeep_shared::types::{HotelId, UserId};
use innkeep_worker::{LogReportSink, WorkerContext, init_tracing};

#[derive(Parser)]
#[command(name = "innkeep-audit")]
#[command(about = "Night audit operations for Innkeep")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-runs past days in backfill mode with reporting suppressed.
    Backfill {
        #[arg(long)]
        hotel_id: Uuid,
        /// First day, inclusive (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,
        /// Last day, inclusive (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,
    },
    /// Enqueues a live NIGHT_AUDIT job and dispatches it in this process.
    Dispatch {
        #[arg(long)]
        hotel_id: Uuid,
        #[arg(long)]
        audit_date: NaiveDate,
        #[arg(long)]
        user_id: Option<Uuid>,
        #[arg(long, default_value_t = false)]
        skip_report: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    init_tracing(&config.logging);
    let db = connect_with(&config.database).await?;
    let context = WorkerContext::new(&db, &config, Arc::new(LogReportSink));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; stopping after the current reservation room");
                cancel.cancel();
            }
        });
    }

    let code = match cli.command {
        Command::Backfill {
            hotel_id,
            start,
            end,
        } => backfill(&context, HotelId::from_uuid(hotel_id), start, end, &cancel).await?,
        Command::Dispatch {
            hotel_id,
            audit_date,
            user_id,
            skip_report,
        } => {
            let payload = JobPayload::NightAudit(NightAuditPayload {
                audit_date,
                hotel_id: HotelId::from_uuid(hotel_id),
                user_id: user_id.map(UserId::from_uuid),
                skip_report,
            });
            dispatch(&context, &payload, &cancel).await?
        }
    };

    db.close().await?;
    Ok(code)
}

async fn backfill(
    context: &WorkerContext,
    hotel_id: HotelId,
    start: NaiveDate,
    end: NaiveDate,
    cancel: &CancellationToken,
) -> anyhow::Result<ExitCode> {
    let days = context.engine.backfill(hotel_id, start, end, cancel).await?;

    let mut failed = 0;
    for day in &days {
        match &day.result {
            Ok(report) => println!(
                "{}  ok  posted={} skipped={} no_shows={} failures={}",
                day.date,
                report.room_charges_posted,
                report.room_charges_skipped,
                report.no_shows_marked,
                report.failures.len()
            ),
            Err(e) => {
                failed += 1;
                println!("{}  failed: {e}", day.date);
            }
        }
    }
    println!(
        "{} day(s): {} ok, {failed} failed",
        days.len(),
        days.len() - failed
    );

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn dispatch(
    context: &WorkerContext,
    payload: &JobPayload,
    cancel: &CancellationToken,
) -> anyhow::Result<ExitCode> {
    let job = context.orchestrator.enqueue(payload).await?;
    let job = context.orchestrator.dispatch(job.id, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&job)?);

    Ok(if job.status == JobStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
