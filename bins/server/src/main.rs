//! Innkeep worker process.
//!
//! Runs the job pool, the expired-lease sweeper and (when enabled) the night
//! audit scheduler until ctrl-c. In-flight jobs finish their current
//! reservation room and are returned to the queue.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use innkeep_db::connect_with;
use innkeep_shared::AppConfig;
use innkeep_worker::{LogReportSink, WorkerContext, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    let db = connect_with(&config.database).await?;
    info!(max_connections = config.database.max_connections, "Connected to database");

    let context = WorkerContext::new(&db, &config, Arc::new(LogReportSink));
    let shutdown = CancellationToken::new();

    let pool = context.pool();
    let sweeper = context.sweeper();
    let scheduler = context.scheduler();

    let mut tasks = tokio::task::JoinSet::new();
    {
        let shutdown = shutdown.clone();
        tasks.spawn(async move { pool.run(shutdown).await });
    }
    {
        let shutdown = shutdown.clone();
        tasks.spawn(async move { sweeper.run(shutdown).await });
    }
    if let Some(scheduler) = scheduler {
        let shutdown = shutdown.clone();
        tasks.spawn(async move { scheduler.run(shutdown).await });
    } else {
        info!("Night audit scheduler disabled");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown.cancel();

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "Background task panicked");
        }
    }
    db.close().await?;
    info!("Worker stopped");
    Ok(())
}
