//! Long-running scheduler daemon.
//!
//! Runs incremental and full syncs on their configured intervals until
//! SIGINT. Shutdown is graceful: an in-flight sync finishes before the
//! process exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sync_core::{SyncConfig, SyncEngine, SyncScheduler};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "job-sync-scheduler")]
#[command(about = "Run job data syncs on a schedule")]
struct Cli {
    /// Path to the JSON config file (defaults to sync_config.json, then env)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Skip the immediate sync normally run at startup
    #[arg(long)]
    no_initial_sync: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sync_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config =
        SyncConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.no_initial_sync {
        config.scheduler.run_initial_sync = false;
    }
    tracing::info!("Configuration loaded");

    let scheduler_config = config.scheduler.clone();
    let engine = Arc::new(SyncEngine::new(config));
    let scheduler = SyncScheduler::new(engine, scheduler_config);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("received interrupt, shutting down");
    shutdown.cancel();

    handle.await.context("Scheduler task panicked")?;
    tracing::info!("scheduler exited cleanly");

    Ok(())
}
