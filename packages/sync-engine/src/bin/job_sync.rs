//! One-shot sync CLI.
//!
//! Runs a single synchronization and prints a summary. The exit code is
//! always 0 once the run starts; the summary's `status` field carries the
//! outcome, matching the sync contract.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sync_core::audit::AuditStore;
use sync_core::source::SourceRepository;
use sync_core::{SyncConfig, SyncEngine, SyncStatus};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "job-sync")]
#[command(about = "Synchronize job data from the source store to configured portals")]
struct Cli {
    /// Path to the JSON config file (defaults to sync_config.json, then env)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Cap the number of jobs fetched from the source
    #[arg(long)]
    limit: Option<i64>,

    /// Force a full sync instead of the configured incremental window
    #[arg(long)]
    full: bool,

    /// Print the last N recorded runs from the audit trail instead of syncing
    #[arg(long, value_name = "N")]
    history: Option<i64>,

    /// Write the JSON summary to this file as well
    #[arg(long, short)]
    output: Option<PathBuf>,
}

async fn print_history(config: &SyncConfig, count: i64) -> Result<()> {
    let repository = SourceRepository::connect(&config.database).await?;
    let audit = AuditStore::new(repository.pool().clone());
    audit.ensure_schema().await?;

    let runs = audit.recent_runs(count).await?;
    if runs.is_empty() {
        println!("No sync runs recorded");
    }
    for run in runs {
        let finished = run
            .finished_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "run {} [{}] {} started {} finished {}: {} fetched, {} synced",
            run.id,
            run.status,
            if run.incremental { "incremental" } else { "full" },
            run.started_at.to_rfc3339(),
            finished,
            run.jobs_fetched,
            run.total_synced,
        );
        if let Some(error) = &run.error_message {
            println!("  error: {error}");
        }
        for portal in audit.portal_results_for_run(run.id).await? {
            println!(
                "  portal {}: {} ok, {} failed ({:.0}% success)",
                portal.portal_name,
                portal.success_count,
                portal.failure_count,
                portal.success_rate * 100.0
            );
        }
        for job in audit.failed_job_results(run.id).await? {
            println!(
                "  failed job {}: status {:?} {}",
                job.job_id,
                job.response_status,
                job.error.as_deref().unwrap_or("")
            );
        }
    }

    repository.close().await;
    Ok(())
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

    let config = SyncConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    if let Some(count) = cli.history {
        return print_history(&config, count).await;
    }

    let engine = SyncEngine::new(config);
    let summary = engine.run(cli.limit, cli.full).await;

    println!();
    println!("Sync summary");
    println!("  status:       {}", summary.status.as_str());
    println!("  jobs fetched: {}", summary.jobs_fetched);
    println!("  total synced: {}", summary.total_synced);
    println!("  duration:     {:.2}s", summary.duration_seconds);
    for (name, stats) in &summary.portals {
        println!(
            "  portal {name}: {} ok, {} failed ({:.0}% success)",
            stats.success,
            stats.failed,
            stats.success_rate * 100.0
        );
    }
    if let Some(error) = &summary.error {
        println!("  error:        {error}");
    }

    if let Some(path) = &cli.output {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        tracing::info!(path = %path.display(), "summary written");
    }

    if summary.status == SyncStatus::Error {
        tracing::error!("sync finished with errors");
    }

    Ok(())
}
