//! Long-running sync scheduler.
//!
//! Drives the engine on fixed cadences (incremental, full, status report)
//! until cancelled. A sync failure never stops the scheduler: consecutive
//! failures are counted and, once the threshold is reached, the loop backs
//! off for a configured pause before resuming the normal cadence.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::model::SyncStatus;
use crate::orchestrator::SyncEngine;

/// Cadence bookkeeping, kept separate from the run loop so the failure
/// policy can be tested without time.
#[derive(Debug, Clone)]
struct SchedulerState {
    started_at: DateTime<Utc>,
    failure_count: u32,
    total_runs: u64,
    last_sync_time: Option<DateTime<Utc>>,
    last_full_sync_time: Option<DateTime<Utc>>,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            failure_count: 0,
            total_runs: 0,
            last_sync_time: None,
            last_full_sync_time: None,
        }
    }

    /// Record one finished run. Success resets the consecutive-failure
    /// counter; failure increments it.
    fn note_outcome(&mut self, success: bool, full: bool, at: DateTime<Utc>) {
        self.total_runs += 1;
        if success {
            self.failure_count = 0;
            self.last_sync_time = Some(at);
            if full {
                self.last_full_sync_time = Some(at);
            }
        } else {
            self.failure_count += 1;
        }
    }

    fn should_back_off(&self, max_failures: u32) -> bool {
        max_failures > 0 && self.failure_count >= max_failures
    }
}

/// Runs incremental and full syncs on their configured intervals until the
/// cancellation token fires. In-flight runs complete before shutdown.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    config: SchedulerConfig,
    state: SchedulerState,
}

impl SyncScheduler {
    pub fn new(engine: Arc<SyncEngine>, config: SchedulerConfig) -> Self {
        Self {
            engine,
            config,
            state: SchedulerState::new(),
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            incremental_interval_minutes = self.config.incremental_interval_minutes,
            full_sync_interval_hours = self.config.full_sync_interval_hours,
            max_failures = self.config.max_failures,
            "sync scheduler started"
        );

        let incremental_period =
            Duration::from_secs(self.config.incremental_interval_minutes.max(1) * 60);
        let full_period = Duration::from_secs(self.config.full_sync_interval_hours.max(1) * 3600);
        let status_period =
            Duration::from_secs(self.config.status_report_interval_hours.max(1) * 3600);

        // interval_at skips the immediate first tick each interval fires.
        let start = tokio::time::Instant::now();
        let mut incremental_ticks = tokio::time::interval_at(start + incremental_period, incremental_period);
        let mut full_ticks = tokio::time::interval_at(start + full_period, full_period);
        let mut status_ticks = tokio::time::interval_at(start + status_period, status_period);
        incremental_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        full_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        status_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if self.config.run_initial_sync {
            tracing::info!("running initial sync");
            self.run_once(false, &shutdown).await;
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested, stopping sync scheduler");
                    break;
                }
                _ = incremental_ticks.tick() => {
                    self.run_once(false, &shutdown).await;
                }
                _ = full_ticks.tick() => {
                    self.run_once(true, &shutdown).await;
                }
                _ = status_ticks.tick() => {
                    self.status_report();
                }
            }
        }

        tracing::info!(total_runs = self.state.total_runs, "sync scheduler stopped");
    }

    async fn run_once(&mut self, full: bool, shutdown: &CancellationToken) {
        if self.state.should_back_off(self.config.max_failures) {
            let backoff = Duration::from_secs(self.config.failure_backoff_minutes.max(1) * 60);
            tracing::error!(
                failures = self.state.failure_count,
                backoff_minutes = self.config.failure_backoff_minutes,
                "too many consecutive sync failures, backing off"
            );
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(backoff) => {}
            }
            self.state.failure_count = 0;
        }

        let kind = if full { "full" } else { "incremental" };
        tracing::info!(kind, "scheduled sync starting");

        let summary = self.engine.run(None, full).await;
        let success = summary.status == SyncStatus::Success;
        self.state.note_outcome(success, full, summary.finished_at);

        if success {
            tracing::info!(
                kind,
                jobs_fetched = summary.jobs_fetched,
                total_synced = summary.total_synced,
                duration_seconds = summary.duration_seconds,
                "scheduled sync finished"
            );
        } else {
            tracing::error!(
                kind,
                failures = self.state.failure_count,
                error = summary.error.as_deref().unwrap_or("unknown"),
                "scheduled sync failed"
            );
        }
    }

    fn status_report(&self) {
        let uptime_minutes = (Utc::now() - self.state.started_at).num_minutes();
        let enabled_portals = self.engine.config().enabled_portals();
        tracing::info!(
            uptime_minutes,
            total_runs = self.state.total_runs,
            consecutive_failures = self.state.failure_count,
            last_sync = ?self.state.last_sync_time,
            last_full_sync = ?self.state.last_full_sync_time,
            portals = ?enabled_portals,
            "scheduler status"
        );
    }
}
