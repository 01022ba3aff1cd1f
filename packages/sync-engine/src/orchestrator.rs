//! Sync orchestration: one run end to end.
//!
//! A run moves idle -> running -> {success, error}. Per-portal and per-job
//! failures are contained and counted; only a source-read failure (or an
//! orchestration bug) escalates to a run-level error. `sync_jobs` never
//! returns an error: callers distinguish outcomes via the summary status.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::audit::{AuditStore, JobResultRecord};
use crate::config::{SyncConfig, SyncSettings};
use crate::crypto::PayloadEncryptor;
use crate::model::{PortalStats, Provenance, RawJob, SyncStatus, SyncSummary};
use crate::normalize::normalize;
use crate::portal::{build_portals, PortalAdapter};
use crate::source::{JobSource, SourceRepository};

const ERROR_PREVIEW_CHARS: usize = 500;

/// Politeness delays between batches and individual pushes. Tests zero
/// these out.
#[derive(Debug, Clone, Copy)]
pub struct SyncPacing {
    pub batch_delay: Duration,
    pub job_delay: Duration,
}

impl Default for SyncPacing {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_secs(1),
            job_delay: Duration::from_millis(100),
        }
    }
}

impl SyncPacing {
    pub fn none() -> Self {
        Self {
            batch_delay: Duration::ZERO,
            job_delay: Duration::ZERO,
        }
    }
}

/// Composes source, normalizer, encryptor, portals and audit trail into
/// one sync run.
pub struct SyncOrchestrator {
    source: Arc<dyn JobSource>,
    audit: AuditStore,
    portals: Vec<Box<dyn PortalAdapter>>,
    encryptor: Option<PayloadEncryptor>,
    provenance: Provenance,
    settings: SyncSettings,
    pacing: SyncPacing,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn JobSource>,
        audit: AuditStore,
        portals: Vec<Box<dyn PortalAdapter>>,
        encryptor: Option<PayloadEncryptor>,
        provenance: Provenance,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            audit,
            portals,
            encryptor,
            provenance,
            settings,
            pacing: SyncPacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: SyncPacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Run one synchronization.
    ///
    /// `incremental` bounds the window to `now - sync_interval_minutes`;
    /// otherwise the whole store is scanned. An empty fetch finalizes the
    /// run as a zero-count success, not an error.
    pub async fn sync_jobs(&self, limit: Option<i64>, incremental: bool) -> SyncSummary {
        let started_at = Utc::now();

        if let Err(e) = self.audit.ensure_schema().await {
            tracing::warn!(error = %e, "failed to ensure audit schema, continuing without audit rows");
        }

        let run_id = match self.audit.create_run(started_at, incremental).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "failed to create sync run row");
                None
            }
        };

        let since = if incremental {
            let window = chrono::Duration::minutes(self.settings.sync_interval_minutes as i64);
            let since = started_at - window;
            tracing::info!(%since, "performing incremental sync");
            Some(since)
        } else {
            tracing::info!("performing full sync");
            None
        };

        let raw_jobs = match self.source.fetch_jobs(limit, since).await {
            Ok(jobs) => jobs,
            Err(e) => {
                let message = error_preview(&e.to_string());
                tracing::error!(error = %message, "sync failed: source read error");
                self.finish_run(run_id, SyncStatus::Error, 0, 0, Some(&message))
                    .await;
                return SyncSummary::failed(started_at, message);
            }
        };

        if raw_jobs.is_empty() {
            tracing::info!("no new jobs to sync");
            self.finish_run(run_id, SyncStatus::Success, 0, 0, None).await;
            return SyncSummary::success(started_at, 0, 0, BTreeMap::new());
        }

        let jobs_fetched = raw_jobs.len();
        let mut portal_stats = BTreeMap::new();
        let mut total_synced = 0;

        // Portals are independent: one failing wholesale must not touch
        // the others' delivery or counters.
        for adapter in &self.portals {
            tracing::info!(portal = %adapter.name(), jobs = jobs_fetched, "syncing jobs to portal");
            let stats = self.sync_portal(run_id, adapter.as_ref(), &raw_jobs).await;
            tracing::info!(
                portal = %adapter.name(),
                success = stats.success,
                failed = stats.failed,
                "portal sync finished"
            );
            total_synced += stats.success;
            portal_stats.insert(adapter.name().to_string(), stats);
        }

        self.finish_run(
            run_id,
            SyncStatus::Success,
            jobs_fetched as i64,
            total_synced as i64,
            None,
        )
        .await;

        tracing::info!(
            jobs_fetched,
            total_synced,
            "sync completed"
        );

        SyncSummary::success(started_at, jobs_fetched, total_synced, portal_stats)
    }

    async fn sync_portal(
        &self,
        run_id: Option<i64>,
        adapter: &dyn PortalAdapter,
        raw_jobs: &[RawJob],
    ) -> PortalStats {
        let batch_size = self.settings.batch_size.max(1);

        let portal_result_id = match run_id {
            Some(rid) => self
                .audit
                .create_portal_result(rid, adapter.name(), adapter.target_url(), batch_size as i64)
                .await
                .map_err(|e| {
                    tracing::warn!(portal = %adapter.name(), error = %e, "failed to create portal result row")
                })
                .ok(),
            None => None,
        };

        let mut success = 0usize;
        let mut failed = 0usize;

        for (batch_index, batch) in raw_jobs.chunks(batch_size).enumerate() {
            if batch_index > 0 && !self.pacing.batch_delay.is_zero() {
                tokio::time::sleep(self.pacing.batch_delay).await;
            }

            for (job_index, raw) in batch.iter().enumerate() {
                if job_index > 0 && !self.pacing.job_delay.is_zero() {
                    tokio::time::sleep(self.pacing.job_delay).await;
                }

                let record = self.deliver_one(adapter, raw).await;
                if record.was_success {
                    success += 1;
                } else {
                    failed += 1;
                }

                if let (Some(rid), Some(pid)) = (run_id, portal_result_id) {
                    if let Err(e) = self.audit.record_job_result(rid, pid, &record).await {
                        tracing::warn!(
                            portal = %adapter.name(),
                            job_id = %record.job_id,
                            error = %e,
                            "failed to record job result"
                        );
                    }
                }
            }
        }

        let success_rate = success as f64 / raw_jobs.len() as f64;

        if let (Some(_), Some(pid)) = (run_id, portal_result_id) {
            if let Err(e) = self
                .audit
                .finalize_portal_result(pid, success as i64, failed as i64, success_rate)
                .await
            {
                tracing::warn!(portal = %adapter.name(), error = %e, "failed to finalize portal result");
            }
        }

        PortalStats {
            success,
            failed,
            success_rate,
        }
    }

    /// Normalize, transform, optionally encrypt and push a single job.
    async fn deliver_one(&self, adapter: &dyn PortalAdapter, raw: &RawJob) -> JobResultRecord {
        let canonical = normalize(raw.clone(), &self.provenance);
        let job_id = canonical.id.clone();

        let payload = match adapter.transform(&canonical) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    portal = %adapter.name(),
                    job_id = %job_id,
                    error = %e,
                    "transform failed, job skipped for this portal"
                );
                return JobResultRecord {
                    job_id,
                    request_url: adapter.target_url().map(str::to_string),
                    was_success: false,
                    error: Some(error_preview(&e.to_string())),
                    ..Default::default()
                };
            }
        };

        let wire_payload = self.seal(&job_id, payload);
        let outcome = adapter.push(&wire_payload).await;

        JobResultRecord {
            job_id,
            request_url: adapter.target_url().map(str::to_string),
            request_headers: adapter.audit_headers(),
            request_payload: serde_json::to_string(&wire_payload).ok(),
            response_status: outcome.status.map(i64::from),
            response_body: outcome.response_body,
            was_success: outcome.success,
            error: outcome.error,
        }
    }

    /// Encrypt when configured; an encryption hiccup downgrades that job to
    /// plaintext rather than failing it.
    fn seal(&self, job_id: &str, payload: Value) -> Value {
        let Some(encryptor) = &self.encryptor else {
            return payload;
        };

        match encryptor.encrypt(&payload) {
            Ok(envelope) => serde_json::to_value(envelope).unwrap_or(payload),
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "encryption failed, sending plaintext");
                payload
            }
        }
    }

    async fn finish_run(
        &self,
        run_id: Option<i64>,
        status: SyncStatus,
        jobs_fetched: i64,
        total_synced: i64,
        error_message: Option<&str>,
    ) {
        if let Some(rid) = run_id {
            if let Err(e) = self
                .audit
                .finish_run(rid, status, jobs_fetched, total_synced, error_message)
                .await
            {
                tracing::warn!(error = %e, "failed to finalize sync run row");
            }
        }
    }
}

fn error_preview(message: &str) -> String {
    crate::portal::truncate(message, ERROR_PREVIEW_CHARS)
}

/// Operator entrypoint: owns config-to-components wiring and runs one sync.
///
/// Connects to the source per run and closes it afterwards, so a store
/// outage surfaces as an error-status summary, never as a panic or a stuck
/// process.
pub struct SyncEngine {
    config: SyncConfig,
    provenance: Provenance,
    pacing: SyncPacing,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            provenance: Provenance::current(),
            pacing: SyncPacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: SyncPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one synchronization. `full` forces a whole-store scan; otherwise
    /// the configured incremental behavior applies. The summary's `status`
    /// field is the sole success/error signal.
    pub async fn run(&self, limit: Option<i64>, full: bool) -> SyncSummary {
        let started_at = Utc::now();
        let incremental = !full && self.config.sync.incremental;

        let repository = match SourceRepository::connect(&self.config.database).await {
            Ok(repository) => Arc::new(repository),
            Err(e) => {
                let message = error_preview(&e.to_string());
                tracing::error!(error = %message, "sync failed: cannot connect to source store");
                return SyncSummary::failed(started_at, message);
            }
        };

        let audit = AuditStore::new(repository.pool().clone());
        let portals = build_portals(&self.config);
        let encryptor = PayloadEncryptor::from_key(self.config.encryption.key.as_deref());

        let orchestrator = SyncOrchestrator::new(
            repository.clone(),
            audit,
            portals,
            encryptor,
            self.provenance.clone(),
            self.config.sync.clone(),
        )
        .with_pacing(self.pacing);

        let summary = orchestrator.sync_jobs(limit, incremental).await;
        repository.close().await;
        summary
    }
}
