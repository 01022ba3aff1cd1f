//! End-to-end run into a file-sink portal: one shaped JSON line per job.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;

use sync_core::audit::AuditStore;
use sync_core::config::{PortalConfig, SyncSettings};
use sync_core::model::{Provenance, RawJob, SyncStatus};
use sync_core::orchestrator::{SyncOrchestrator, SyncPacing};
use sync_core::portal::{FileSinkPortal, PortalAdapter};
use sync_core::source::{JobSource, SourcePool};
use sync_core::SyncError;

struct StaticSource(Vec<RawJob>);

#[async_trait]
impl JobSource for StaticSource {
    async fn fetch_jobs(
        &self,
        _limit: Option<i64>,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawJob>, SyncError> {
        Ok(self.0.clone())
    }
}

fn raw_job(id: &str, company: &str) -> RawJob {
    RawJob {
        job_id: Some(id.to_string()),
        title: Some("Electrician".to_string()),
        company: Some(company.to_string()),
        experience_level: Some("Senior Level".to_string()),
        created_at: Some("2025-06-01T10:00:00Z".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn run_appends_one_shaped_line_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("jobs.ndjson");

    let portal_config = PortalConfig {
        enabled: true,
        write_to: Some(path.to_string_lossy().into_owned()),
        ..Default::default()
    };
    let sink = FileSinkPortal::new("lan", &path.to_string_lossy(), &portal_config);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let orchestrator = SyncOrchestrator::new(
        Arc::new(StaticSource(vec![
            raw_job("a", "Acme"),
            raw_job("b", "Globex"),
        ])),
        AuditStore::new(SourcePool::Sqlite(pool.clone())),
        vec![Box::new(sink) as Box<dyn PortalAdapter>],
        None,
        Provenance::current(),
        SyncSettings::default(),
    )
    .with_pacing(SyncPacing::none());

    let summary = orchestrator.sync_jobs(None, false).await;
    assert_eq!(summary.status, SyncStatus::Success);
    assert_eq!(summary.total_synced, 2);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["id"], "a");
    assert_eq!(first["company_name"], "Acme");
    assert_eq!(first["country"], "AUS");
    assert_eq!(first["experience_level"], "senior");
    assert_eq!(first["createdAt"], "2025-06-01T10:00:00Z");
    assert!(first["skills"].is_array());

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["company_name"], "Globex");

    // A second run appends rather than truncating
    let summary = orchestrator.sync_jobs(None, false).await;
    assert_eq!(summary.status, SyncStatus::Success);
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 4);
}
