//! End-to-end orchestrator scenarios against an in-memory audit store,
//! a scripted source and scripted portal adapters.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use sync_core::audit::AuditStore;
use sync_core::config::SyncSettings;
use sync_core::crypto::PayloadEncryptor;
use sync_core::model::{CanonicalJob, Provenance, RawJob, SyncStatus};
use sync_core::orchestrator::{SyncOrchestrator, SyncPacing};
use sync_core::portal::{PortalAdapter, PushOutcome};
use sync_core::source::{JobSource, SourcePool};
use sync_core::SyncError;

struct StaticSource {
    jobs: Vec<RawJob>,
    fail: bool,
}

#[async_trait]
impl JobSource for StaticSource {
    async fn fetch_jobs(
        &self,
        limit: Option<i64>,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawJob>, SyncError> {
        if self.fail {
            return Err(SyncError::SourceUnavailable("connection refused".into()));
        }
        let mut jobs = self.jobs.clone();
        if let Some(limit) = limit {
            jobs.truncate(limit as usize);
        }
        Ok(jobs)
    }
}

/// Portal whose push outcomes follow a script; once the script runs out,
/// every push succeeds. Captures each payload as sent.
struct ScriptedPortal {
    name: String,
    script: Mutex<VecDeque<bool>>,
    pushed: Mutex<Vec<Value>>,
    fail_transform: bool,
}

impl ScriptedPortal {
    fn new(name: &str, script: Vec<bool>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            pushed: Mutex::new(Vec::new()),
            fail_transform: false,
        }
    }

    fn failing_transform(name: &str) -> Self {
        let mut portal = Self::new(name, Vec::new());
        portal.fail_transform = true;
        portal
    }
}

#[async_trait]
impl PortalAdapter for ScriptedPortal {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_url(&self) -> Option<&str> {
        Some("https://portal.test/api/jobs/")
    }

    fn transform(&self, job: &CanonicalJob) -> Result<Value, SyncError> {
        if self.fail_transform {
            return Err(SyncError::Transform {
                job_id: job.id.clone(),
                message: "missing required field".into(),
            });
        }
        Ok(Value::Object(job.to_payload()))
    }

    async fn push(&self, payload: &Value) -> PushOutcome {
        self.pushed.lock().unwrap().push(payload.clone());
        let scripted = self.script.lock().unwrap().pop_front().unwrap_or(true);
        if scripted {
            PushOutcome::ok(Some(200), Some("ok".into()))
        } else {
            PushOutcome::failed(Some(500), Some("server error".into()), "HTTP 500")
        }
    }
}

fn raw_job(id: &str) -> RawJob {
    RawJob {
        job_id: Some(id.to_string()),
        title: Some(format!("Engineer {id}")),
        company: Some("Acme".to_string()),
        location: Some("Sydney".to_string()),
        created_at: Some("2025-06-01T10:00:00Z".to_string()),
        ..Default::default()
    }
}

async fn audit_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

fn orchestrator(
    source: StaticSource,
    pool: &SqlitePool,
    portals: Vec<Box<dyn PortalAdapter>>,
    encryptor: Option<PayloadEncryptor>,
) -> SyncOrchestrator {
    SyncOrchestrator::new(
        Arc::new(source),
        AuditStore::new(SourcePool::Sqlite(pool.clone())),
        portals,
        encryptor,
        Provenance::current(),
        SyncSettings {
            batch_size: 2,
            incremental: true,
            sync_interval_minutes: 60,
        },
    )
    .with_pacing(SyncPacing::none())
}

#[tokio::test]
async fn all_jobs_delivered_counts_match() {
    let pool = audit_pool().await;
    let source = StaticSource {
        jobs: vec![raw_job("a"), raw_job("b"), raw_job("c")],
        fail: false,
    };
    let portal = Box::new(ScriptedPortal::new("evoljobs", Vec::new()));

    let summary = orchestrator(source, &pool, vec![portal], None)
        .sync_jobs(None, true)
        .await;

    assert_eq!(summary.status, SyncStatus::Success);
    assert_eq!(summary.jobs_fetched, 3);
    assert_eq!(summary.total_synced, 3);
    let stats = &summary.portals["evoljobs"];
    assert_eq!(stats.success, 3);
    assert_eq!(stats.failed, 0);
    assert!((stats.success_rate - 1.0).abs() < f64::EPSILON);

    let (status, fetched, synced): (String, i64, i64) = sqlx::query_as(
        "SELECT status, jobs_fetched, total_synced FROM sync_runs ORDER BY id DESC LIMIT 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "success");
    assert_eq!(fetched, 3);
    assert_eq!(synced, 3);
}

#[tokio::test]
async fn partial_failure_recorded_per_job() {
    let pool = audit_pool().await;
    let source = StaticSource {
        jobs: vec![raw_job("a"), raw_job("b")],
        fail: false,
    };
    let portal = Box::new(ScriptedPortal::new("evoljobs", vec![false, true]));

    let summary = orchestrator(source, &pool, vec![portal], None)
        .sync_jobs(None, true)
        .await;

    assert_eq!(summary.status, SyncStatus::Success);
    assert_eq!(summary.total_synced, 1);
    let stats = &summary.portals["evoljobs"];
    assert_eq!(stats.success, 1);
    assert_eq!(stats.failed, 1);
    assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);

    let rows: Vec<(String, bool, Option<i64>)> = sqlx::query_as(
        "SELECT job_id, was_success, response_status FROM sync_job_results ORDER BY id",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], ("a".to_string(), false, Some(500)));
    assert_eq!(rows[1], ("b".to_string(), true, Some(200)));
}

#[tokio::test]
async fn audit_models_read_back_after_a_run() {
    let pool = audit_pool().await;
    let source = StaticSource {
        jobs: vec![raw_job("a"), raw_job("b")],
        fail: false,
    };
    let portal = Box::new(ScriptedPortal::new("evoljobs", vec![false, true]));

    orchestrator(source, &pool, vec![portal], None)
        .sync_jobs(None, true)
        .await;

    let audit = AuditStore::new(SourcePool::Sqlite(pool.clone()));
    let runs = audit.recent_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.status, "success");
    assert!(run.incremental);
    assert!(run.finished_at.is_some());
    assert_eq!(run.jobs_fetched, 2);
    assert_eq!(run.total_synced, 1);

    let portals = audit.portal_results_for_run(run.id).await.unwrap();
    assert_eq!(portals.len(), 1);
    assert_eq!(portals[0].portal_name, "evoljobs");
    assert_eq!(portals[0].success_count, 1);
    assert_eq!(portals[0].failure_count, 1);
    assert!((portals[0].success_rate - 0.5).abs() < f64::EPSILON);

    let failures = audit.failed_job_results(run.id).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].job_id, "a");
    assert!(!failures[0].was_success);
    assert_eq!(failures[0].response_status, Some(500));
}

#[tokio::test]
async fn one_portal_failing_does_not_touch_the_other() {
    let pool = audit_pool().await;
    let source = StaticSource {
        jobs: vec![raw_job("a"), raw_job("b"), raw_job("c")],
        fail: false,
    };
    let broken = Box::new(ScriptedPortal::new("broken", vec![false, false, false]));
    let healthy = Box::new(ScriptedPortal::new("healthy", Vec::new()));

    let summary = orchestrator(source, &pool, vec![broken, healthy], None)
        .sync_jobs(None, true)
        .await;

    assert_eq!(summary.status, SyncStatus::Success);
    assert_eq!(summary.portals["broken"].success, 0);
    assert_eq!(summary.portals["broken"].failed, 3);
    assert_eq!(summary.portals["healthy"].success, 3);
    assert_eq!(summary.total_synced, 3);
}

#[tokio::test]
async fn empty_fetch_is_a_successful_noop_twice() {
    let pool = audit_pool().await;

    for _ in 0..2 {
        let source = StaticSource {
            jobs: Vec::new(),
            fail: false,
        };
        let portal = Box::new(ScriptedPortal::new("evoljobs", Vec::new()));
        let summary = orchestrator(source, &pool, vec![portal], None)
            .sync_jobs(None, true)
            .await;

        assert_eq!(summary.status, SyncStatus::Success);
        assert_eq!(summary.jobs_fetched, 0);
        assert_eq!(summary.total_synced, 0);
        assert!(summary.portals.is_empty());
    }

    let runs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_runs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(runs, 2);
    let job_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_job_results")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(job_rows, 0);
}

#[tokio::test]
async fn source_failure_yields_error_summary() {
    let pool = audit_pool().await;
    let source = StaticSource {
        jobs: Vec::new(),
        fail: true,
    };
    let portal = Box::new(ScriptedPortal::new("evoljobs", Vec::new()));

    let summary = orchestrator(source, &pool, vec![portal], None)
        .sync_jobs(None, true)
        .await;

    assert_eq!(summary.status, SyncStatus::Error);
    assert_eq!(summary.jobs_fetched, 0);
    assert!(summary
        .error
        .as_deref()
        .unwrap()
        .contains("connection refused"));

    let status: String =
        sqlx::query_scalar("SELECT status FROM sync_runs ORDER BY id DESC LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "error");
}

#[tokio::test]
async fn transform_failure_counts_as_job_failure() {
    let pool = audit_pool().await;
    let source = StaticSource {
        jobs: vec![raw_job("a"), raw_job("b")],
        fail: false,
    };
    let portal = Box::new(ScriptedPortal::failing_transform("strict"));

    let summary = orchestrator(source, &pool, vec![portal], None)
        .sync_jobs(None, true)
        .await;

    assert_eq!(summary.status, SyncStatus::Success);
    let stats = &summary.portals["strict"];
    assert_eq!(stats.success, 0);
    assert_eq!(stats.failed, 2);
    assert_eq!(summary.total_synced, 0);

    let errors: Vec<Option<String>> =
        sqlx::query_scalar("SELECT error FROM sync_job_results ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].as_deref().unwrap().contains("transform failed"));
}

#[tokio::test]
async fn encrypted_payloads_decrypt_to_the_canonical_shape() {
    let pool = audit_pool().await;
    let source = StaticSource {
        jobs: vec![raw_job("a")],
        fail: false,
    };
    let portal = Arc::new(ScriptedPortal::new("evoljobs", Vec::new()));

    struct Shared(Arc<ScriptedPortal>);
    #[async_trait]
    impl PortalAdapter for Shared {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn target_url(&self) -> Option<&str> {
            self.0.target_url()
        }
        fn transform(&self, job: &CanonicalJob) -> Result<Value, SyncError> {
            self.0.transform(job)
        }
        async fn push(&self, payload: &Value) -> PushOutcome {
            self.0.push(payload).await
        }
    }

    let encryptor = PayloadEncryptor::from_key(Some("test-secret")).unwrap();
    let summary = orchestrator(
        source,
        &pool,
        vec![Box::new(Shared(portal.clone()))],
        PayloadEncryptor::from_key(Some("test-secret")),
    )
    .sync_jobs(None, true)
    .await;

    assert_eq!(summary.total_synced, 1);

    let pushed = portal.pushed.lock().unwrap().clone();
    assert_eq!(pushed.len(), 1);
    let envelope = &pushed[0];
    assert_eq!(envelope["encrypted"], Value::Bool(true));
    assert!(envelope["data"].is_string());

    let envelope = serde_json::from_value(envelope.clone()).unwrap();
    let plaintext = encryptor.decrypt(&envelope).unwrap();
    assert_eq!(plaintext["id"], "a");
    assert_eq!(plaintext["createdAt"], "2025-06-01T10:00:00Z");
}
