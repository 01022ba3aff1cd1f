//! Durable run/result audit trail.
//!
//! One [`SyncRun`] row per orchestrator execution, one [`PortalResult`] per
//! enabled portal per run, one [`JobResult`] per push attempt. Rows are
//! append-only within a run and never mutated by a later run; they are read
//! back through the store's operator accessors, never by the sync path.
//!
//! Audit writes are best-effort: the orchestrator logs and swallows
//! persistence failures so that logging trouble never aborts an otherwise
//! successful sync.

mod schema;
mod store;

pub use store::AuditStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One orchestrator execution. Terminal once `finished_at` is set.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SyncRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub incremental: bool,
    pub jobs_fetched: i64,
    pub total_synced: i64,
    /// running | success | error
    pub status: String,
    pub error_message: Option<String>,
}

/// Delivery counters for one portal within one run.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PortalResult {
    pub id: i64,
    pub run_id: i64,
    pub portal_name: String,
    pub target_url: Option<String>,
    pub batch_size: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub success_rate: f64,
}

/// One push attempt, success or failure: the durable evidence for
/// diagnosing partial failures. Never deleted by the sync path.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobResult {
    pub id: i64,
    pub run_id: i64,
    pub portal_result_id: i64,
    pub job_id: String,
    pub request_url: Option<String>,
    /// Serialized JSON map of the request headers (secrets redacted).
    pub request_headers: Option<String>,
    /// Serialized JSON of the payload as sent (canonical or encrypted).
    pub request_payload: Option<String>,
    pub response_status: Option<i64>,
    /// Truncated response body, captured regardless of JSON-ness.
    pub response_body: Option<String>,
    pub was_success: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields recorded for one push attempt.
#[derive(Debug, Clone, Default)]
pub struct JobResultRecord {
    pub job_id: String,
    pub request_url: Option<String>,
    pub request_headers: Option<String>,
    pub request_payload: Option<String>,
    pub response_status: Option<i64>,
    pub response_body: Option<String>,
    pub was_success: bool,
    pub error: Option<String>,
}
