use chrono::{DateTime, SecondsFormat, Utc};

use super::schema;
use super::{JobResult, JobResultRecord, PortalResult, SyncRun};
use crate::error::SyncError;
use crate::model::SyncStatus;
use crate::source::SourcePool;

/// Writes the audit trail into the store the source data lives in.
///
/// Dialect differences (placeholder style, timestamp encoding) are handled
/// per backend here; callers see one interface.
#[derive(Clone)]
pub struct AuditStore {
    pool: SourcePool,
}

impl AuditStore {
    pub fn new(pool: SourcePool) -> Self {
        Self { pool }
    }

    /// Create the audit tables when missing. Idempotent.
    pub async fn ensure_schema(&self) -> Result<(), SyncError> {
        match &self.pool {
            SourcePool::Sqlite(pool) => {
                for ddl in schema::SQLITE_DDL {
                    sqlx::query(ddl).execute(pool).await?;
                }
            }
            SourcePool::Postgres(pool) => {
                for ddl in schema::POSTGRES_DDL {
                    sqlx::query(ddl).execute(pool).await?;
                }
            }
        }
        Ok(())
    }

    /// Insert the run row in `running` state, returning its id.
    pub async fn create_run(
        &self,
        started_at: DateTime<Utc>,
        incremental: bool,
    ) -> Result<i64, SyncError> {
        match &self.pool {
            SourcePool::Sqlite(pool) => {
                let result = sqlx::query(
                    "INSERT INTO sync_runs (started_at, incremental, status) VALUES (?, ?, ?)",
                )
                .bind(text_ts(started_at))
                .bind(incremental)
                .bind(SyncStatus::Running.as_str())
                .execute(pool)
                .await?;
                Ok(result.last_insert_rowid())
            }
            SourcePool::Postgres(pool) => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO sync_runs (started_at, incremental, status) \
                     VALUES ($1, $2, $3) RETURNING id",
                )
                .bind(started_at)
                .bind(incremental)
                .bind(SyncStatus::Running.as_str())
                .fetch_one(pool)
                .await?;
                Ok(id)
            }
        }
    }

    /// Finalize the run row. Terminal: the row is never touched again.
    pub async fn finish_run(
        &self,
        run_id: i64,
        status: SyncStatus,
        jobs_fetched: i64,
        total_synced: i64,
        error_message: Option<&str>,
    ) -> Result<(), SyncError> {
        let finished_at = Utc::now();
        match &self.pool {
            SourcePool::Sqlite(pool) => {
                sqlx::query(
                    "UPDATE sync_runs \
                     SET finished_at = ?, status = ?, jobs_fetched = ?, \
                         total_synced = ?, error_message = ? \
                     WHERE id = ?",
                )
                .bind(text_ts(finished_at))
                .bind(status.as_str())
                .bind(jobs_fetched)
                .bind(total_synced)
                .bind(error_message)
                .bind(run_id)
                .execute(pool)
                .await?;
            }
            SourcePool::Postgres(pool) => {
                sqlx::query(
                    "UPDATE sync_runs \
                     SET finished_at = $1, status = $2, jobs_fetched = $3, \
                         total_synced = $4, error_message = $5 \
                     WHERE id = $6",
                )
                .bind(finished_at)
                .bind(status.as_str())
                .bind(jobs_fetched)
                .bind(total_synced)
                .bind(error_message)
                .bind(run_id)
                .execute(pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Insert the per-portal row, returning its id.
    pub async fn create_portal_result(
        &self,
        run_id: i64,
        portal_name: &str,
        target_url: Option<&str>,
        batch_size: i64,
    ) -> Result<i64, SyncError> {
        match &self.pool {
            SourcePool::Sqlite(pool) => {
                let result = sqlx::query(
                    "INSERT INTO sync_portal_results \
                     (run_id, portal_name, target_url, batch_size) VALUES (?, ?, ?, ?)",
                )
                .bind(run_id)
                .bind(portal_name)
                .bind(target_url)
                .bind(batch_size)
                .execute(pool)
                .await?;
                Ok(result.last_insert_rowid())
            }
            SourcePool::Postgres(pool) => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO sync_portal_results \
                     (run_id, portal_name, target_url, batch_size) \
                     VALUES ($1, $2, $3, $4) RETURNING id",
                )
                .bind(run_id)
                .bind(portal_name)
                .bind(target_url)
                .bind(batch_size)
                .fetch_one(pool)
                .await?;
                Ok(id)
            }
        }
    }

    /// Finalize the per-portal counters at the end of that portal's loop.
    pub async fn finalize_portal_result(
        &self,
        portal_result_id: i64,
        success_count: i64,
        failure_count: i64,
        success_rate: f64,
    ) -> Result<(), SyncError> {
        match &self.pool {
            SourcePool::Sqlite(pool) => {
                sqlx::query(
                    "UPDATE sync_portal_results \
                     SET success_count = ?, failure_count = ?, success_rate = ? \
                     WHERE id = ?",
                )
                .bind(success_count)
                .bind(failure_count)
                .bind(success_rate)
                .bind(portal_result_id)
                .execute(pool)
                .await?;
            }
            SourcePool::Postgres(pool) => {
                sqlx::query(
                    "UPDATE sync_portal_results \
                     SET success_count = $1, failure_count = $2, success_rate = $3 \
                     WHERE id = $4",
                )
                .bind(success_count)
                .bind(failure_count)
                .bind(success_rate)
                .bind(portal_result_id)
                .execute(pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Append one push-attempt row.
    pub async fn record_job_result(
        &self,
        run_id: i64,
        portal_result_id: i64,
        record: &JobResultRecord,
    ) -> Result<(), SyncError> {
        let created_at = Utc::now();
        match &self.pool {
            SourcePool::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO sync_job_results \
                     (run_id, portal_result_id, job_id, request_url, request_headers, \
                      request_payload, response_status, response_body, was_success, \
                      error, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(run_id)
                .bind(portal_result_id)
                .bind(&record.job_id)
                .bind(&record.request_url)
                .bind(&record.request_headers)
                .bind(&record.request_payload)
                .bind(record.response_status)
                .bind(&record.response_body)
                .bind(record.was_success)
                .bind(&record.error)
                .bind(text_ts(created_at))
                .execute(pool)
                .await?;
            }
            SourcePool::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO sync_job_results \
                     (run_id, portal_result_id, job_id, request_url, request_headers, \
                      request_payload, response_status, response_body, was_success, \
                      error, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                )
                .bind(run_id)
                .bind(portal_result_id)
                .bind(&record.job_id)
                .bind(&record.request_url)
                .bind(&record.request_headers)
                .bind(&record.request_payload)
                .bind(record.response_status)
                .bind(&record.response_body)
                .bind(record.was_success)
                .bind(&record.error)
                .bind(created_at)
                .execute(pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Most recent runs, newest first. Operator read path.
    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<SyncRun>, SyncError> {
        const COLUMNS: &str = "id, started_at, finished_at, incremental, \
                               jobs_fetched, total_synced, status, error_message";
        match &self.pool {
            SourcePool::Sqlite(pool) => sqlx::query_as::<_, SyncRun>(&format!(
                "SELECT {COLUMNS} FROM sync_runs ORDER BY id DESC LIMIT ?"
            ))
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(Into::into),
            SourcePool::Postgres(pool) => sqlx::query_as::<_, SyncRun>(&format!(
                "SELECT {COLUMNS} FROM sync_runs ORDER BY id DESC LIMIT $1"
            ))
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(Into::into),
        }
    }

    /// Per-portal counters for one run.
    pub async fn portal_results_for_run(
        &self,
        run_id: i64,
    ) -> Result<Vec<PortalResult>, SyncError> {
        const COLUMNS: &str = "id, run_id, portal_name, target_url, batch_size, \
                               success_count, failure_count, success_rate";
        match &self.pool {
            SourcePool::Sqlite(pool) => sqlx::query_as::<_, PortalResult>(&format!(
                "SELECT {COLUMNS} FROM sync_portal_results WHERE run_id = ? ORDER BY id"
            ))
            .bind(run_id)
            .fetch_all(pool)
            .await
            .map_err(Into::into),
            SourcePool::Postgres(pool) => sqlx::query_as::<_, PortalResult>(&format!(
                "SELECT {COLUMNS} FROM sync_portal_results WHERE run_id = $1 ORDER BY id"
            ))
            .bind(run_id)
            .fetch_all(pool)
            .await
            .map_err(Into::into),
        }
    }

    /// Failed push attempts for one run, with their request/response
    /// diagnostics. The starting point when diagnosing a partial failure.
    pub async fn failed_job_results(&self, run_id: i64) -> Result<Vec<JobResult>, SyncError> {
        const COLUMNS: &str = "id, run_id, portal_result_id, job_id, request_url, \
                               request_headers, request_payload, response_status, \
                               response_body, was_success, error, created_at";
        match &self.pool {
            SourcePool::Sqlite(pool) => sqlx::query_as::<_, JobResult>(&format!(
                "SELECT {COLUMNS} FROM sync_job_results \
                 WHERE run_id = ? AND NOT was_success ORDER BY id"
            ))
            .bind(run_id)
            .fetch_all(pool)
            .await
            .map_err(Into::into),
            SourcePool::Postgres(pool) => sqlx::query_as::<_, JobResult>(&format!(
                "SELECT {COLUMNS} FROM sync_job_results \
                 WHERE run_id = $1 AND NOT was_success ORDER BY id"
            ))
            .bind(run_id)
            .fetch_all(pool)
            .await
            .map_err(Into::into),
        }
    }
}

fn text_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
