//! Source repository: reads job records from the primary store.
//!
//! Two access strategies sit behind the one `JobSource` interface:
//!
//! - `mapped` — typed row mapping against the canonical single-table `jobs`
//!   schema (the sqlite layout);
//! - `raw` — a hand-built joined query over the scraper schema with
//!   dialect placeholders and overridable table names (the postgres layout).
//!
//! Reads only; the repository never mutates the store. The audit tables
//! live beside the source data and are written through [`crate::audit`].

mod mapped;
mod raw;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};

use crate::config::{DatabaseConfig, DatabaseKind};
use crate::error::SyncError;
use crate::model::RawJob;

/// Read interface the orchestrator depends on. Tests substitute an
/// in-memory implementation.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Fetch up to `limit` jobs touched at/after `since`, newest first.
    async fn fetch_jobs(
        &self,
        limit: Option<i64>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawJob>, SyncError>;
}

/// A connected handle on either supported backend.
#[derive(Clone)]
pub enum SourcePool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// Table names used by the raw-SQL strategy, overridable via
/// `database.tables` in the config.
#[derive(Debug, Clone)]
pub struct TableNames {
    pub jobposting: String,
    pub company: String,
    pub location: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            jobposting: "jobs_jobposting".to_string(),
            company: "companies_company".to_string(),
            location: "core_location".to_string(),
        }
    }
}

impl TableNames {
    fn from_config(config: &DatabaseConfig) -> Self {
        let defaults = Self::default();
        let get = |key: &str, default: String| {
            config
                .tables
                .get(key)
                .filter(|v| is_safe_identifier(v))
                .cloned()
                .unwrap_or(default)
        };
        Self {
            jobposting: get("jobposting", defaults.jobposting),
            company: get("company", defaults.company),
            location: get("location", defaults.location),
        }
    }
}

// Table names are interpolated into SQL text, so they must stay identifiers.
fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Repository over the primary job store.
pub struct SourceRepository {
    pool: SourcePool,
    tables: TableNames,
}

impl SourceRepository {
    /// Connect to the configured backend.
    ///
    /// Fails with [`SyncError::SourceUnavailable`] when the store is
    /// unreachable or misconfigured.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, SyncError> {
        let pool = match config.kind {
            DatabaseKind::Sqlite => {
                let options = if config.database == ":memory:" {
                    SqliteConnectOptions::new().in_memory(true)
                } else {
                    SqliteConnectOptions::new()
                        .filename(&config.database)
                        .create_if_missing(true)
                };
                let pool = SqlitePoolOptions::new()
                    // A single connection keeps in-memory databases coherent
                    .max_connections(1)
                    .connect_with(options)
                    .await
                    .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;
                SourcePool::Sqlite(pool)
            }
            DatabaseKind::Postgres => {
                let options = PgConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .username(&config.user)
                    .password(&config.password)
                    .database(&config.database);
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await
                    .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;
                SourcePool::Postgres(pool)
            }
        };

        tracing::info!(backend = ?config.kind, "connected to source store");

        Ok(Self {
            pool,
            tables: TableNames::from_config(config),
        })
    }

    /// Wrap an existing sqlite pool (used by tests).
    pub fn from_sqlite_pool(pool: SqlitePool) -> Self {
        Self {
            pool: SourcePool::Sqlite(pool),
            tables: TableNames::default(),
        }
    }

    pub fn pool(&self) -> &SourcePool {
        &self.pool
    }

    /// Close the underlying pool. Idempotent.
    pub async fn close(&self) {
        match &self.pool {
            SourcePool::Postgres(pool) => pool.close().await,
            SourcePool::Sqlite(pool) => pool.close().await,
        }
    }
}

#[async_trait]
impl JobSource for SourceRepository {
    async fn fetch_jobs(
        &self,
        limit: Option<i64>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawJob>, SyncError> {
        let jobs = match &self.pool {
            SourcePool::Sqlite(pool) => mapped::fetch_jobs(pool, limit, since).await?,
            SourcePool::Postgres(pool) => {
                raw::fetch_jobs(pool, &self.tables, limit, since).await?
            }
        };

        tracing::info!(count = jobs.len(), "fetched jobs from source store");
        Ok(jobs)
    }
}
