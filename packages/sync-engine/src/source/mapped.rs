//! Mapped fetch strategy: typed row mapping over the canonical single-table
//! `jobs` schema used by sqlite deployments.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::error::SyncError;
use crate::model::RawJob;

/// One row of the canonical `jobs` table.
#[derive(Debug, sqlx::FromRow)]
struct SourceJobRow {
    job_id: String,
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    description: Option<String>,
    salary: Option<String>,
    job_type: Option<String>,
    experience_level: Option<String>,
    skills: Option<String>,
    posted_date: Option<String>,
    application_url: Option<String>,
    source_site: Option<String>,
    category: Option<String>,
    remote_allowed: Option<bool>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

const FETCH_SQL: &str = r#"
    SELECT
        id AS job_id,
        title,
        company,
        location,
        description,
        salary,
        job_type,
        experience_level,
        skills,
        posted_date,
        application_url,
        source_site,
        category,
        remote_allowed,
        created_at,
        updated_at
    FROM jobs
    WHERE (?1 IS NULL OR datetime(created_at) >= datetime(?1)
                      OR datetime(updated_at) >= datetime(?1))
    ORDER BY datetime(created_at) DESC
    LIMIT ?2
"#;

pub(super) async fn fetch_jobs(
    pool: &SqlitePool,
    limit: Option<i64>,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<RawJob>, SyncError> {
    let since_text = since.map(|s| s.to_rfc3339_opts(SecondsFormat::Secs, true));

    let rows = sqlx::query_as::<_, SourceJobRow>(FETCH_SQL)
        .bind(since_text)
        // sqlite treats LIMIT -1 as "no limit"
        .bind(limit.unwrap_or(-1))
        .fetch_all(pool)
        .await
        .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;

    Ok(rows.into_iter().map(RawJob::from).collect())
}

impl From<SourceJobRow> for RawJob {
    fn from(row: SourceJobRow) -> Self {
        RawJob {
            job_id: Some(row.job_id),
            title: row.title,
            company: row.company,
            location: row.location,
            description: row.description,
            salary: row.salary,
            job_type: row.job_type,
            experience_level: row.experience_level,
            skills: row.skills.map(Value::String),
            posted_date: row.posted_date,
            application_url: row.application_url,
            source_site: row.source_site,
            category: row.category,
            remote_allowed: row.remote_allowed,
            created_at: row.created_at,
            updated_at: row.updated_at,
            ..Default::default()
        }
    }
}
