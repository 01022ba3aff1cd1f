//! Raw-SQL fetch strategy: a joined query over the scraper's postgres
//! schema (job posting + company + location), decoded dynamically.
//!
//! Table names come from [`super::TableNames`] so deployments with renamed
//! tables keep working without a mapped schema.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::TableNames;
use crate::error::SyncError;
use crate::model::RawJob;

pub(super) fn build_query(tables: &TableNames) -> String {
    format!(
        r#"
        SELECT
            jp.id::text AS job_id,
            NULLIF(jp.external_id, '') AS external_id,
            jp.slug AS slug,
            jp.title AS title,
            COALESCE(c.name, '') AS company,
            COALESCE(l.name, '') AS location,
            COALESCE(jp.description, '') AS description,
            COALESCE(jp.salary_raw_text, '') AS salary,
            jp.salary_min::float8 AS salary_min,
            jp.salary_max::float8 AS salary_max,
            jp.salary_currency AS salary_currency,
            jp.salary_type AS salary_period,
            COALESCE(jp.job_type, 'full_time') AS job_type,
            COALESCE(jp.experience_level, '') AS experience_level,
            jp.work_mode AS work_mode,
            COALESCE(jp.tags, '') AS tags,
            COALESCE(jp.job_category, 'other') AS category,
            jp.status AS status,
            COALESCE(jp.external_source, 'scraper') AS source_site,
            COALESCE(jp.external_url, '') AS application_url,
            COALESCE(jp.date_posted, jp.scraped_at) AS posted_date,
            jp.scraped_at AS scraped_at,
            jp.updated_at AS updated_at,
            jp.expired_at AS expired_at,
            jp.additional_info AS additional_info
        FROM {jp} jp
        LEFT JOIN {company} c ON c.id = jp.company_id
        LEFT JOIN {location} l ON l.id = jp.location_id
        WHERE ($1::timestamptz IS NULL OR jp.scraped_at >= $1 OR jp.updated_at >= $1)
        ORDER BY jp.scraped_at DESC
        LIMIT $2
        "#,
        jp = tables.jobposting,
        company = tables.company,
        location = tables.location,
    )
}

pub(super) async fn fetch_jobs(
    pool: &PgPool,
    tables: &TableNames,
    limit: Option<i64>,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<RawJob>, SyncError> {
    let query = build_query(tables);

    let rows = sqlx::query(&query)
        .bind(since)
        // LIMIT NULL means "no limit" in postgres
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;

    rows.iter().map(decode_row).collect()
}

fn decode_row(row: &PgRow) -> Result<RawJob, SyncError> {
    let work_mode: Option<String> = get(row, "work_mode")?;
    let tags: Option<String> = get(row, "tags")?;
    let additional_info: Option<Value> = get(row, "additional_info")?;

    Ok(RawJob {
        job_id: get(row, "job_id")?,
        external_id: get(row, "external_id")?,
        slug: get(row, "slug")?,
        title: get(row, "title")?,
        company: get(row, "company")?,
        location: get(row, "location")?,
        description: get(row, "description")?,
        description_html: None,
        salary: get(row, "salary")?,
        salary_min: get(row, "salary_min")?,
        salary_max: get(row, "salary_max")?,
        salary_currency: get(row, "salary_currency")?,
        salary_period: get(row, "salary_period")?,
        job_type: get(row, "job_type")?,
        experience_level: get(row, "experience_level")?,
        remote_allowed: work_mode
            .as_deref()
            .map(|mode| mode.to_lowercase().contains("remote")),
        work_mode,
        skills: tags.clone().map(Value::String),
        tags,
        category: get(row, "category")?,
        status: get(row, "status")?,
        source_site: get(row, "source_site")?,
        application_url: get(row, "application_url")?,
        posted_date: timestamp(row, "posted_date")?,
        created_at: timestamp(row, "scraped_at")?,
        scraped_at: timestamp(row, "scraped_at")?,
        updated_at: timestamp(row, "updated_at")?,
        expired_at: timestamp(row, "expired_at")?,
        additional_info: match additional_info {
            Some(Value::Object(map)) => map,
            _ => Default::default(),
        },
    })
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, SyncError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| SyncError::SourceUnavailable(format!("column {column}: {e}")))
}

fn timestamp(row: &PgRow, column: &str) -> Result<Option<String>, SyncError> {
    let value: Option<DateTime<Utc>> = get(row, column)?;
    Ok(value.map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_uses_postgres_placeholders() {
        let query = build_query(&TableNames::default());
        assert!(query.contains("$1"));
        assert!(query.contains("$2"));
        assert!(!query.contains('?'));
    }

    #[test]
    fn query_interpolates_overridden_tables() {
        let tables = TableNames {
            jobposting: "legacy_jobs".to_string(),
            company: "legacy_companies".to_string(),
            location: "legacy_locations".to_string(),
        };
        let query = build_query(&tables);
        assert!(query.contains("FROM legacy_jobs jp"));
        assert!(query.contains("LEFT JOIN legacy_companies c"));
        assert!(query.contains("LEFT JOIN legacy_locations l"));
    }

    #[test]
    fn query_orders_newest_first() {
        let query = build_query(&TableNames::default());
        assert!(query.contains("ORDER BY jp.scraped_at DESC"));
    }
}
