//! Core data shapes passed between the source, normalizer and portals.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A job record as read from the source store, before normalization.
///
/// Every field is optional: the two fetch strategies fill what their schema
/// has and the normalizer guarantees the rest. Timestamps are carried as the
/// raw strings the backend produced; the normalizer re-serializes them with
/// an explicit UTC marker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJob {
    pub job_id: Option<String>,
    pub external_id: Option<String>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub description_html: Option<String>,
    pub salary: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub work_mode: Option<String>,
    /// May arrive as a JSON array, a JSON-encoded string or comma text.
    pub skills: Option<Value>,
    pub tags: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub source_site: Option<String>,
    pub application_url: Option<String>,
    pub posted_date: Option<String>,
    pub created_at: Option<String>,
    pub scraped_at: Option<String>,
    pub updated_at: Option<String>,
    pub expired_at: Option<String>,
    pub remote_allowed: Option<bool>,
    /// Open-ended passthrough bag preserved on the canonical job.
    #[serde(default)]
    pub additional_info: Map<String, Value>,
}

/// Identity of the process that produced a payload, attached to every
/// canonical job so receivers can tell syncs apart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Provenance {
    pub host: String,
    pub operator: String,
    pub engine: String,
}

impl Provenance {
    /// Provenance for the current process. The operator identity can be
    /// overridden with `SYNC_OPERATOR`.
    pub fn current() -> Self {
        Self {
            host: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
            operator: std::env::var("SYNC_OPERATOR").unwrap_or_else(|_| "job-sync".to_string()),
            engine: format!("sync-engine/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// The normalized, destination-agnostic job representation consumed by every
/// portal adapter. Transient: this subsystem never persists it.
///
/// Invariants upheld by the normalizer: `id` is never empty, `skills` is
/// always a list, every timestamp string carries an explicit UTC indicator,
/// text fields are never null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalJob {
    pub id: String,
    pub title: String,
    pub company: String,
    /// Friendly display name, falls back to the company.
    pub name: String,
    pub avatar: String,
    pub location: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_html: Option<String>,
    pub salary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_period: Option<String>,
    pub job_type: String,
    pub experience_level: String,
    pub skills: Vec<String>,
    pub tags: String,
    pub category: String,
    pub status: String,
    pub source_site: String,
    pub application_url: String,
    pub external_id: String,
    pub posted_date: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<String>,
    pub remote_allowed: bool,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_info: Map<String, Value>,
}

impl CanonicalJob {
    /// Serialize to the JSON object handed to portal transforms.
    pub fn to_payload(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct always serializes to an object
            _ => Map::new(),
        }
    }
}

/// Outcome status of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Running,
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Running => "running",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }
}

/// Per-portal delivery counters reported in the run summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalStats {
    pub success: usize,
    pub failed: usize,
    pub success_rate: f64,
}

/// Operator-facing result of one sync run.
///
/// The `status` field is the sole success/error signal of the sync contract;
/// `sync_jobs` never propagates an error past its boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub jobs_fetched: usize,
    pub total_synced: usize,
    pub portals: BTreeMap<String, PortalStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncSummary {
    pub fn success(
        started_at: DateTime<Utc>,
        jobs_fetched: usize,
        total_synced: usize,
        portals: BTreeMap<String, PortalStats>,
    ) -> Self {
        let finished_at = Utc::now();
        Self {
            status: SyncStatus::Success,
            started_at,
            finished_at,
            duration_seconds: duration_secs(started_at, finished_at),
            jobs_fetched,
            total_synced,
            portals,
            error: None,
        }
    }

    pub fn failed(started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        let finished_at = Utc::now();
        Self {
            status: SyncStatus::Error,
            started_at,
            finished_at,
            duration_seconds: duration_secs(started_at, finished_at),
            jobs_fetched: 0,
            total_synced: 0,
            portals: BTreeMap::new(),
            error: Some(error.into()),
        }
    }
}

fn duration_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_job_serializes_to_object() {
        let job = CanonicalJob {
            id: "42".into(),
            title: "Nurse".into(),
            company: "Acme Health".into(),
            name: "Acme Health".into(),
            avatar: String::new(),
            location: "Sydney".into(),
            description: String::new(),
            description_html: None,
            salary: String::new(),
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            salary_period: None,
            job_type: "full_time".into(),
            experience_level: String::new(),
            skills: vec!["nursing".into()],
            tags: String::new(),
            category: "other".into(),
            status: "active".into(),
            source_site: "scraper".into(),
            application_url: String::new(),
            external_id: "42".into(),
            posted_date: "2024-01-01T00:00:00Z".into(),
            created_at: "2024-01-01T00:00:00Z".into(),
            scraped_at: None,
            updated_at: None,
            expired_at: None,
            remote_allowed: false,
            provenance: Provenance {
                host: "h".into(),
                operator: "o".into(),
                engine: "e".into(),
            },
            additional_info: Map::new(),
        };

        let payload = job.to_payload();
        assert_eq!(payload["id"], "42");
        assert_eq!(payload["createdAt"], "2024-01-01T00:00:00Z");
        assert!(payload["skills"].is_array());
    }

    #[test]
    fn summary_status_serializes_lowercase() {
        let summary = SyncSummary::failed(Utc::now(), "boom");
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
    }
}
