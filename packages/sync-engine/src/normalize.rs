//! Payload normalization: fills required fields with deterministic defaults
//! and produces the canonical, destination-agnostic job shape.
//!
//! Pure functions, no I/O. Guarantees after `normalize`:
//! - `id` is never empty (job_id -> external_id -> slug -> synthetic hash)
//! - a created timestamp is always populated (created -> scraped -> posted -> now)
//! - every timestamp string carries an explicit UTC indicator
//! - `skills` is always a list, text fields are never null
//! - `remote_allowed` is always a boolean

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::model::{CanonicalJob, Provenance, RawJob};

/// Normalize a raw source record into a canonical job.
pub fn normalize(raw: RawJob, provenance: &Provenance) -> CanonicalJob {
    let mut id = first_non_empty(&[&raw.job_id, &raw.external_id, &raw.slug]);
    if id.is_empty() {
        id = synthetic_id(raw.title.as_deref(), raw.company.as_deref());
    }

    let created_at = raw
        .created_at
        .as_deref()
        .and_then(ensure_utc)
        .or_else(|| raw.scraped_at.as_deref().and_then(ensure_utc))
        .or_else(|| raw.posted_date.as_deref().and_then(ensure_utc))
        .unwrap_or_else(now_utc_string);

    let posted_date = raw
        .posted_date
        .as_deref()
        .and_then(ensure_utc)
        .unwrap_or_else(|| created_at.clone());

    let company = raw.company.unwrap_or_default();
    let name = if company.trim().is_empty() {
        "Unknown".to_string()
    } else {
        company.clone()
    };

    let remote_allowed = raw.remote_allowed.unwrap_or_else(|| {
        raw.work_mode
            .as_deref()
            .map(|mode| mode.to_lowercase().contains("remote"))
            .unwrap_or(false)
    });

    CanonicalJob {
        avatar: pick_avatar(&id),
        title: raw.title.unwrap_or_default(),
        location: raw.location.unwrap_or_default(),
        description: raw.description.unwrap_or_default(),
        description_html: raw.description_html.filter(|s| !s.is_empty()),
        salary: raw.salary.unwrap_or_default(),
        salary_min: raw.salary_min,
        salary_max: raw.salary_max,
        salary_currency: raw.salary_currency.filter(|s| !s.is_empty()),
        salary_period: raw.salary_period.filter(|s| !s.is_empty()),
        job_type: non_empty_or(raw.job_type, "full_time"),
        experience_level: raw.experience_level.unwrap_or_default(),
        skills: parse_skills(raw.skills.as_ref()),
        tags: raw.tags.unwrap_or_default(),
        category: non_empty_or(raw.category, "other"),
        status: non_empty_or(raw.status, "active"),
        source_site: non_empty_or(raw.source_site, "scraper"),
        application_url: raw.application_url.unwrap_or_default(),
        external_id: raw.external_id.unwrap_or_else(|| id.clone()),
        scraped_at: raw.scraped_at.as_deref().and_then(ensure_utc),
        updated_at: raw.updated_at.as_deref().and_then(ensure_utc),
        expired_at: raw.expired_at.as_deref().and_then(ensure_utc),
        remote_allowed,
        provenance: provenance.clone(),
        additional_info: raw.additional_info,
        id,
        company,
        name,
        created_at,
        posted_date,
    }
}

/// Parse a skills value into a plain list.
///
/// Accepts a JSON array, a JSON-encoded array string, or comma-separated
/// text; anything else yields an empty list.
pub fn parse_skills(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
        Some(Value::String(raw)) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Vec::new();
            }
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Array(items)) => items.iter().map(value_to_string).collect(),
                Ok(other) => vec![value_to_string(&other)],
                Err(_) => raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            }
        }
        _ => Vec::new(),
    }
}

/// Re-serialize a timestamp string with an explicit UTC marker.
///
/// Offset-aware inputs are converted to UTC; naive ISO inputs are assumed
/// UTC. Returns `None` when the input is not a recognizable timestamp.
pub fn ensure_utc(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(to_utc_string(parsed.with_timezone(&Utc)));
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(to_utc_string(naive.and_utc()));
        }
        if format == "%Y-%m-%d" {
            if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, format) {
                let naive = date.and_hms_opt(0, 0, 0)?;
                return Some(to_utc_string(naive.and_utc()));
            }
        }
    }

    None
}

/// Pick a deterministic placeholder avatar URL from a seed string.
pub fn pick_avatar(seed: &str) -> String {
    let seed = if seed.is_empty() { "default" } else { seed };
    let digest = md5::compute(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.0[..8]);
    let idx = u64::from_be_bytes(prefix) % 20 + 1; // 1..=20
    format!("https://cdn.jsdelivr.net/gh/faker-js/assets-person-portrait/male/512/{idx}.jpg")
}

fn to_utc_string(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn now_utc_string() -> String {
    to_utc_string(Utc::now())
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

fn first_non_empty(candidates: &[&Option<String>]) -> String {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

// Records with no identifier at all still need a stable id so repeated
// syncs of the same row agree.
fn synthetic_id(title: Option<&str>, company: Option<&str>) -> String {
    let seed = format!(
        "{}|{}",
        title.unwrap_or_default().trim(),
        company.unwrap_or_default().trim()
    );
    let digest = md5::compute(seed.as_bytes());
    format!("job-{:x}", digest)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
