//! Shared destination shaping applied by every adapter's `transform`.
//!
//! Resolves the contract mismatches the portals care about: default company
//! and location, a closed 3-letter country vocabulary, a closed experience
//! vocabulary, config-driven field renames, and list-typed field
//! guarantees.

use serde_json::{Map, Value};

use crate::config::PortalConfig;
use crate::error::SyncError;
use crate::model::CanonicalJob;

/// Per-portal shaping rules, built once from the portal's config.
#[derive(Debug, Clone)]
pub struct FieldShaper {
    default_country: String,
    default_location: String,
    default_experience: String,
    field_map: Vec<(String, String)>,
}

impl FieldShaper {
    pub fn from_config(portal: &PortalConfig) -> Self {
        let default_country = portal
            .default_country
            .clone()
            .unwrap_or_else(|| "Australia".to_string());
        let default_location = portal
            .default_location
            .clone()
            .unwrap_or_else(|| default_country.clone());
        let default_experience = portal
            .default_experience_level
            .clone()
            .unwrap_or_else(|| "entry".to_string());

        Self {
            default_country,
            default_location,
            default_experience,
            field_map: portal
                .field_map
                .iter()
                .filter(|(src, dst)| !src.is_empty() && !dst.is_empty())
                .map(|(src, dst)| (src.clone(), dst.clone()))
                .collect(),
        }
    }

    /// Shape one canonical job into the destination payload.
    pub fn shape(&self, job: &CanonicalJob) -> Result<Value, SyncError> {
        let mut payload = job.to_payload();
        if payload.is_empty() {
            return Err(SyncError::Transform {
                job_id: job.id.clone(),
                message: "canonical job did not serialize to an object".to_string(),
            });
        }

        // Company display name is mandatory downstream
        let company = non_empty(&payload, "company")
            .or_else(|| non_empty(&payload, "name"))
            .unwrap_or_else(|| "Unknown".to_string());
        payload.insert("company_name".to_string(), Value::String(company));

        // Location falls back to the configured default
        if non_empty(&payload, "location").is_none() {
            payload.insert(
                "location".to_string(),
                Value::String(self.default_location.clone()),
            );
        }

        // Country: max 3 characters, closed vocabulary for known names
        let country_raw = non_empty(&payload, "country")
            .unwrap_or_else(|| self.default_country.clone());
        payload.insert(
            "country".to_string(),
            Value::String(normalize_country(&country_raw)),
        );

        // Experience level: closed vocabulary {entry, mid, senior}
        let experience_raw = non_empty(&payload, "experience_level").unwrap_or_default();
        payload.insert(
            "experience_level".to_string(),
            Value::String(
                normalize_experience(&experience_raw)
                    .unwrap_or_else(|| self.default_experience.clone()),
            ),
        );

        // List-typed fields stay list-typed even if upstream dropped them
        if !matches!(payload.get("skills"), Some(Value::Array(_))) {
            payload.insert("skills".to_string(), Value::Array(Vec::new()));
        }

        // Configured renames run last so they see the shaped values
        for (source_field, target_field) in &self.field_map {
            if let Some(value) = payload.get(source_field).cloned() {
                payload.insert(target_field.clone(), value);
            }
        }

        Ok(Value::Object(payload))
    }
}

/// Uppercase and reduce a country name to a 3-letter code. Values already
/// at three characters or fewer pass through unchanged.
pub fn normalize_country(raw: &str) -> String {
    let clean = raw.trim().to_uppercase();
    if clean.chars().count() <= 3 {
        return clean;
    }

    match clean.as_str() {
        "AUSTRALIA" => "AUS",
        "UNITED STATES" | "UNITED STATES OF AMERICA" => "USA",
        "UNITED KINGDOM" => "GBR",
        "INDIA" => "IND",
        "CANADA" => "CAN",
        "NEW ZEALAND" => "NZL",
        _ => return clean.chars().take(3).collect(),
    }
    .to_string()
}

/// Map a free-form experience string onto {entry, mid, senior}.
pub fn normalize_experience(raw: &str) -> Option<String> {
    let raw = raw.trim().to_lowercase();
    if raw.is_empty() {
        return None;
    }

    const MAPPINGS: &[(&str, &str)] = &[
        ("senior", "senior"),
        ("sr", "senior"),
        ("intermediate", "mid"),
        ("middle", "mid"),
        ("mid", "mid"),
        ("junior", "entry"),
        ("entry", "entry"),
        ("fresher", "entry"),
        ("graduate", "entry"),
    ];

    MAPPINGS
        .iter()
        .find(|(needle, _)| raw.contains(needle))
        .map(|(_, level)| level.to_string())
}

fn non_empty(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Provenance;
    use crate::normalize::normalize;
    use crate::model::RawJob;
    use std::collections::BTreeMap;

    fn sample_job() -> CanonicalJob {
        normalize(
            RawJob {
                job_id: Some("11".into()),
                title: Some("Boilermaker".into()),
                company: Some("Steelworks".into()),
                experience_level: Some("Senior Engineer".into()),
                ..Default::default()
            },
            &Provenance {
                host: "h".into(),
                operator: "o".into(),
                engine: "e".into(),
            },
        )
    }

    fn shaper_with(config: impl FnOnce(&mut PortalConfig)) -> FieldShaper {
        let mut portal = PortalConfig::default();
        config(&mut portal);
        FieldShaper::from_config(&portal)
    }

    #[test]
    fn country_closed_vocabulary() {
        assert_eq!(normalize_country("Australia"), "AUS");
        assert_eq!(normalize_country("united states"), "USA");
        assert_eq!(normalize_country("United Kingdom"), "GBR");
        assert_eq!(normalize_country("New Zealand"), "NZL");
        // Already short enough: passes through
        assert_eq!(normalize_country("UK"), "UK");
        assert_eq!(normalize_country("aus"), "AUS");
        // Unknown long names are truncated
        assert_eq!(normalize_country("Wakanda Forever"), "WAK");
    }

    #[test]
    fn experience_closed_vocabulary() {
        assert_eq!(normalize_experience("Senior Engineer").as_deref(), Some("senior"));
        assert_eq!(normalize_experience("sr dev").as_deref(), Some("senior"));
        assert_eq!(normalize_experience("Intermediate").as_deref(), Some("mid"));
        assert_eq!(normalize_experience("junior").as_deref(), Some("entry"));
        assert_eq!(normalize_experience("fresher").as_deref(), Some("entry"));
        assert_eq!(normalize_experience("wizard"), None);
        assert_eq!(normalize_experience(""), None);
    }

    #[test]
    fn shape_fills_company_location_country() {
        let shaper = shaper_with(|p| {
            p.default_country = Some("Australia".into());
        });
        let shaped = shaper.shape(&sample_job()).unwrap();

        assert_eq!(shaped["company_name"], "Steelworks");
        assert_eq!(shaped["location"], "Australia");
        assert_eq!(shaped["country"], "AUS");
        assert_eq!(shaped["experience_level"], "senior");
        assert!(shaped["skills"].is_array());
    }

    #[test]
    fn shape_uses_experience_default_when_unmapped() {
        let shaper = shaper_with(|p| {
            p.default_experience_level = Some("mid".into());
        });
        let mut job = sample_job();
        job.experience_level = "unclassifiable".into();

        let shaped = shaper.shape(&job).unwrap();
        assert_eq!(shaped["experience_level"], "mid");
    }

    #[test]
    fn field_map_renames_fields() {
        let shaper = shaper_with(|p| {
            let mut map = BTreeMap::new();
            map.insert("title".to_string(), "job_title".to_string());
            map.insert("application_url".to_string(), "apply_url".to_string());
            p.field_map = map;
        });

        let shaped = shaper.shape(&sample_job()).unwrap();
        assert_eq!(shaped["job_title"], "Boilermaker");
        assert_eq!(shaped["apply_url"], "");
        // Source fields are kept; renames copy, not move
        assert_eq!(shaped["title"], "Boilermaker");
    }
}
