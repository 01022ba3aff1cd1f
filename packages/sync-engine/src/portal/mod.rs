//! Portal adapters: the destination-specific {transform, push} capability.
//!
//! One implementation per destination kind (HTTP, file sink, dry-run),
//! selected by the configured `type` tag, never by portal name. `push`
//! never propagates an error past its boundary: every failure becomes a
//! [`PushOutcome`] so one destination cannot abort the run.

mod dry_run;
mod file;
mod http;
pub mod shape;

pub use dry_run::DryRunPortal;
pub use file::FileSinkPortal;
pub use http::HttpPortal;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{PortalConfig, PortalKind, SyncConfig};
use crate::error::SyncError;
use crate::model::CanonicalJob;

/// Result of one push attempt. `success` is the only field the orchestrator
/// branches on; the rest is diagnostics for the audit trail.
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    pub success: bool,
    pub status: Option<u16>,
    pub response_body: Option<String>,
    pub error: Option<String>,
}

impl PushOutcome {
    pub fn ok(status: Option<u16>, body: Option<String>) -> Self {
        Self {
            success: true,
            status,
            response_body: body,
            error: None,
        }
    }

    pub fn failed(status: Option<u16>, body: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status,
            response_body: body,
            error: Some(error.into()),
        }
    }
}

/// Destination adapter capability set.
#[async_trait]
pub trait PortalAdapter: Send + Sync {
    /// Configured portal name (for logging and audit rows).
    fn name(&self) -> &str;

    /// Where pushes go: the endpoint URL or the sink path.
    fn target_url(&self) -> Option<&str> {
        None
    }

    /// Request headers as recorded in the audit trail (secrets redacted).
    fn audit_headers(&self) -> Option<String> {
        None
    }

    /// Resolve destination-contract mismatches for one canonical job.
    /// All payload shaping happens here, never in the orchestrator.
    fn transform(&self, job: &CanonicalJob) -> Result<Value, SyncError>;

    /// Deliver one payload. Never returns an error.
    async fn push(&self, payload: &Value) -> PushOutcome;
}

/// Build the enabled adapters from configuration.
///
/// A `local`/`http` portal with `write_to` becomes a file sink, with
/// `dry_run` a dry-run adapter, otherwise an HTTP adapter. Portals of an
/// unrecognized kind are skipped with a warning.
pub fn build_portals(config: &SyncConfig) -> Vec<Box<dyn PortalAdapter>> {
    let mut adapters: Vec<Box<dyn PortalAdapter>> = Vec::new();

    for (name, portal) in &config.portals {
        if !portal.enabled {
            continue;
        }

        match portal.kind {
            PortalKind::Unknown => {
                tracing::warn!(portal = %name, "unknown portal type, skipping");
                continue;
            }
            PortalKind::Http | PortalKind::Local => {
                if let Some(path) = portal.write_to.as_deref().filter(|p| !p.is_empty()) {
                    adapters.push(Box::new(FileSinkPortal::new(name, path, portal)));
                } else if portal.dry_run {
                    adapters.push(Box::new(DryRunPortal::new(name, portal)));
                } else {
                    match HttpPortal::new(name, portal) {
                        Ok(adapter) => adapters.push(Box::new(adapter)),
                        Err(e) => {
                            tracing::warn!(portal = %name, error = %e, "failed to build HTTP portal, skipping");
                        }
                    }
                }
            }
        }
    }

    tracing::info!(
        count = adapters.len(),
        portals = ?adapters.iter().map(|a| a.name()).collect::<Vec<_>>(),
        "initialized portal adapters"
    );

    adapters
}

/// Join base URL and endpoint path the way the destinations expect.
pub(crate) fn endpoint_url(portal: &PortalConfig) -> String {
    let base = portal.base_url.trim_end_matches('/');
    match portal.endpoint_path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) if path.starts_with('/') => format!("{base}{path}"),
        Some(path) => format!("{base}/{path}"),
        None => base.to_string(),
    }
}

/// Truncate diagnostics without splitting a UTF-8 character.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
