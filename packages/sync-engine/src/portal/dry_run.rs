//! Dry-run portal adapter: logs the payload and succeeds without I/O.

use async_trait::async_trait;
use serde_json::Value;

use super::shape::FieldShaper;
use super::{truncate, PortalAdapter, PushOutcome};
use crate::config::PortalConfig;
use crate::error::SyncError;
use crate::model::CanonicalJob;

const LOG_PREVIEW_CHARS: usize = 1000;

pub struct DryRunPortal {
    name: String,
    shaper: FieldShaper,
}

impl DryRunPortal {
    pub fn new(name: &str, portal: &PortalConfig) -> Self {
        Self {
            name: name.to_string(),
            shaper: FieldShaper::from_config(portal),
        }
    }
}

#[async_trait]
impl PortalAdapter for DryRunPortal {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, job: &CanonicalJob) -> Result<Value, SyncError> {
        self.shaper.shape(job)
    }

    async fn push(&self, payload: &Value) -> PushOutcome {
        let preview = serde_json::to_string(payload).unwrap_or_default();
        tracing::info!(
            portal = %self.name,
            payload = %truncate(&preview, LOG_PREVIEW_CHARS),
            "dry run, payload not delivered"
        );
        PushOutcome::ok(None, Some("dry_run".to_string()))
    }
}
