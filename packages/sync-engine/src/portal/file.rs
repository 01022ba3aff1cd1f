//! File-sink portal adapter: appends one JSON object per line to the
//! configured path, creating parent directories as needed.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::shape::FieldShaper;
use super::{PortalAdapter, PushOutcome};
use crate::config::PortalConfig;
use crate::error::SyncError;
use crate::model::CanonicalJob;

pub struct FileSinkPortal {
    name: String,
    path: PathBuf,
    path_display: String,
    shaper: FieldShaper,
}

impl FileSinkPortal {
    pub fn new(name: &str, path: &str, portal: &PortalConfig) -> Self {
        Self {
            name: name.to_string(),
            path: PathBuf::from(path),
            path_display: path.to_string(),
            shaper: FieldShaper::from_config(portal),
        }
    }
}

#[async_trait]
impl PortalAdapter for FileSinkPortal {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_url(&self) -> Option<&str> {
        Some(&self.path_display)
    }

    fn transform(&self, job: &CanonicalJob) -> Result<Value, SyncError> {
        self.shaper.shape(job)
    }

    async fn push(&self, payload: &Value) -> PushOutcome {
        let line = match serde_json::to_string(payload) {
            Ok(line) => line,
            Err(e) => return PushOutcome::failed(None, None, format!("serialize payload: {e}")),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return PushOutcome::failed(None, None, format!("create sink directory: {e}"));
            }
        }

        let result = async {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        match result {
            Ok(()) => PushOutcome::ok(None, Some(format!("written to {}", self.path_display))),
            Err(e) => PushOutcome::failed(None, None, format!("file write failed: {e}")),
        }
    }
}
