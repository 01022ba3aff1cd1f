//! HTTP portal adapter: POSTs JSON payloads with bounded
//! retry-with-backoff, capturing status and a truncated response body.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;

use super::shape::FieldShaper;
use super::{truncate, PortalAdapter, PushOutcome};
use crate::config::PortalConfig;
use crate::error::SyncError;
use crate::model::CanonicalJob;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const FIRST_RETRY_DELAY: Duration = Duration::from_secs(1);
const BODY_PREVIEW_CHARS: usize = 500;

pub struct HttpPortal {
    name: String,
    url: String,
    client: reqwest::Client,
    shaper: FieldShaper,
    /// Header map as recorded in audit rows, secret values redacted.
    audit_headers: String,
}

impl HttpPortal {
    pub fn new(name: &str, portal: &PortalConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("job-sync/0.1"));

        let mut audit: BTreeMap<String, String> = BTreeMap::new();
        audit.insert("Content-Type".into(), "application/json".into());
        audit.insert("User-Agent".into(), "job-sync/0.1".into());

        if let Some(key) = portal.api_key.as_deref().filter(|k| !k.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}"))
                    .context("api_key contains invalid header characters")?,
            );
            audit.insert("Authorization".into(), "Bearer ***".into());
        } else if let Some(token) = portal.auth_token.as_deref().filter(|t| !t.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Token {token}"))
                    .context("auth_token contains invalid header characters")?,
            );
            audit.insert("Authorization".into(), "Token ***".into());
        }

        for (key, value) in &portal.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes())
                .with_context(|| format!("invalid header name {key}"))?;
            let header_value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {key}"))?;
            headers.insert(header_name, header_value);
            audit.insert(key.clone(), redact(key, value));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            name: name.to_string(),
            url: super::endpoint_url(portal),
            client,
            shaper: FieldShaper::from_config(portal),
            audit_headers: serde_json::to_string(&audit).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl PortalAdapter for HttpPortal {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_url(&self) -> Option<&str> {
        Some(&self.url)
    }

    fn audit_headers(&self) -> Option<String> {
        Some(self.audit_headers.clone())
    }

    fn transform(&self, job: &CanonicalJob) -> Result<Value, SyncError> {
        self.shaper.shape(job)
    }

    async fn push(&self, payload: &Value) -> PushOutcome {
        let mut delay = FIRST_RETRY_DELAY;

        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self.client.post(&self.url).json(payload).send().await {
                Ok(response) => response,
                Err(e) => {
                    if attempt < MAX_ATTEMPTS {
                        tracing::warn!(
                            portal = %self.name,
                            attempt,
                            error = %e,
                            "push transport error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                        continue;
                    }
                    return PushOutcome::failed(None, None, e.to_string());
                }
            };

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let preview = truncate(&body, BODY_PREVIEW_CHARS);

            if status.is_success() {
                return PushOutcome::ok(Some(status.as_u16()), Some(preview));
            }

            if should_retry(status) && attempt < MAX_ATTEMPTS {
                tracing::warn!(
                    portal = %self.name,
                    attempt,
                    status = status.as_u16(),
                    "push rejected, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                continue;
            }

            return PushOutcome::failed(
                Some(status.as_u16()),
                Some(preview),
                format!("portal returned {status}"),
            );
        }

        // Loop always returns from the last attempt
        PushOutcome::failed(None, None, "retry budget exhausted")
    }
}

/// Only throttling and server-side failures are worth a retry.
fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn redact(key: &str, value: &str) -> String {
    let lowered = key.to_lowercase();
    if lowered.contains("key") || lowered.contains("secret") || lowered.contains("token") {
        "***".to_string()
    } else {
        value.to_string()
    }
}
