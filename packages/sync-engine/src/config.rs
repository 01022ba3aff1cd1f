//! Configuration for the sync engine.
//!
//! Loaded from a JSON config file when one is given (or found at the default
//! path), otherwise assembled from environment variables. The resulting
//! struct is passed into the orchestrator at construction; there are no
//! process-wide singletons.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};

/// Default config file path probed when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "sync_config.json";

/// Top-level configuration for one sync engine instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub portals: BTreeMap<String, PortalConfig>,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
}

/// Which database backend the source store runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[default]
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Backend selection; also decides the fetch strategy (sqlite reads the
    /// canonical `jobs` table, postgres reads the scraper's joined schema).
    #[serde(rename = "type", default)]
    pub kind: DatabaseKind,
    /// Database name, or the file path for sqlite.
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Overrides for the raw-SQL strategy's table names
    /// (`jobposting`, `company`, `location`).
    #[serde(default)]
    pub tables: BTreeMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kind: DatabaseKind::Sqlite,
            database: default_database(),
            host: default_host(),
            user: String::new(),
            password: String::new(),
            port: default_db_port(),
            tables: BTreeMap::new(),
        }
    }
}

/// Destination kind for a configured portal.
///
/// Adapters are selected by this tag, never by the portal's name. Unknown
/// values deserialize to `Unknown` and the portal is skipped with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalKind {
    #[default]
    Http,
    Local,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "type", default)]
    pub kind: PortalKind,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub endpoint_path: Option<String>,
    /// Sent as `Authorization: Bearer <key>` when present.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sent as `Authorization: Token <token>` when `api_key` is absent.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Arbitrary extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// File-sink mode: append one JSON line per job to this path.
    #[serde(default)]
    pub write_to: Option<String>,
    /// Dry-run mode: log payloads, push nothing.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub default_country: Option<String>,
    #[serde(default)]
    pub default_location: Option<String>,
    #[serde(default)]
    pub default_experience_level: Option<String>,
    /// Source field -> destination field renames applied during transform.
    #[serde(default)]
    pub field_map: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub incremental: bool,
    /// Width of the incremental window: `since = now - sync_interval_minutes`.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_minutes: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            incremental: true,
            sync_interval_minutes: default_sync_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_incremental_interval")]
    pub incremental_interval_minutes: u64,
    #[serde(default = "default_full_sync_interval")]
    pub full_sync_interval_hours: u64,
    /// Consecutive failures tolerated before the backoff pause kicks in.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default = "default_failure_backoff")]
    pub failure_backoff_minutes: u64,
    #[serde(default = "default_status_interval")]
    pub status_report_interval_hours: u64,
    /// Run one incremental sync immediately at startup.
    #[serde(default = "default_true")]
    pub run_initial_sync: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            incremental_interval_minutes: default_incremental_interval(),
            full_sync_interval_hours: default_full_sync_interval(),
            max_failures: default_max_failures(),
            failure_backoff_minutes: default_failure_backoff(),
            status_report_interval_hours: default_status_interval(),
            run_initial_sync: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Shared secret the payload key is derived from. Absent or blank means
    /// payloads go out as plaintext.
    #[serde(default)]
    pub key: Option<String>,
}

fn default_database() -> String {
    "jobs.db".to_string()
}
fn default_host() -> String {
    "localhost".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_batch_size() -> usize {
    50
}
fn default_sync_interval() -> u64 {
    60
}
fn default_incremental_interval() -> u64 {
    60
}
fn default_full_sync_interval() -> u64 {
    24
}
fn default_max_failures() -> u32 {
    3
}
fn default_failure_backoff() -> u64 {
    10
}
fn default_status_interval() -> u64 {
    6
}
fn default_true() -> bool {
    true
}

impl SyncConfig {
    /// Load configuration from a JSON file, falling back to environment
    /// variables when no file is given or found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Load .env if present (development)
        let _ = dotenv();

        let candidate = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH).to_path_buf());

        if candidate.exists() {
            let raw = std::fs::read_to_string(&candidate)
                .with_context(|| format!("failed to read config file {}", candidate.display()))?;
            let config: SyncConfig = serde_json::from_str(&raw)
                .with_context(|| format!("invalid config file {}", candidate.display()))?;
            return Ok(config);
        }

        if path.is_some() {
            anyhow::bail!("config file {} does not exist", candidate.display());
        }

        Ok(Self::from_env()?)
    }

    /// Assemble configuration from environment variables, mirroring the
    /// defaults of the file-based layout. Defines a single `local` portal.
    pub fn from_env() -> Result<Self> {
        let kind = match env::var("DB_TYPE").unwrap_or_else(|_| "sqlite".into()).to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseKind::Postgres,
            _ => DatabaseKind::Sqlite,
        };

        let database = DatabaseConfig {
            kind,
            database: env::var("DB_NAME").unwrap_or_else(|_| default_database()),
            host: env::var("DB_HOST").unwrap_or_else(|_| default_host()),
            user: env::var("DB_USER").unwrap_or_default(),
            password: env::var("DB_PASSWORD").unwrap_or_default(),
            port: env::var("DB_PORT")
                .unwrap_or_else(|_| "5432".into())
                .parse()
                .context("DB_PORT must be a valid port number")?,
            tables: BTreeMap::new(),
        };

        let mut portals = BTreeMap::new();
        portals.insert(
            "local".to_string(),
            PortalConfig {
                enabled: env_flag("LOCAL_ENABLED", true),
                kind: PortalKind::Local,
                base_url: env::var("LOCAL_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8002".into()),
                api_key: env::var("LOCAL_API_KEY").ok().filter(|k| !k.is_empty()),
                ..Default::default()
            },
        );

        let sync = SyncSettings {
            batch_size: env::var("BATCH_SIZE")
                .unwrap_or_else(|_| "50".into())
                .parse()
                .context("BATCH_SIZE must be a number")?,
            incremental: env_flag("INCREMENTAL_SYNC", true),
            sync_interval_minutes: env::var("SYNC_INTERVAL")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .context("SYNC_INTERVAL must be a number of minutes")?,
        };

        Ok(Self {
            database,
            portals,
            sync,
            scheduler: SchedulerConfig::default(),
            encryption: EncryptionConfig {
                key: env::var("SYNC_ENCRYPTION_KEY").ok().filter(|k| !k.is_empty()),
            },
        })
    }

    /// Names of portals that are enabled and of a known kind.
    pub fn enabled_portals(&self) -> Vec<&str> {
        self.portals
            .iter()
            .filter(|(_, cfg)| cfg.enabled && cfg.kind != PortalKind::Unknown)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => v.eq_ignore_ascii_case("true") || v == "1",
        Err(_) => default,
    }
}
