use thiserror::Error;

/// Errors raised inside one sync run.
///
/// Propagation policy: job- and portal-local failures (`Transform`,
/// `Delivery`) are contained and aggregated into counters, audit-write
/// failures (`Persistence`) are logged and swallowed, and only source-read
/// failures escalate to a run-level error status.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("source store unavailable: {0}")]
    SourceUnavailable(String),

    #[error("transform failed for job {job_id}: {message}")]
    Transform { job_id: String, message: String },

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("audit persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("encryption unavailable: {0}")]
    Encryption(String),
}
