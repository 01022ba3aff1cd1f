// Job-Data Synchronization Engine
//
// Reads job postings from the scraper's primary store and fans them out to
// independently configured external portals (HTTP APIs or local file sinks),
// with per-destination payload shaping, optional encryption, retry-tolerant
// delivery and a durable run/result audit trail.
//
// Flow: Scheduler tick -> SyncOrchestrator::sync_jobs -> SourceRepository
// -> PayloadNormalizer -> per-portal transform/(encrypt)/push -> audit rows.

pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod portal;
pub mod scheduler;
pub mod source;

pub use config::SyncConfig;
pub use error::SyncError;
pub use model::{CanonicalJob, Provenance, RawJob, SyncStatus, SyncSummary};
pub use orchestrator::{SyncEngine, SyncOrchestrator};
pub use scheduler::SyncScheduler;
