//! DDL for the audit tables, per dialect. Executed idempotently at startup
//! so the engine can run unattended against a fresh store.

pub(super) const SQLITE_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sync_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        started_at TEXT NOT NULL,
        finished_at TEXT,
        incremental INTEGER NOT NULL,
        jobs_fetched INTEGER NOT NULL DEFAULT 0,
        total_synced INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        error_message TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_portal_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL REFERENCES sync_runs(id),
        portal_name TEXT NOT NULL,
        target_url TEXT,
        batch_size INTEGER NOT NULL,
        success_count INTEGER NOT NULL DEFAULT 0,
        failure_count INTEGER NOT NULL DEFAULT 0,
        success_rate REAL NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_job_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL REFERENCES sync_runs(id),
        portal_result_id INTEGER NOT NULL REFERENCES sync_portal_results(id),
        job_id TEXT NOT NULL,
        request_url TEXT,
        request_headers TEXT,
        request_payload TEXT,
        response_status INTEGER,
        response_body TEXT,
        was_success INTEGER NOT NULL,
        error TEXT,
        created_at TEXT NOT NULL
    )
    "#,
];

pub(super) const POSTGRES_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sync_runs (
        id BIGSERIAL PRIMARY KEY,
        started_at TIMESTAMPTZ NOT NULL,
        finished_at TIMESTAMPTZ,
        incremental BOOLEAN NOT NULL,
        jobs_fetched BIGINT NOT NULL DEFAULT 0,
        total_synced BIGINT NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        error_message TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_portal_results (
        id BIGSERIAL PRIMARY KEY,
        run_id BIGINT NOT NULL REFERENCES sync_runs(id),
        portal_name TEXT NOT NULL,
        target_url TEXT,
        batch_size BIGINT NOT NULL,
        success_count BIGINT NOT NULL DEFAULT 0,
        failure_count BIGINT NOT NULL DEFAULT 0,
        success_rate DOUBLE PRECISION NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_job_results (
        id BIGSERIAL PRIMARY KEY,
        run_id BIGINT NOT NULL REFERENCES sync_runs(id),
        portal_result_id BIGINT NOT NULL REFERENCES sync_portal_results(id),
        job_id TEXT NOT NULL,
        request_url TEXT,
        request_headers TEXT,
        request_payload TEXT,
        response_status BIGINT,
        response_body TEXT,
        was_success BOOLEAN NOT NULL,
        error TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
];
