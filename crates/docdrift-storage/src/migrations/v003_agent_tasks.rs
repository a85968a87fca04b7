//! V003: leased agent task queue.
//!
//! `dedup_key` makes enqueue idempotent per (scan run, task type, subject).

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS agent_tasks (
    id TEXT PRIMARY KEY,
    repo_id TEXT NOT NULL,
    scan_run_id TEXT NOT NULL,
    claim_id TEXT,
    task_type TEXT NOT NULL,
    dedup_key TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    payload TEXT NOT NULL,
    result TEXT,
    claimed_by TEXT,
    error TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    completed_at TEXT,
    UNIQUE (scan_run_id, task_type, dedup_key)
) STRICT;

CREATE INDEX IF NOT EXISTS idx_agent_tasks_claimable ON agent_tasks(repo_id, status, created_at);
CREATE INDEX IF NOT EXISTS idx_agent_tasks_scan ON agent_tasks(scan_run_id);
"#;
