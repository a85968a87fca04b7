//! V005: claim membership per scan run.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS scan_run_claims (
    scan_run_id TEXT NOT NULL,
    claim_id TEXT NOT NULL,
    PRIMARY KEY (scan_run_id, claim_id)
) STRICT, WITHOUT ROWID;
"#;
