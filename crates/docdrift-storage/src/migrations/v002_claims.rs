//! V002: claims, per-scan mappings, manual pins, scan runs, results, fixes.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS claims (
    id TEXT PRIMARY KEY,
    repo_id TEXT NOT NULL,
    source_file TEXT NOT NULL,
    line_number INTEGER NOT NULL,
    claim_text TEXT NOT NULL,
    claim_type TEXT NOT NULL,
    testability TEXT NOT NULL,
    extracted_value TEXT NOT NULL,
    keywords TEXT NOT NULL DEFAULT '[]',
    extraction_confidence REAL NOT NULL,
    extraction_method TEXT NOT NULL,
    embedding BLOB,
    parent_claim_id TEXT,
    verification_status TEXT NOT NULL DEFAULT 'pending',
    last_verification_result_id TEXT,
    updated_at TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_claims_repo ON claims(repo_id);
CREATE INDEX IF NOT EXISTS idx_claims_type ON claims(repo_id, claim_type);

-- Empty string in code_entity_id means "whole file" so the UNIQUE key
-- treats file-level mappings as equal.
CREATE TABLE IF NOT EXISTS claim_mappings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_run_id TEXT NOT NULL,
    claim_id TEXT NOT NULL,
    code_file TEXT NOT NULL,
    code_entity_id TEXT NOT NULL DEFAULT '',
    confidence REAL NOT NULL,
    co_change_boost REAL NOT NULL DEFAULT 0.0,
    mapping_method TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (scan_run_id, claim_id, code_file, code_entity_id)
) STRICT;

CREATE INDEX IF NOT EXISTS idx_claim_mappings_claim ON claim_mappings(claim_id, scan_run_id);

CREATE TABLE IF NOT EXISTS manual_mappings (
    claim_id TEXT NOT NULL,
    code_file TEXT NOT NULL,
    code_entity_id TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    PRIMARY KEY (claim_id, code_file, code_entity_id)
) STRICT;

CREATE TABLE IF NOT EXISTS scan_runs (
    id TEXT PRIMARY KEY,
    repo_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'running',
    started_at TEXT NOT NULL,
    completed_at TEXT,
    total_claims INTEGER NOT NULL DEFAULT 0,
    verified INTEGER NOT NULL DEFAULT 0,
    drifted INTEGER NOT NULL DEFAULT 0,
    uncertain INTEGER NOT NULL DEFAULT 0,
    pending INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    error TEXT
) STRICT;

CREATE INDEX IF NOT EXISTS idx_scan_runs_repo ON scan_runs(repo_id, started_at);

CREATE TABLE IF NOT EXISTS verification_results (
    id TEXT PRIMARY KEY,
    claim_id TEXT NOT NULL,
    repo_id TEXT NOT NULL,
    scan_run_id TEXT NOT NULL,
    verdict TEXT NOT NULL,
    confidence REAL NOT NULL,
    tier INTEGER NOT NULL,
    severity TEXT,
    reasoning TEXT,
    specific_mismatch TEXT,
    suggested_fix TEXT,
    evidence_files TEXT NOT NULL DEFAULT '[]',
    token_cost INTEGER,
    duration_ms INTEGER,
    verification_path TEXT NOT NULL,
    suppressed INTEGER NOT NULL DEFAULT 0,
    suppression_rule_id TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (claim_id, scan_run_id, verification_path)
) STRICT;

CREATE INDEX IF NOT EXISTS idx_results_scan ON verification_results(scan_run_id);

CREATE TABLE IF NOT EXISTS suggested_fixes (
    id TEXT PRIMARY KEY,
    claim_id TEXT NOT NULL,
    verification_result_id TEXT NOT NULL UNIQUE,
    suggested_fix TEXT NOT NULL,
    created_at TEXT NOT NULL
) STRICT;
"#;
