//! V004: suppression rules and append-only feedback.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS suppression_rules (
    id TEXT PRIMARY KEY,
    repo_id TEXT NOT NULL,
    scope TEXT NOT NULL,
    target_claim_id TEXT,
    target_file TEXT,
    target_claim_type TEXT,
    target_pattern TEXT,
    reason TEXT NOT NULL,
    source TEXT NOT NULL,
    expires_at TEXT,
    revoked INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_suppression_rules_repo ON suppression_rules(repo_id, revoked);

CREATE TABLE IF NOT EXISTS feedback (
    id TEXT PRIMARY KEY,
    repo_id TEXT NOT NULL,
    claim_id TEXT NOT NULL,
    verification_result_id TEXT,
    feedback_type TEXT NOT NULL,
    quick_pick TEXT,
    free_text TEXT,
    created_at TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_feedback_claim ON feedback(repo_id, claim_id);
"#;
