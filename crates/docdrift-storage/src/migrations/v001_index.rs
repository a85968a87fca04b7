//! V001: indexed repository view (files, code entities, manifests) and
//! co-change history.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS repo_files (
    repo_id TEXT NOT NULL,
    path TEXT NOT NULL,
    content TEXT,
    PRIMARY KEY (repo_id, path)
) STRICT;

CREATE TABLE IF NOT EXISTS code_entities (
    id TEXT PRIMARY KEY,
    repo_id TEXT NOT NULL,
    file_path TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    entity_type TEXT NOT NULL,
    name TEXT NOT NULL,
    signature TEXT,
    raw_code TEXT,
    embedding BLOB
) STRICT;

CREATE INDEX IF NOT EXISTS idx_code_entities_name ON code_entities(repo_id, name);
CREATE INDEX IF NOT EXISTS idx_code_entities_file ON code_entities(repo_id, file_path);
CREATE INDEX IF NOT EXISTS idx_code_entities_type ON code_entities(repo_id, entity_type);

-- Parsed manifest stored as JSON (dependencies, scripts, engines).
CREATE TABLE IF NOT EXISTS repo_manifests (
    repo_id TEXT NOT NULL,
    file_path TEXT NOT NULL,
    data TEXT NOT NULL,
    PRIMARY KEY (repo_id, file_path)
) STRICT;

CREATE TABLE IF NOT EXISTS co_changes (
    repo_id TEXT NOT NULL,
    code_file TEXT NOT NULL,
    doc_file TEXT NOT NULL,
    commit_sha TEXT NOT NULL,
    committed_at TEXT NOT NULL,
    PRIMARY KEY (repo_id, code_file, doc_file, commit_sha)
) STRICT;
"#;
