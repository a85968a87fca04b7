//! Queries for co_changes: commits touching a code file and a doc file together.

use docdrift_core::errors::StorageError;
use docdrift_core::models::CoChange;
use rusqlite::{params, Connection};

use super::ts;

/// Record a co-change. Re-recording the same commit is a no-op.
pub fn insert(conn: &Connection, c: &CoChange) -> Result<bool, StorageError> {
    let n = conn
        .execute(
            "INSERT OR IGNORE INTO co_changes (repo_id, code_file, doc_file, commit_sha, committed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![c.repo_id, c.code_file, c.doc_file, c.commit_sha, ts(&c.committed_at)],
        )
        .map_err(StorageError::sqlite)?;
    Ok(n > 0)
}

pub fn count(
    conn: &Connection,
    repo_id: &str,
    code_file: &str,
    doc_file: &str,
) -> Result<u32, StorageError> {
    conn.query_row(
        "SELECT COUNT(*) FROM co_changes WHERE repo_id = ?1 AND code_file = ?2 AND doc_file = ?3",
        params![repo_id, code_file, doc_file],
        |row| row.get(0),
    )
    .map_err(StorageError::sqlite)
}
