//! Queries for suggested_fixes (one per verification result).

use chrono::Utc;
use docdrift_core::errors::StorageError;
use rusqlite::{params, Connection, OptionalExtension};

use super::ts;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedFixRow {
    pub id: String,
    pub claim_id: String,
    pub verification_result_id: String,
    pub suggested_fix: String,
}

/// Insert a fix unless the result already has one. Returns whether it was inserted.
pub fn insert_fix(
    conn: &Connection,
    claim_id: &str,
    verification_result_id: &str,
    suggested_fix: &str,
) -> Result<bool, StorageError> {
    let n = conn
        .execute(
            "INSERT OR IGNORE INTO suggested_fixes
                (id, claim_id, verification_result_id, suggested_fix, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                uuid::Uuid::new_v4().to_string(),
                claim_id,
                verification_result_id,
                suggested_fix,
                ts(&Utc::now())
            ],
        )
        .map_err(StorageError::sqlite)?;
    Ok(n > 0)
}

pub fn get_for_result(
    conn: &Connection,
    verification_result_id: &str,
) -> Result<Option<SuggestedFixRow>, StorageError> {
    conn.query_row(
        "SELECT id, claim_id, verification_result_id, suggested_fix
         FROM suggested_fixes WHERE verification_result_id = ?1",
        params![verification_result_id],
        |row| {
            Ok(SuggestedFixRow {
                id: row.get(0)?,
                claim_id: row.get(1)?,
                verification_result_id: row.get(2)?,
                suggested_fix: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(StorageError::sqlite)
}
