//! Queries for manual_mappings: user-pinned claim → code links.

use chrono::Utc;
use docdrift_core::errors::StorageError;
use rusqlite::{params, Connection};

use super::{entity_from_key, entity_key, ts};

/// A pinned link. Pins override every automatic mapping strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualMappingRow {
    pub claim_id: String,
    pub code_file: String,
    pub code_entity_id: Option<String>,
}

pub fn pin(
    conn: &Connection,
    claim_id: &str,
    code_file: &str,
    code_entity_id: Option<&str>,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR IGNORE INTO manual_mappings (claim_id, code_file, code_entity_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![claim_id, code_file, entity_key(code_entity_id), ts(&Utc::now())],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

/// Remove a pin. Returns whether a row was deleted.
pub fn unpin(
    conn: &Connection,
    claim_id: &str,
    code_file: &str,
    code_entity_id: Option<&str>,
) -> Result<bool, StorageError> {
    let n = conn
        .execute(
            "DELETE FROM manual_mappings
             WHERE claim_id = ?1 AND code_file = ?2 AND code_entity_id = ?3",
            params![claim_id, code_file, entity_key(code_entity_id)],
        )
        .map_err(StorageError::sqlite)?;
    Ok(n > 0)
}

pub fn list_for_claim(
    conn: &Connection,
    claim_id: &str,
) -> Result<Vec<ManualMappingRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT claim_id, code_file, code_entity_id FROM manual_mappings
             WHERE claim_id = ?1 ORDER BY code_file, code_entity_id",
        )
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![claim_id], |row| {
            Ok(ManualMappingRow {
                claim_id: row.get(0)?,
                code_file: row.get(1)?,
                code_entity_id: entity_from_key(row.get(2)?),
            })
        })
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}
