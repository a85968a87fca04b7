//! Queries for claim_mappings: candidate sets persisted per scan run.

use chrono::Utc;
use docdrift_core::errors::StorageError;
use docdrift_core::models::ClaimMapping;
use rusqlite::{params, Connection};

use super::{entity_from_key, entity_key, parse_enum, ts};

/// Insert mappings for a scan run. A duplicate (file, entity) keeps the
/// higher confidence.
pub fn insert_mappings(
    conn: &Connection,
    scan_run_id: &str,
    mappings: &[ClaimMapping],
) -> Result<(), StorageError> {
    let now = ts(&Utc::now());
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO claim_mappings
                (scan_run_id, claim_id, code_file, code_entity_id, confidence,
                 co_change_boost, mapping_method, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(scan_run_id, claim_id, code_file, code_entity_id) DO UPDATE SET
                confidence = excluded.confidence,
                co_change_boost = MAX(claim_mappings.co_change_boost, excluded.co_change_boost),
                mapping_method = excluded.mapping_method
             WHERE excluded.confidence > claim_mappings.confidence",
        )
        .map_err(StorageError::sqlite)?;
    for m in mappings {
        stmt.execute(params![
            scan_run_id,
            m.claim_id,
            m.code_file,
            entity_key(m.code_entity_id.as_deref()),
            m.confidence,
            m.co_change_boost,
            m.mapping_method.as_str(),
            now,
        ])
        .map_err(StorageError::sqlite)?;
    }
    Ok(())
}

/// Mappings for a claim in a scan run, highest confidence first.
pub fn list_for_claim(
    conn: &Connection,
    scan_run_id: &str,
    claim_id: &str,
) -> Result<Vec<ClaimMapping>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT claim_id, code_file, code_entity_id, confidence, co_change_boost, mapping_method
             FROM claim_mappings
             WHERE scan_run_id = ?1 AND claim_id = ?2
             ORDER BY confidence + co_change_boost DESC, code_file, code_entity_id",
        )
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![scan_run_id, claim_id], |row| {
            let method: String = row.get(5)?;
            Ok(ClaimMapping {
                claim_id: row.get(0)?,
                code_file: row.get(1)?,
                code_entity_id: entity_from_key(row.get(2)?),
                confidence: row.get(3)?,
                co_change_boost: row.get(4)?,
                mapping_method: parse_enum(5, &method)?,
            })
        })
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

pub fn count_for_scan(conn: &Connection, scan_run_id: &str) -> Result<i64, StorageError> {
    conn.query_row(
        "SELECT COUNT(*) FROM claim_mappings WHERE scan_run_id = ?1",
        params![scan_run_id],
        |row| row.get(0),
    )
    .map_err(StorageError::sqlite)
}
