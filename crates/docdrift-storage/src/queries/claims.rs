//! Queries for the claims table.

use chrono::Utc;
use docdrift_core::errors::StorageError;
use docdrift_core::models::{Claim, VerificationStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{bytes_to_f32_vec, f32_vec_to_bytes, parse_enum, parse_json, to_json, ts};

const CLAIM_COLUMNS: &str = "id, repo_id, source_file, line_number, claim_text, claim_type,
    testability, extracted_value, keywords, extraction_confidence, extraction_method,
    embedding, parent_claim_id, verification_status, last_verification_result_id";

fn claim_from_row(row: &Row<'_>) -> rusqlite::Result<Claim> {
    let claim_type: String = row.get(5)?;
    let testability: String = row.get(6)?;
    let extracted_value: String = row.get(7)?;
    let keywords: String = row.get(8)?;
    let extraction_method: String = row.get(10)?;
    let embedding: Option<Vec<u8>> = row.get(11)?;
    let status: String = row.get(13)?;
    Ok(Claim {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        source_file: row.get(2)?,
        line_number: row.get(3)?,
        claim_text: row.get(4)?,
        claim_type: parse_enum(5, &claim_type)?,
        testability: parse_enum(6, &testability)?,
        extracted_value: parse_json(7, &extracted_value)?,
        keywords: parse_json(8, &keywords)?,
        extraction_confidence: row.get(9)?,
        extraction_method: parse_enum(10, &extraction_method)?,
        embedding: embedding.map(|b| bytes_to_f32_vec(&b)),
        parent_claim_id: row.get(12)?,
        verification_status: parse_enum(13, &status)?,
        last_verification_result_id: row.get(14)?,
    })
}

/// Insert or refresh a claim. Verification state is preserved on update.
pub fn upsert_claim(conn: &Connection, claim: &Claim) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO claims
            (id, repo_id, source_file, line_number, claim_text, claim_type, testability,
             extracted_value, keywords, extraction_confidence, extraction_method, embedding,
             parent_claim_id, verification_status, last_verification_result_id, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT(id) DO UPDATE SET
            source_file = excluded.source_file, line_number = excluded.line_number,
            claim_text = excluded.claim_text, claim_type = excluded.claim_type,
            testability = excluded.testability, extracted_value = excluded.extracted_value,
            keywords = excluded.keywords, extraction_confidence = excluded.extraction_confidence,
            extraction_method = excluded.extraction_method,
            embedding = COALESCE(excluded.embedding, claims.embedding),
            parent_claim_id = excluded.parent_claim_id, updated_at = excluded.updated_at",
        params![
            claim.id,
            claim.repo_id,
            claim.source_file,
            claim.line_number,
            claim.claim_text,
            claim.claim_type.as_str(),
            claim.testability.as_str(),
            to_json(&claim.extracted_value)?,
            to_json(&claim.keywords)?,
            claim.extraction_confidence,
            claim.extraction_method.as_str(),
            claim.embedding.as_deref().map(f32_vec_to_bytes),
            claim.parent_claim_id,
            claim.verification_status.as_str(),
            claim.last_verification_result_id,
            ts(&Utc::now()),
        ],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

pub fn get_claim(conn: &Connection, id: &str) -> Result<Option<Claim>, StorageError> {
    conn.query_row(
        &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE id = ?1"),
        params![id],
        claim_from_row,
    )
    .optional()
    .map_err(StorageError::sqlite)
}

/// Like [`get_claim`] but a missing row is an error.
pub fn require_claim(conn: &Connection, id: &str) -> Result<Claim, StorageError> {
    get_claim(conn, id)?.ok_or_else(|| StorageError::NotFound {
        entity: "claim",
        id: id.to_string(),
    })
}

pub fn list_by_repo(conn: &Connection, repo_id: &str) -> Result<Vec<Claim>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claims WHERE repo_id = ?1 ORDER BY source_file, line_number, id"
        ))
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![repo_id], claim_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

pub fn list_by_status(
    conn: &Connection,
    repo_id: &str,
    status: VerificationStatus,
) -> Result<Vec<Claim>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claims
             WHERE repo_id = ?1 AND verification_status = ?2
             ORDER BY source_file, line_number, id"
        ))
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![repo_id, status.as_str()], claim_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

/// Record that `claim_id` belongs to `scan_run_id`.
pub fn add_to_scan_run(conn: &Connection, scan_run_id: &str, claim_id: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR IGNORE INTO scan_run_claims (scan_run_id, claim_id) VALUES (?1, ?2)",
        params![scan_run_id, claim_id],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

/// Claims of one scan run in `status`, minus those another run is still
/// verifying through an open agent task.
pub fn list_for_scan_run_by_status(
    conn: &Connection,
    scan_run_id: &str,
    status: VerificationStatus,
) -> Result<Vec<Claim>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claims
             WHERE verification_status = ?2
               AND id IN (SELECT claim_id FROM scan_run_claims WHERE scan_run_id = ?1)
               AND NOT EXISTS (
                   SELECT 1 FROM agent_tasks t
                   WHERE t.claim_id = claims.id AND t.scan_run_id <> ?1
                     AND t.task_type IN ('verification', 'claim_classification')
                     AND t.status NOT IN ('completed', 'failed'))
             ORDER BY source_file, line_number, id"
        ))
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![scan_run_id, status.as_str()], claim_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

/// Record the latest verification outcome for a claim.
pub fn set_verification_status(
    conn: &Connection,
    claim_id: &str,
    status: VerificationStatus,
    result_id: Option<&str>,
) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE claims SET verification_status = ?1,
            last_verification_result_id = COALESCE(?2, last_verification_result_id),
            updated_at = ?3
         WHERE id = ?4",
        params![status.as_str(), result_id, ts(&Utc::now()), claim_id],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

pub fn count_by_repo(conn: &Connection, repo_id: &str) -> Result<i64, StorageError> {
    conn.query_row(
        "SELECT COUNT(*) FROM claims WHERE repo_id = ?1",
        params![repo_id],
        |row| row.get(0),
    )
    .map_err(StorageError::sqlite)
}
