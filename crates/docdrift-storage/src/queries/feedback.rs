//! Queries for the append-only feedback log.

use docdrift_core::errors::StorageError;
use docdrift_core::models::{ClaimType, Feedback};
use rusqlite::{params, Connection, Row};

use super::{parse_enum, parse_ts, ts};

/// Feedback types that count toward count-based suppression.
const NEGATIVE_TYPES: &str = "('thumbs_down', 'fix_dismissed', 'all_dismissed')";

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    let feedback_type: String = row.get(4)?;
    let quick_pick: Option<String> = row.get(5)?;
    let created_at: String = row.get(7)?;
    Ok(Feedback {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        claim_id: row.get(2)?,
        verification_result_id: row.get(3)?,
        feedback_type: parse_enum(4, &feedback_type)?,
        quick_pick: quick_pick.map(|q| parse_enum(5, &q)).transpose()?,
        free_text: row.get(6)?,
        created_at: parse_ts(7, &created_at)?,
    })
}

pub fn insert_feedback(conn: &Connection, f: &Feedback) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO feedback
            (id, repo_id, claim_id, verification_result_id, feedback_type, quick_pick,
             free_text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            f.id,
            f.repo_id,
            f.claim_id,
            f.verification_result_id,
            f.feedback_type.as_str(),
            f.quick_pick.map(|q| q.as_str()),
            f.free_text,
            ts(&f.created_at),
        ],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

pub fn list_for_claim(
    conn: &Connection,
    repo_id: &str,
    claim_id: &str,
) -> Result<Vec<Feedback>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, repo_id, claim_id, verification_result_id, feedback_type, quick_pick,
                    free_text, created_at
             FROM feedback WHERE repo_id = ?1 AND claim_id = ?2 ORDER BY created_at, id",
        )
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![repo_id, claim_id], feedback_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

/// Negative feedback events recorded against one claim.
pub fn count_negative_for_claim(
    conn: &Connection,
    repo_id: &str,
    claim_id: &str,
) -> Result<u32, StorageError> {
    conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM feedback
             WHERE repo_id = ?1 AND claim_id = ?2 AND feedback_type IN {NEGATIVE_TYPES}"
        ),
        params![repo_id, claim_id],
        |row| row.get(0),
    )
    .map_err(StorageError::sqlite)
}

/// Distinct claims of `claim_type` that received negative feedback.
pub fn count_dismissed_claims_of_type(
    conn: &Connection,
    repo_id: &str,
    claim_type: ClaimType,
) -> Result<u32, StorageError> {
    conn.query_row(
        &format!(
            "SELECT COUNT(DISTINCT f.claim_id) FROM feedback f
             JOIN claims c ON c.id = f.claim_id
             WHERE f.repo_id = ?1 AND c.claim_type = ?2 AND f.feedback_type IN {NEGATIVE_TYPES}"
        ),
        params![repo_id, claim_type.as_str()],
        |row| row.get(0),
    )
    .map_err(StorageError::sqlite)
}
