//! Queries for verification_results.

use chrono::{DateTime, Utc};
use docdrift_core::errors::StorageError;
use docdrift_core::models::{VerificationPath, VerificationResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_enum, parse_json, parse_ts, to_json, ts};

const RESULT_COLUMNS: &str = "id, claim_id, repo_id, scan_run_id, verdict, confidence, tier,
    severity, reasoning, specific_mismatch, suggested_fix, evidence_files, token_cost,
    duration_ms, verification_path, suppressed, suppression_rule_id, created_at";

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<VerificationResult> {
    let verdict: String = row.get(4)?;
    let tier: u8 = row.get(6)?;
    let severity: Option<String> = row.get(7)?;
    let evidence: String = row.get(11)?;
    let path: String = row.get(14)?;
    let created_at: String = row.get(17)?;
    Ok(VerificationResult {
        id: row.get(0)?,
        claim_id: row.get(1)?,
        repo_id: row.get(2)?,
        scan_run_id: row.get(3)?,
        verdict: parse_enum(4, &verdict)?,
        confidence: row.get(5)?,
        tier: tier.try_into().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Integer, e.into())
        })?,
        severity: severity.map(|s| parse_enum(7, &s)).transpose()?,
        reasoning: row.get(8)?,
        specific_mismatch: row.get(9)?,
        suggested_fix: row.get(10)?,
        evidence_files: parse_json(11, &evidence)?,
        token_cost: row.get(12)?,
        duration_ms: row.get(13)?,
        verification_path: parse_enum(14, &path)?,
        suppressed: row.get(15)?,
        suppression_rule_id: row.get(16)?,
        created_at: parse_ts(17, &created_at)?,
    })
}

/// Insert a result unless one already exists for
/// `(claim_id, scan_run_id, verification_path)`. Returns whether it was inserted.
pub fn insert_result(conn: &Connection, r: &VerificationResult) -> Result<bool, StorageError> {
    let n = conn
        .execute(
            "INSERT OR IGNORE INTO verification_results
                (id, claim_id, repo_id, scan_run_id, verdict, confidence, tier, severity,
                 reasoning, specific_mismatch, suggested_fix, evidence_files, token_cost,
                 duration_ms, verification_path, suppressed, suppression_rule_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                r.id,
                r.claim_id,
                r.repo_id,
                r.scan_run_id,
                r.verdict.as_str(),
                r.confidence,
                r.tier.as_u8(),
                r.severity.map(|s| s.as_str()),
                r.reasoning,
                r.specific_mismatch,
                r.suggested_fix,
                to_json(&r.evidence_files)?,
                r.token_cost,
                r.duration_ms,
                r.verification_path.as_str(),
                r.suppressed,
                r.suppression_rule_id,
                ts(&r.created_at),
            ],
        )
        .map_err(StorageError::sqlite)?;
    Ok(n > 0)
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<VerificationResult>, StorageError> {
    conn.query_row(
        &format!("SELECT {RESULT_COLUMNS} FROM verification_results WHERE id = ?1"),
        params![id],
        result_from_row,
    )
    .optional()
    .map_err(StorageError::sqlite)
}

/// The result stored under the idempotency key, if any.
pub fn get_by_key(
    conn: &Connection,
    claim_id: &str,
    scan_run_id: &str,
    path: VerificationPath,
) -> Result<Option<VerificationResult>, StorageError> {
    conn.query_row(
        &format!(
            "SELECT {RESULT_COLUMNS} FROM verification_results
             WHERE claim_id = ?1 AND scan_run_id = ?2 AND verification_path = ?3"
        ),
        params![claim_id, scan_run_id, path.as_str()],
        result_from_row,
    )
    .optional()
    .map_err(StorageError::sqlite)
}

pub fn list_for_scan(
    conn: &Connection,
    scan_run_id: &str,
) -> Result<Vec<VerificationResult>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {RESULT_COLUMNS} FROM verification_results
             WHERE scan_run_id = ?1 ORDER BY created_at, claim_id"
        ))
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![scan_run_id], result_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

pub fn latest_for_claim(
    conn: &Connection,
    claim_id: &str,
) -> Result<Option<VerificationResult>, StorageError> {
    conn.query_row(
        &format!(
            "SELECT {RESULT_COLUMNS} FROM verification_results
             WHERE claim_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ),
        params![claim_id],
        result_from_row,
    )
    .optional()
    .map_err(StorageError::sqlite)
}

/// Re-stamp suppression state after a rule is created, revoked or expires.
pub fn set_suppression(
    conn: &Connection,
    result_id: &str,
    rule_id: Option<&str>,
) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE verification_results SET suppressed = ?1, suppression_rule_id = ?2 WHERE id = ?3",
        params![rule_id.is_some(), rule_id, result_id],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

/// Results currently stamped as suppressed by `rule_id`.
pub fn list_suppressed_by_rule(
    conn: &Connection,
    rule_id: &str,
) -> Result<Vec<VerificationResult>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {RESULT_COLUMNS} FROM verification_results
             WHERE suppressed = 1 AND suppression_rule_id = ?1 ORDER BY created_at, claim_id"
        ))
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![rule_id], result_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

/// Unsuppressed results of a repo, candidates for a newly created rule.
pub fn list_unsuppressed_for_repo(
    conn: &Connection,
    repo_id: &str,
) -> Result<Vec<VerificationResult>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {RESULT_COLUMNS} FROM verification_results
             WHERE repo_id = ?1 AND suppressed = 0 ORDER BY created_at, claim_id"
        ))
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![repo_id], result_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

/// Results still stamped by a rule that is revoked or expired as of `now`.
pub fn list_suppressed_by_inactive_rules(
    conn: &Connection,
    repo_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<VerificationResult>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {RESULT_COLUMNS} FROM verification_results
             WHERE repo_id = ?1 AND suppressed = 1
               AND suppression_rule_id IN (
                   SELECT id FROM suppression_rules
                   WHERE revoked = 1 OR (expires_at IS NOT NULL AND expires_at <= ?2))
             ORDER BY created_at, claim_id"
        ))
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![repo_id, ts(&now)], result_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}
