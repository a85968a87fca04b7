//! Queries for suppression_rules. Rules are soft-deleted via `revoked`.

use chrono::{DateTime, Utc};
use docdrift_core::errors::StorageError;
use docdrift_core::models::{RuleSource, SuppressionRule, SuppressionScope};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_enum, parse_opt_ts, parse_ts, ts};

const RULE_COLUMNS: &str = "id, repo_id, scope, target_claim_id, target_file, target_claim_type,
    target_pattern, reason, source, expires_at, revoked, created_at";

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<SuppressionRule> {
    let scope: String = row.get(2)?;
    let claim_type: Option<String> = row.get(5)?;
    let source: String = row.get(8)?;
    let created_at: String = row.get(11)?;
    Ok(SuppressionRule {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        scope: parse_enum(2, &scope)?,
        target_claim_id: row.get(3)?,
        target_file: row.get(4)?,
        target_claim_type: claim_type.map(|t| parse_enum(5, &t)).transpose()?,
        target_pattern: row.get(6)?,
        reason: row.get(7)?,
        source: parse_enum(8, &source)?,
        expires_at: parse_opt_ts(9, row.get(9)?)?,
        revoked: row.get(10)?,
        created_at: parse_ts(11, &created_at)?,
    })
}

fn query_rules<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<SuppressionRule>, StorageError> {
    let mut stmt = conn.prepare_cached(sql).map_err(StorageError::sqlite)?;
    let rows = stmt.query_map(params, rule_from_row).map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

pub fn insert_rule(conn: &Connection, rule: &SuppressionRule) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO suppression_rules
            (id, repo_id, scope, target_claim_id, target_file, target_claim_type,
             target_pattern, reason, source, expires_at, revoked, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            rule.id,
            rule.repo_id,
            rule.scope.as_str(),
            rule.target_claim_id,
            rule.target_file,
            rule.target_claim_type.map(|t| t.as_str()),
            rule.target_pattern,
            rule.reason,
            rule.source.as_str(),
            rule.expires_at.as_ref().map(ts),
            rule.revoked,
            ts(&rule.created_at),
        ],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<SuppressionRule>, StorageError> {
    conn.query_row(
        &format!("SELECT {RULE_COLUMNS} FROM suppression_rules WHERE id = ?1"),
        params![id],
        rule_from_row,
    )
    .optional()
    .map_err(StorageError::sqlite)
}

/// Non-revoked, unexpired rules for a repo, oldest first.
pub fn list_active(
    conn: &Connection,
    repo_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<SuppressionRule>, StorageError> {
    query_rules(
        conn,
        &format!(
            "SELECT {RULE_COLUMNS} FROM suppression_rules
             WHERE repo_id = ?1 AND revoked = 0 AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY created_at, id"
        ),
        params![repo_id, ts(&now)],
    )
}

/// Every rule for a repo including revoked and expired ones.
pub fn list_all(conn: &Connection, repo_id: &str) -> Result<Vec<SuppressionRule>, StorageError> {
    query_rules(
        conn,
        &format!(
            "SELECT {RULE_COLUMNS} FROM suppression_rules WHERE repo_id = ?1 ORDER BY created_at, id"
        ),
        params![repo_id],
    )
}

/// Soft-delete a rule. Returns whether an active rule was revoked.
pub fn revoke(conn: &Connection, id: &str) -> Result<bool, StorageError> {
    let n = conn
        .execute(
            "UPDATE suppression_rules SET revoked = 1 WHERE id = ?1 AND revoked = 0",
            params![id],
        )
        .map_err(StorageError::sqlite)?;
    Ok(n > 0)
}

/// Whether an active rule from `source` already targets `target` in `scope`.
/// `target` is the claim id, file, claim type, or pattern depending on scope.
pub fn has_active_rule(
    conn: &Connection,
    repo_id: &str,
    scope: SuppressionScope,
    source: RuleSource,
    target: &str,
    now: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let column = match scope {
        SuppressionScope::Claim => "target_claim_id",
        SuppressionScope::File => "target_file",
        SuppressionScope::ClaimType => "target_claim_type",
        SuppressionScope::Pattern => "target_pattern",
    };
    conn.query_row(
        &format!(
            "SELECT EXISTS(
                SELECT 1 FROM suppression_rules
                WHERE repo_id = ?1 AND scope = ?2 AND source = ?3 AND {column} = ?4
                  AND revoked = 0 AND (expires_at IS NULL OR expires_at > ?5))"
        ),
        params![repo_id, scope.as_str(), source.as_str(), target, ts(&now)],
        |row| row.get(0),
    )
    .map_err(StorageError::sqlite)
}

/// Revoke active count-based claim rules for a claim. Returns the revoked ids.
pub fn revoke_count_based_for_claim(
    conn: &Connection,
    repo_id: &str,
    claim_id: &str,
) -> Result<Vec<String>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "UPDATE suppression_rules SET revoked = 1
             WHERE repo_id = ?1 AND scope = 'claim' AND source = 'count_based'
               AND target_claim_id = ?2 AND revoked = 0
             RETURNING id",
        )
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![repo_id, claim_id], |row| row.get(0))
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}
