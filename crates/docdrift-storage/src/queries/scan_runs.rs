//! Queries for the scan_runs table.

use chrono::{DateTime, Utc};
use docdrift_core::errors::StorageError;
use docdrift_core::models::{ScanRun, ScanStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_enum, parse_opt_ts, parse_ts, ts};

/// Verdict tallies written when a scan run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    pub total_claims: u32,
    pub verified: u32,
    pub drifted: u32,
    pub uncertain: u32,
    pub pending: u32,
    pub skipped: u32,
}

fn scan_run_from_row(row: &Row<'_>) -> rusqlite::Result<ScanRun> {
    let status: String = row.get(2)?;
    let started_at: String = row.get(3)?;
    Ok(ScanRun {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        status: parse_enum(2, &status)?,
        started_at: parse_ts(3, &started_at)?,
        completed_at: parse_opt_ts(4, row.get(4)?)?,
        total_claims: row.get(5)?,
        verified: row.get(6)?,
        drifted: row.get(7)?,
        uncertain: row.get(8)?,
        pending: row.get(9)?,
        skipped: row.get(10)?,
        error: row.get(11)?,
    })
}

/// Insert a new scan run with status `running`.
pub fn insert_scan_start(
    conn: &Connection,
    id: &str,
    repo_id: &str,
    started_at: DateTime<Utc>,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO scan_runs (id, repo_id, status, started_at) VALUES (?1, ?2, 'running', ?3)",
        params![id, repo_id, ts(&started_at)],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

/// Record completion data on a scan run.
pub fn update_scan_complete(
    conn: &Connection,
    id: &str,
    status: ScanStatus,
    counts: ScanCounts,
    error: Option<&str>,
) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE scan_runs SET
            status = ?1, completed_at = ?2, total_claims = ?3, verified = ?4,
            drifted = ?5, uncertain = ?6, pending = ?7, skipped = ?8, error = ?9
         WHERE id = ?10",
        params![
            status.as_str(),
            ts(&Utc::now()),
            counts.total_claims,
            counts.verified,
            counts.drifted,
            counts.uncertain,
            counts.pending,
            counts.skipped,
            error,
            id
        ],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<ScanRun>, StorageError> {
    conn.query_row(
        "SELECT id, repo_id, status, started_at, completed_at, total_claims, verified,
                drifted, uncertain, pending, skipped, error
         FROM scan_runs WHERE id = ?1",
        params![id],
        scan_run_from_row,
    )
    .optional()
    .map_err(StorageError::sqlite)
}

/// Most recent scan runs for a repo, newest first.
pub fn query_recent(
    conn: &Connection,
    repo_id: &str,
    limit: usize,
) -> Result<Vec<ScanRun>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, repo_id, status, started_at, completed_at, total_claims, verified,
                    drifted, uncertain, pending, skipped, error
             FROM scan_runs WHERE repo_id = ?1 ORDER BY started_at DESC LIMIT ?2",
        )
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![repo_id, limit as i64], scan_run_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}
