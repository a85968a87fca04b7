//! Queries for the leased agent task queue.
//!
//! A task is claimable when it is `pending`, `expired`, or `in_progress`
//! with an elapsed lease, and has attempts left. Claiming is a single
//! `UPDATE ... RETURNING` so two workers can never hold the same lease.

use chrono::{DateTime, Utc};
use docdrift_core::errors::StorageError;
use docdrift_core::models::{AgentTask, AgentTaskStatus, AgentTaskType};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_enum, parse_json, parse_opt_ts, parse_ts, to_json, ts};

const TASK_COLUMNS: &str = "id, repo_id, scan_run_id, claim_id, task_type, status, payload,
    result, claimed_by, error, attempts, created_at, expires_at, completed_at";

/// A task to enqueue. `dedup_key` identifies the subject (claim id,
/// feedback id, result id) within `(scan_run_id, task_type)`.
#[derive(Debug, Clone)]
pub struct NewAgentTask<'a> {
    pub repo_id: &'a str,
    pub scan_run_id: &'a str,
    pub claim_id: Option<&'a str>,
    pub task_type: AgentTaskType,
    pub dedup_key: &'a str,
    pub payload: &'a serde_json::Value,
}

/// Which tasks a worker may claim.
#[derive(Debug, Clone, Default)]
pub struct TaskScope {
    pub repo_id: String,
    pub scan_run_id: Option<String>,
    pub task_type: Option<AgentTaskType>,
}

/// Outcome of [`expire_stale`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpiryCounts {
    pub expired: usize,
    pub failed: usize,
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<AgentTask> {
    let task_type: String = row.get(4)?;
    let status: String = row.get(5)?;
    let payload: String = row.get(6)?;
    let result: Option<String> = row.get(7)?;
    let created_at: String = row.get(11)?;
    let expires_at: String = row.get(12)?;
    Ok(AgentTask {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        scan_run_id: row.get(2)?,
        claim_id: row.get(3)?,
        task_type: parse_enum(4, &task_type)?,
        status: parse_enum(5, &status)?,
        payload: parse_json(6, &payload)?,
        result: result.map(|r| parse_json(7, &r)).transpose()?,
        claimed_by: row.get(8)?,
        error: row.get(9)?,
        attempts: row.get(10)?,
        created_at: parse_ts(11, &created_at)?,
        expires_at: parse_ts(12, &expires_at)?,
        completed_at: parse_opt_ts(13, row.get(13)?)?,
    })
}

/// Insert a task unless one already exists for the same
/// `(scan_run_id, task_type, dedup_key)`. Returns the task id and whether
/// it was newly created.
pub fn enqueue(
    conn: &Connection,
    task: &NewAgentTask<'_>,
    now: DateTime<Utc>,
    ttl: chrono::Duration,
) -> Result<(String, bool), StorageError> {
    let id = uuid::Uuid::new_v4().to_string();
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO agent_tasks
                (id, repo_id, scan_run_id, claim_id, task_type, dedup_key, status, payload,
                 attempts, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, 0, ?8, ?9)",
            params![
                id,
                task.repo_id,
                task.scan_run_id,
                task.claim_id,
                task.task_type.as_str(),
                task.dedup_key,
                to_json(task.payload)?,
                ts(&now),
                ts(&(now + ttl)),
            ],
        )
        .map_err(StorageError::sqlite)?;
    if inserted > 0 {
        return Ok((id, true));
    }
    let existing: String = conn
        .query_row(
            "SELECT id FROM agent_tasks
             WHERE scan_run_id = ?1 AND task_type = ?2 AND dedup_key = ?3",
            params![task.scan_run_id, task.task_type.as_str(), task.dedup_key],
            |row| row.get(0),
        )
        .map_err(StorageError::sqlite)?;
    Ok((existing, false))
}

/// Atomically lease the oldest claimable task in `scope` to `worker_id`.
pub fn claim_next(
    conn: &Connection,
    worker_id: &str,
    scope: &TaskScope,
    now: DateTime<Utc>,
    lease: chrono::Duration,
    max_attempts: u32,
) -> Result<Option<AgentTask>, StorageError> {
    let now_s = ts(&now);
    conn.query_row(
        &format!(
            "UPDATE agent_tasks
             SET status = 'in_progress', claimed_by = ?1, expires_at = ?2,
                 attempts = attempts + 1, error = NULL
             WHERE id = (
                SELECT id FROM agent_tasks
                WHERE repo_id = ?3
                  AND (?4 IS NULL OR scan_run_id = ?4)
                  AND (?5 IS NULL OR task_type = ?5)
                  AND attempts < ?6
                  AND (status IN ('pending', 'expired')
                       OR (status = 'in_progress' AND expires_at <= ?7))
                ORDER BY created_at, rowid
                LIMIT 1
             )
             RETURNING {TASK_COLUMNS}"
        ),
        params![
            worker_id,
            ts(&(now + lease)),
            scope.repo_id,
            scope.scan_run_id,
            scope.task_type.map(|t| t.as_str()),
            max_attempts,
            now_s,
        ],
        task_from_row,
    )
    .optional()
    .map_err(StorageError::sqlite)
}

/// Mark a task completed. Returns `false` when `worker_id` does not hold an
/// unexpired lease on it.
pub fn complete(
    conn: &Connection,
    task_id: &str,
    worker_id: &str,
    result: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let now_s = ts(&now);
    let n = conn
        .execute(
            "UPDATE agent_tasks
             SET status = 'completed', result = ?1, completed_at = ?2
             WHERE id = ?3 AND claimed_by = ?4 AND status = 'in_progress' AND expires_at > ?2",
            params![to_json(result)?, now_s, task_id, worker_id],
        )
        .map_err(StorageError::sqlite)?;
    Ok(n > 0)
}

/// Record a failed attempt. The task returns to `pending` while attempts
/// remain, otherwise it becomes `failed`. Returns the new status, or `None`
/// when `worker_id` does not hold an unexpired lease.
pub fn fail(
    conn: &Connection,
    task_id: &str,
    worker_id: &str,
    error: &str,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<Option<AgentTaskStatus>, StorageError> {
    let now_s = ts(&now);
    let status: Option<String> = conn
        .query_row(
            "UPDATE agent_tasks
             SET status = CASE WHEN attempts >= ?1 THEN 'failed' ELSE 'pending' END,
                 error = ?2,
                 claimed_by = NULL,
                 completed_at = CASE WHEN attempts >= ?1 THEN ?3 ELSE NULL END
             WHERE id = ?4 AND claimed_by = ?5 AND status = 'in_progress' AND expires_at > ?3
             RETURNING status",
            params![max_attempts, error, now_s, task_id, worker_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(StorageError::sqlite)?;
    status.map(|s| s.parse::<AgentTaskStatus>().map_err(|message| StorageError::CorruptRow {
        table: "agent_tasks",
        message,
    }))
    .transpose()
}

/// Sweep elapsed leases and stale pending tasks. In-progress tasks whose
/// lease has elapsed become `failed` once attempts are exhausted.
pub fn expire_stale(
    conn: &Connection,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<ExpiryCounts, StorageError> {
    let now_s = ts(&now);
    let failed = conn
        .execute(
            "UPDATE agent_tasks
             SET status = 'failed', claimed_by = NULL, completed_at = ?1,
                 error = COALESCE(error, 'lease expired')
             WHERE status = 'in_progress' AND expires_at <= ?1 AND attempts >= ?2",
            params![now_s, max_attempts],
        )
        .map_err(StorageError::sqlite)?;
    let expired = conn
        .execute(
            "UPDATE agent_tasks
             SET status = 'expired', claimed_by = NULL
             WHERE status IN ('in_progress', 'pending') AND expires_at <= ?1",
            params![now_s],
        )
        .map_err(StorageError::sqlite)?;
    Ok(ExpiryCounts { expired, failed })
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<AgentTask>, StorageError> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM agent_tasks WHERE id = ?1"),
        params![id],
        task_from_row,
    )
    .optional()
    .map_err(StorageError::sqlite)
}

pub fn list_by_scan(conn: &Connection, scan_run_id: &str) -> Result<Vec<AgentTask>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {TASK_COLUMNS} FROM agent_tasks WHERE scan_run_id = ?1 ORDER BY created_at, rowid"
        ))
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![scan_run_id], task_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

/// Number of tasks in `scope` that are not yet completed or failed.
pub fn count_open(conn: &Connection, scope: &TaskScope) -> Result<i64, StorageError> {
    conn.query_row(
        "SELECT COUNT(*) FROM agent_tasks
         WHERE repo_id = ?1
           AND (?2 IS NULL OR scan_run_id = ?2)
           AND (?3 IS NULL OR task_type = ?3)
           AND status NOT IN ('completed', 'failed')",
        params![
            scope.repo_id,
            scope.scan_run_id,
            scope.task_type.map(|t| t.as_str())
        ],
        |row| row.get(0),
    )
    .map_err(StorageError::sqlite)
}
