//! AgentQueue: leased work queue over the `agent_tasks` table.
//!
//! Every state transition is a single conditional UPDATE, so any number of
//! workers (in this process or others sharing the database file) can race on
//! the same rows. Delivery is at-least-once: a lease that elapses makes the
//! task claimable again, and result application downstream is idempotent.
//!
//! The `*_at` variants take an explicit clock for deterministic tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use docdrift_core::config::AgentConfig;
use docdrift_core::errors::{AgentError, StorageError};
use docdrift_core::models::{AgentTask, AgentTaskStatus, AgentTaskType};
use docdrift_storage::queries::agent_tasks::{self, ExpiryCounts, NewAgentTask, TaskScope};
use docdrift_storage::DatabaseManager;

/// Result of [`AgentQueue::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    pub task_id: String,
    /// False when an identical task already existed for the scan run.
    pub created: bool,
}

#[derive(Clone)]
pub struct AgentQueue {
    db: Arc<DatabaseManager>,
    lease: chrono::Duration,
    ttl: chrono::Duration,
    max_attempts: u32,
}

impl AgentQueue {
    pub fn new(db: Arc<DatabaseManager>, config: &AgentConfig) -> Self {
        let per_call = config.effective_timeout_seconds() as i64;
        let calls = i64::from(config.effective_retry_per_call_max());
        Self {
            db,
            lease: chrono::Duration::seconds(per_call * calls),
            ttl: chrono::Duration::seconds(config.effective_task_ttl_seconds() as i64),
            max_attempts: config.effective_retry_per_job_max(),
        }
    }

    /// Override the lease length.
    pub fn with_lease(mut self, lease: chrono::Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn lease(&self) -> chrono::Duration {
        self.lease
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn db(&self) -> &Arc<DatabaseManager> {
        &self.db
    }

    /// Enqueue a task, reusing an existing one with the same
    /// `(scan_run_id, task_type, dedup_key)`.
    #[instrument(skip(self, payload))]
    pub fn enqueue<P: Serialize>(
        &self,
        repo_id: &str,
        scan_run_id: &str,
        claim_id: Option<&str>,
        task_type: AgentTaskType,
        dedup_key: &str,
        payload: &P,
    ) -> Result<Enqueued, StorageError> {
        let payload = serde_json::to_value(payload).map_err(|e| StorageError::CorruptRow {
            table: "agent_tasks",
            message: format!("unserializable {task_type} payload: {e}"),
        })?;
        let task = NewAgentTask {
            repo_id,
            scan_run_id,
            claim_id,
            task_type,
            dedup_key,
            payload: &payload,
        };
        let (task_id, created) = self
            .db
            .with_writer(|conn| agent_tasks::enqueue(conn, &task, Utc::now(), self.ttl))?;
        if created {
            debug!(task_id = %task_id, "agent task enqueued");
        } else {
            debug!(task_id = %task_id, "agent task already queued");
        }
        Ok(Enqueued { task_id, created })
    }

    pub fn claim_next(
        &self,
        worker_id: &str,
        scope: &TaskScope,
    ) -> Result<Option<AgentTask>, AgentError> {
        self.claim_next_at(worker_id, scope, Utc::now())
    }

    /// Lease the oldest claimable task in `scope`.
    #[instrument(skip(self, scope), fields(repo_id = %scope.repo_id))]
    pub fn claim_next_at(
        &self,
        worker_id: &str,
        scope: &TaskScope,
        now: DateTime<Utc>,
    ) -> Result<Option<AgentTask>, AgentError> {
        let task = self.db.with_writer(|conn| {
            agent_tasks::claim_next(conn, worker_id, scope, now, self.lease, self.max_attempts)
        })?;
        if let Some(t) = &task {
            debug!(task_id = %t.id, attempts = t.attempts, "task leased");
        }
        Ok(task)
    }

    pub fn complete(
        &self,
        task_id: &str,
        worker_id: &str,
        result: &serde_json::Value,
    ) -> Result<(), AgentError> {
        self.complete_at(task_id, worker_id, result, Utc::now())
    }

    /// Record a result. Fails with [`AgentError::LeaseLost`] unless
    /// `worker_id` still holds an unexpired lease.
    #[instrument(skip(self, result))]
    pub fn complete_at(
        &self,
        task_id: &str,
        worker_id: &str,
        result: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), AgentError> {
        let done = self
            .db
            .with_writer(|conn| agent_tasks::complete(conn, task_id, worker_id, result, now))?;
        if !done {
            return Err(lease_lost(task_id, worker_id));
        }
        debug!("task completed");
        Ok(())
    }

    pub fn fail(
        &self,
        task_id: &str,
        worker_id: &str,
        error: &str,
    ) -> Result<AgentTaskStatus, AgentError> {
        self.fail_at(task_id, worker_id, error, Utc::now())
    }

    /// Record a failed attempt. Returns `pending` while attempts remain and
    /// `failed` once the job budget is spent.
    #[instrument(skip(self))]
    pub fn fail_at(
        &self,
        task_id: &str,
        worker_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<AgentTaskStatus, AgentError> {
        let status = self.db.with_writer(|conn| {
            agent_tasks::fail(conn, task_id, worker_id, error, now, self.max_attempts)
        })?;
        match status {
            Some(AgentTaskStatus::Failed) => {
                warn!(error, "agent task failed permanently");
                Ok(AgentTaskStatus::Failed)
            }
            Some(s) => Ok(s),
            None => Err(lease_lost(task_id, worker_id)),
        }
    }

    pub fn expire_stale(&self) -> Result<ExpiryCounts, AgentError> {
        self.expire_stale_at(Utc::now())
    }

    /// Sweep elapsed leases and unclaimed tasks past their TTL.
    #[instrument(skip(self))]
    pub fn expire_stale_at(&self, now: DateTime<Utc>) -> Result<ExpiryCounts, AgentError> {
        let counts = self
            .db
            .with_writer(|conn| agent_tasks::expire_stale(conn, now, self.max_attempts))?;
        if counts.expired > 0 || counts.failed > 0 {
            info!(expired = counts.expired, failed = counts.failed, "stale agent tasks swept");
        }
        Ok(counts)
    }

    pub fn get(&self, task_id: &str) -> Result<Option<AgentTask>, AgentError> {
        Ok(self.db.with_reader(|conn| agent_tasks::get(conn, task_id))?)
    }

    pub fn list_by_scan(&self, scan_run_id: &str) -> Result<Vec<AgentTask>, AgentError> {
        Ok(self
            .db
            .with_reader(|conn| agent_tasks::list_by_scan(conn, scan_run_id))?)
    }

    /// Tasks in `scope` that are not yet completed or failed.
    pub fn count_open(&self, scope: &TaskScope) -> Result<i64, AgentError> {
        Ok(self.db.with_reader(|conn| agent_tasks::count_open(conn, scope))?)
    }
}

fn lease_lost(task_id: &str, worker_id: &str) -> AgentError {
    AgentError::LeaseLost {
        task_id: task_id.to_string(),
        worker_id: worker_id.to_string(),
    }
}
