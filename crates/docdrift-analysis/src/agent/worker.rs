//! Async agent workers.
//!
//! `concurrency` workers lease tasks from the queue, run them through the
//! executor with a per-call timeout and bounded retries, apply the result,
//! then complete the task. A worker exits once its scope has no open tasks
//! or the token is cancelled. Cancellation never interrupts a call in
//! flight; an abandoned lease expires and the task is picked up again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use docdrift_core::config::AgentConfig;
use docdrift_core::errors::AgentError;
use docdrift_core::models::{AgentTask, AgentTaskStatus};
use docdrift_core::traits::{Cancellable, CancellationToken};
use docdrift_storage::queries::agent_tasks::TaskScope;

use super::applier::ResultApplier;
use super::executor::AgentExecutor;
use super::queue::AgentQueue;

/// Totals across all workers of one [`AgentWorkerPool::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerPoolReport {
    pub completed: usize,
    /// Tasks that spent their job budget.
    pub failed: usize,
    /// Failed attempts returned to the queue for another claim.
    pub requeued: usize,
    /// Completions or failures rejected because the lease had moved on.
    pub lease_lost: usize,
}

impl WorkerPoolReport {
    fn merge(&mut self, other: WorkerPoolReport) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.requeued += other.requeued;
        self.lease_lost += other.lease_lost;
    }
}

enum TaskOutcome {
    Completed,
    Failed(AgentTaskStatus),
    LeaseLost,
}

#[derive(Clone)]
pub struct AgentWorkerPool {
    queue: AgentQueue,
    applier: ResultApplier,
    executor: Arc<dyn AgentExecutor>,
    concurrency: usize,
    call_timeout: Duration,
    calls_per_claim: u32,
    idle_poll: Duration,
}

impl AgentWorkerPool {
    pub fn new(
        queue: AgentQueue,
        applier: ResultApplier,
        executor: Arc<dyn AgentExecutor>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            queue,
            applier,
            executor,
            concurrency: config.effective_concurrency(),
            call_timeout: config.effective_timeout(),
            calls_per_claim: config.effective_retry_per_call_max().max(1),
            idle_poll: Duration::from_millis(250),
        }
    }

    /// How long an idle worker waits before looking again while other
    /// workers still hold tasks.
    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Drain `scope`. Returns once every task in it is completed or failed,
    /// or after cancellation.
    #[instrument(skip(self, cancel), fields(repo_id = %scope.repo_id, executor = self.executor.name()))]
    pub async fn run(&self, scope: TaskScope, cancel: CancellationToken) -> Result<WorkerPoolReport, AgentError> {
        let mut set = JoinSet::new();
        for i in 0..self.concurrency {
            let pool = self.clone();
            let scope = scope.clone();
            let cancel = cancel.clone();
            let worker_id = format!("{}-{}-{i}", self.executor.name(), short_id());
            set.spawn(async move { pool.worker_loop(worker_id, scope, cancel).await });
        }

        let mut report = WorkerPoolReport::default();
        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(r)) => report.merge(r),
                Ok(Err(e)) => {
                    warn!(error = %e, "agent worker stopped");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    warn!(error = %e, "agent worker panicked");
                    first_error.get_or_insert(AgentError::Provider {
                        message: format!("worker task aborted: {e}"),
                    });
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        info!(
            completed = report.completed,
            failed = report.failed,
            requeued = report.requeued,
            lease_lost = report.lease_lost,
            "agent workers drained"
        );
        Ok(report)
    }

    #[instrument(skip(self, scope, cancel))]
    async fn worker_loop(
        &self,
        worker_id: String,
        scope: TaskScope,
        cancel: CancellationToken,
    ) -> Result<WorkerPoolReport, AgentError> {
        let mut report = WorkerPoolReport::default();
        loop {
            if cancel.is_cancelled() {
                debug!("worker cancelled");
                break;
            }
            let Some(task) = self.queue.claim_next(&worker_id, &scope)? else {
                // Leases held by crashed workers only become claimable once swept.
                self.queue.expire_stale()?;
                if self.queue.count_open(&scope)? == 0 {
                    break;
                }
                tokio::time::sleep(self.idle_poll).await;
                continue;
            };
            match self.process(&worker_id, task).await? {
                TaskOutcome::Completed => report.completed += 1,
                TaskOutcome::Failed(AgentTaskStatus::Failed) => report.failed += 1,
                TaskOutcome::Failed(_) => report.requeued += 1,
                TaskOutcome::LeaseLost => report.lease_lost += 1,
            }
        }
        Ok(report)
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, task_type = %task.task_type, attempts = task.attempts))]
    async fn process(&self, worker_id: &str, task: AgentTask) -> Result<TaskOutcome, AgentError> {
        let mut last_error = None;
        for call in 1..=self.calls_per_claim {
            let outcome = tokio::time::timeout(self.call_timeout, self.executor.execute(&task)).await;
            let err = match outcome {
                Ok(Ok(value)) => return self.finish(worker_id, task, value).await,
                Ok(Err(e)) => e,
                Err(_) => AgentError::Timeout {
                    timeout_secs: self.call_timeout.as_secs(),
                },
            };
            let retryable = err.is_retryable();
            warn!(call, error = %err, retryable, "agent call failed");
            last_error = Some(err);
            if !retryable {
                break;
            }
        }
        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "agent call failed".to_string());
        self.record_failure(worker_id, &task.id, &message)
    }

    /// Apply then complete. A result the applier rejects counts as a failed
    /// attempt.
    async fn finish(
        &self,
        worker_id: &str,
        task: AgentTask,
        value: serde_json::Value,
    ) -> Result<TaskOutcome, AgentError> {
        let task_id = task.id.clone();
        let applier = self.applier.clone();
        let queue = self.queue.clone();
        let worker = worker_id.to_string();
        let applied = tokio::task::spawn_blocking(move || match applier.apply(&task, &value) {
            Ok(_) => Applied::Done(queue.complete(&task.id, &worker, &value)),
            Err(e @ AgentError::InvalidResult { .. }) => Applied::Rejected(e.to_string()),
            Err(e) => Applied::Fatal(e),
        })
        .await
        .map_err(|e| AgentError::Provider {
            message: format!("result application aborted: {e}"),
        })?;

        match applied {
            Applied::Done(Ok(())) => Ok(TaskOutcome::Completed),
            Applied::Done(Err(AgentError::LeaseLost { .. })) => {
                warn!("lease lost before completion, result already applied");
                Ok(TaskOutcome::LeaseLost)
            }
            Applied::Done(Err(e)) | Applied::Fatal(e) => Err(e),
            Applied::Rejected(message) => {
                warn!(error = %message, "agent result rejected");
                self.record_failure(worker_id, &task_id, &message)
            }
        }
    }

    fn record_failure(&self, worker_id: &str, task_id: &str, message: &str) -> Result<TaskOutcome, AgentError> {
        match self.queue.fail(task_id, worker_id, message) {
            Ok(status) => Ok(TaskOutcome::Failed(status)),
            Err(AgentError::LeaseLost { .. }) => Ok(TaskOutcome::LeaseLost),
            Err(e) => Err(e),
        }
    }
}

enum Applied {
    Done(Result<(), AgentError>),
    Rejected(String),
    Fatal(AgentError),
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
