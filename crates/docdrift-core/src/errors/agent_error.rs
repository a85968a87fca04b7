//! Agent task queue and executor errors.

use super::error_code::{self, DocDriftErrorCode};
use super::StorageError;

/// LLM-backed work failures. Retried within bounds, then surfaced on the task.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Agent call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Agent provider error: {message}")]
    Provider { message: String },

    #[error("Agent provider rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Agent returned an invalid result: {message}")]
    InvalidResult { message: String },

    #[error("Lease on task {task_id} is no longer held by {worker_id}")]
    LeaseLost { task_id: String, worker_id: String },

    #[error("Agent tier is not configured")]
    NotConfigured,
}

impl AgentError {
    /// Whether a retry of the same call can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Provider { .. })
    }
}

impl DocDriftErrorCode for AgentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.error_code(),
            Self::LeaseLost { .. } => error_code::LEASE_LOST,
            _ => error_code::AGENT_TASK_FAILURE,
        }
    }
}
