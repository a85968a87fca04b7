//! Agent task queue and worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_AGENT_CONCURRENCY, MIN_AGENT_CONCURRENCY, RETRY_PER_CALL_MAX, RETRY_PER_JOB_MAX,
};

/// Configuration for the LLM-assisted tier and its worker pool.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Whether Tier 4 / llm_assisted mapping may enqueue agent work. Default: true.
    pub enabled: Option<bool>,
    /// Worker pool size (1-20). Default: 5.
    pub concurrency: Option<usize>,
    /// Bound on one agent attempt (30-600). A lease covers every attempt of one claim. Default: 120.
    pub timeout_seconds: Option<u64>,
    /// Maximum evidence files handed to the agent per claim. Default: 15.
    pub max_agent_files_per_claim: Option<usize>,
    /// Token budget for evidence passed with a verification task. Default: 4000.
    pub path1_max_evidence_tokens: Option<usize>,
    /// Attempts per agent call. Default: 2.
    pub retry_per_call_max: Option<u32>,
    /// Claims per task before it is failed for good. Default: 3.
    pub retry_per_job_max: Option<u32>,
    /// Lifetime of an unclaimed task in seconds. Default: 1800.
    pub task_ttl_seconds: Option<u64>,
    /// HTTP endpoint of the agent service, if any.
    pub endpoint: Option<String>,
}

impl AgentConfig {
    pub fn effective_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Returns the effective concurrency, clamped to the supported range.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency
            .unwrap_or(5)
            .clamp(MIN_AGENT_CONCURRENCY, MAX_AGENT_CONCURRENCY)
    }

    pub fn effective_timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(120)
    }

    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.effective_timeout_seconds())
    }

    pub fn effective_max_agent_files_per_claim(&self) -> usize {
        self.max_agent_files_per_claim.unwrap_or(15)
    }

    pub fn effective_path1_max_evidence_tokens(&self) -> usize {
        self.path1_max_evidence_tokens.unwrap_or(4000)
    }

    pub fn effective_retry_per_call_max(&self) -> u32 {
        self.retry_per_call_max.unwrap_or(RETRY_PER_CALL_MAX).max(1)
    }

    pub fn effective_retry_per_job_max(&self) -> u32 {
        self.retry_per_job_max.unwrap_or(RETRY_PER_JOB_MAX).max(1)
    }

    pub fn effective_task_ttl_seconds(&self) -> u64 {
        self.task_ttl_seconds.unwrap_or(1800)
    }
}
