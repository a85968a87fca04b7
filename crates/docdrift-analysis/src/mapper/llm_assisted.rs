//! `llm_assisted` strategy: hand semantic claims the other strategies could
//! not place to the agent. The agent's answer comes back later as
//! `llm_assisted` mappings.

use docdrift_core::errors::StorageError;
use docdrift_core::models::{
    AgentMode, AgentTaskType, CandidateSet, Claim, ClassificationPayload, Testability,
    VerificationPayload,
};

use crate::agent::AgentQueue;

/// Enqueue exploration for an empty set or classification for an ambiguous
/// one. Returns the task id, or `None` when the claim needs no help.
pub(super) fn enqueue(
    queue: &AgentQueue,
    scan_run_id: &str,
    claim: &Claim,
    set: &CandidateSet,
    max_files: usize,
) -> Result<Option<String>, StorageError> {
    if claim.testability != Testability::Semantic {
        return Ok(None);
    }

    let payload_claim = slim(claim);
    let enqueued = if set.is_empty() {
        queue.enqueue(
            &claim.repo_id,
            scan_run_id,
            Some(&claim.id),
            AgentTaskType::Verification,
            &claim.id,
            &VerificationPayload {
                claim: payload_claim,
                mode: AgentMode::Exploration,
                evidence: Vec::new(),
                evidence_tokens: 0,
            },
        )?
    } else if set.is_ambiguous() {
        let candidate_files = set
            .files()
            .into_iter()
            .take(max_files)
            .map(str::to_string)
            .collect();
        queue.enqueue(
            &claim.repo_id,
            scan_run_id,
            Some(&claim.id),
            AgentTaskType::ClaimClassification,
            &claim.id,
            &ClassificationPayload {
                claim: payload_claim,
                candidate_files,
            },
        )?
    } else {
        return Ok(None);
    };
    Ok(Some(enqueued.task_id))
}

/// The claim as sent to the agent; the embedding is not useful there.
pub(crate) fn slim(claim: &Claim) -> Claim {
    let mut c = claim.clone();
    c.embedding = None;
    c
}
