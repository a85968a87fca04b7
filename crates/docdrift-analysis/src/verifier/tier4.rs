//! Tier 4: hand the claim to the agent with a bounded evidence pack.

use tracing::debug;

use docdrift_core::errors::VerificationError;
use docdrift_core::models::{
    AgentMode, AgentTaskType, CandidateSet, Claim, EvidenceFile, VerificationPayload,
};
use docdrift_core::traits::CodebaseIndex;

use super::tokens::TokenCounter;
use crate::agent::AgentQueue;
use crate::mapper::slim_claim;

#[derive(Debug, Clone, Copy)]
pub(crate) struct EvidenceBudget {
    pub max_files: usize,
    pub max_tokens: usize,
}

/// Collect evidence for the top candidate files, skipping any file that
/// would overflow the token budget.
pub(crate) fn gather_evidence(
    index: &dyn CodebaseIndex,
    tokens: &TokenCounter,
    budget: EvidenceBudget,
    claim: &Claim,
    candidates: &CandidateSet,
) -> Result<(Vec<EvidenceFile>, usize), VerificationError> {
    let mut evidence = Vec::new();
    let mut used = 0usize;
    for file in candidates.files().into_iter().take(budget.max_files) {
        let entity = candidates
            .mappings
            .iter()
            .filter(|m| m.code_file == file)
            .find_map(|m| m.code_entity_id.as_deref());
        let mut content = None;
        let mut entity_name = None;
        if let Some(entity_id) = entity {
            let entities = index.entities_in_file(&claim.repo_id, file)?;
            if let Some(e) = entities.into_iter().find(|e| e.id == entity_id) {
                entity_name = Some(e.name);
                content = e.raw_code;
            }
        }
        if content.is_none() {
            content = index.file_content(&claim.repo_id, file)?;
        }
        let Some(content) = content.filter(|c| !c.is_empty()) else {
            continue;
        };
        let cost = tokens.count_cached(&content);
        if used + cost > budget.max_tokens {
            debug!(file, cost, used, "evidence file over budget, skipped");
            continue;
        }
        used += cost;
        evidence.push(EvidenceFile {
            path: file.to_string(),
            entity_name,
            content,
        });
    }
    Ok((evidence, used))
}

/// Enqueue (or reuse) the claim's verification task and return its id.
pub(crate) fn dispatch(
    queue: &AgentQueue,
    index: &dyn CodebaseIndex,
    tokens: &TokenCounter,
    budget: EvidenceBudget,
    scan_run_id: &str,
    claim: &Claim,
    candidates: &CandidateSet,
) -> Result<String, VerificationError> {
    let (evidence, evidence_tokens) = gather_evidence(index, tokens, budget, claim, candidates)?;
    let mode = if evidence.is_empty() {
        AgentMode::Exploration
    } else {
        AgentMode::Evidence
    };
    let enqueued = queue.enqueue(
        &claim.repo_id,
        scan_run_id,
        Some(&claim.id),
        AgentTaskType::Verification,
        &claim.id,
        &VerificationPayload {
            claim: slim_claim(claim),
            mode,
            evidence,
            evidence_tokens,
        },
    )?;
    Ok(enqueued.task_id)
}
