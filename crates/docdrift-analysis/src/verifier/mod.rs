//! Tiered verifier.
//!
//! Tier 1 (deterministic) → Tier 2 (structural) → Tier 3 (semantic) →
//! Tier 4 (agent). A tier either returns a terminal verdict or escalates;
//! the result records the first tier that terminated. Tier 4 is deferred:
//! it enqueues an agent task and the result is written when the task's
//! output is applied.

pub(crate) mod record;
pub mod severity;
mod tier1;
mod tier2;
mod tier3;
mod tier4;
pub mod tokens;
pub mod url_probe;
pub mod version;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, instrument};

use docdrift_core::config::{DocDriftConfig, VerificationConfig};
use docdrift_core::errors::VerificationError;
use docdrift_core::models::{
    CandidateSet, Claim, MappingWeights, Tier, Verdict, VerificationPath, VerificationResult,
};
use docdrift_core::traits::CodebaseIndex;

use crate::agent::AgentQueue;
use tier1::Tier1;
use tier2::Tier2;
use tier4::EvidenceBudget;
use tokens::TokenCounter;
use url_probe::{HttpUrlProbe, UrlProbe};

pub use record::persist_result;

/// One tier's verdict before it becomes a [`VerificationResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct TierVerdict {
    pub verdict: Verdict,
    pub confidence: f64,
    pub reasoning: String,
    pub specific_mismatch: Option<String>,
    pub suggested_fix: Option<String>,
    pub evidence_files: Vec<String>,
    /// Overrides the tier's default path.
    pub path: Option<VerificationPath>,
}

impl TierVerdict {
    fn new(verdict: Verdict, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            verdict,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            specific_mismatch: None,
            suggested_fix: None,
            evidence_files: Vec::new(),
            path: None,
        }
    }

    pub fn verified(confidence: f64, reasoning: impl Into<String>) -> Self {
        Self::new(Verdict::Verified, confidence, reasoning)
    }

    pub fn drifted(confidence: f64, reasoning: impl Into<String>) -> Self {
        Self::new(Verdict::Drifted, confidence, reasoning)
    }

    pub fn uncertain(confidence: f64, reasoning: impl Into<String>) -> Self {
        Self::new(Verdict::Uncertain, confidence, reasoning)
    }

    /// Terminal `uncertain`: the evidence points at several places equally.
    pub fn ambiguous(reasoning: impl Into<String>) -> Self {
        Self::uncertain(0.5, reasoning).with_path(VerificationPath::Ambiguity)
    }

    pub fn with_mismatch(mut self, mismatch: impl Into<String>) -> Self {
        self.specific_mismatch = Some(mismatch.into());
        self
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    pub fn with_evidence(mut self, files: Vec<String>) -> Self {
        self.evidence_files = files;
        self
    }

    pub fn with_path(mut self, path: VerificationPath) -> Self {
        self.path = Some(path);
        self
    }

    /// Whether the ladder stops here.
    pub fn is_terminal(&self, uncertain_floor: f64) -> bool {
        match self.verdict {
            Verdict::Verified | Verdict::Drifted => true,
            Verdict::Uncertain => {
                self.path == Some(VerificationPath::Ambiguity) || self.confidence >= uncertain_floor
            }
        }
    }
}

/// What [`Verifier::verify`] produced for one claim.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// A verdict from tiers 1-3, not yet persisted.
    Final(VerificationResult),
    /// Handed to the agent tier; the claim stays pending.
    Deferred { task_id: String },
}

fn default_path(tier: Tier) -> VerificationPath {
    match tier {
        Tier::Deterministic => VerificationPath::Deterministic,
        Tier::Structural => VerificationPath::Structural,
        Tier::Semantic => VerificationPath::Semantic,
        Tier::Agent => VerificationPath::AgentEvidence,
    }
}

/// Turn a tier verdict into a result row. A `verified` verdict over an
/// ambiguous candidate set is capped to `uncertain`; only drifted results
/// get a severity.
pub fn build_result(
    claim: &Claim,
    scan_run_id: &str,
    tier: Tier,
    mut v: TierVerdict,
    ambiguous: bool,
    duration_ms: Option<u64>,
) -> VerificationResult {
    if ambiguous && v.verdict == Verdict::Verified {
        v.verdict = Verdict::Uncertain;
        v.confidence = v.confidence.min(0.5);
        v.reasoning = format!("{} (several equally ranked code locations)", v.reasoning);
        v.path = Some(VerificationPath::Ambiguity);
    }
    let severity = (v.verdict == Verdict::Drifted)
        .then(|| severity::assign(claim.claim_type, v.confidence));
    VerificationResult {
        id: uuid::Uuid::new_v4().to_string(),
        claim_id: claim.id.clone(),
        repo_id: claim.repo_id.clone(),
        scan_run_id: scan_run_id.to_string(),
        verdict: v.verdict,
        confidence: v.confidence.clamp(0.0, 1.0),
        tier,
        severity,
        reasoning: Some(v.reasoning),
        specific_mismatch: v.specific_mismatch,
        suggested_fix: v.suggested_fix,
        evidence_files: v.evidence_files,
        token_cost: None,
        duration_ms,
        verification_path: v.path.unwrap_or_else(|| default_path(tier)),
        suppressed: false,
        suppression_rule_id: None,
        created_at: Utc::now(),
    }
}

pub struct Verifier {
    index: Arc<dyn CodebaseIndex>,
    queue: Option<AgentQueue>,
    url_probe: Option<Arc<dyn UrlProbe>>,
    tokens: Arc<TokenCounter>,
    weights: MappingWeights,
    config: VerificationConfig,
    budget: EvidenceBudget,
}

impl Verifier {
    /// Tier 4 is available when the agent tier is enabled; URLs are probed
    /// over HTTP when `url_check.enabled`.
    pub fn new(
        db: Arc<docdrift_storage::DatabaseManager>,
        index: Arc<dyn CodebaseIndex>,
        config: &DocDriftConfig,
    ) -> Self {
        let queue = config
            .agent
            .effective_enabled()
            .then(|| AgentQueue::new(db, &config.agent));
        let url_probe = config
            .url_check
            .effective_enabled()
            .then(|| Arc::new(HttpUrlProbe::new(&config.url_check)) as Arc<dyn UrlProbe>);
        Self {
            index,
            queue,
            url_probe,
            tokens: Arc::new(TokenCounter::default()),
            weights: config.mapping.weights(),
            config: config.verification.clone(),
            budget: EvidenceBudget {
                max_files: config.agent.effective_max_agent_files_per_claim(),
                max_tokens: config.agent.effective_path1_max_evidence_tokens(),
            },
        }
    }

    /// Replace (or remove) the URL probe.
    pub fn with_url_probe(mut self, probe: Option<Arc<dyn UrlProbe>>) -> Self {
        self.url_probe = probe;
        self
    }

    /// Replace (or remove) the queue used by Tier 4.
    pub fn with_queue(mut self, queue: Option<AgentQueue>) -> Self {
        self.queue = queue;
        self
    }

    pub fn has_agent_tier(&self) -> bool {
        self.queue.is_some()
    }

    /// Run the ladder for one claim. Nothing is persisted except a Tier-4
    /// task.
    #[instrument(skip(self, claim, candidates), fields(claim_id = %claim.id))]
    pub fn verify(
        &self,
        scan_run_id: &str,
        claim: &Claim,
        candidates: &CandidateSet,
    ) -> Result<VerifyOutcome, VerificationError> {
        let started = Instant::now();
        let floor = self.config.effective_uncertain_terminal_confidence();
        let ambiguous = candidates.is_ambiguous();
        let mut last_confidence: Option<f64> = None;

        let finish = |tier: Tier, v: TierVerdict| {
            let elapsed = started.elapsed().as_millis() as u64;
            debug!(tier = tier.as_u8(), verdict = %v.verdict, tier_duration_ms = elapsed, "claim verified");
            VerifyOutcome::Final(build_result(claim, scan_run_id, tier, v, ambiguous, Some(elapsed)))
        };

        let tier1 = Tier1 {
            index: self.index.as_ref(),
            url_probe: self.url_probe.as_deref(),
        };
        if let Some(v) = tier1.check(claim, candidates)? {
            if v.is_terminal(floor) {
                return Ok(finish(Tier::Deterministic, v));
            }
            last_confidence = Some(v.confidence);
        }

        let tier2 = Tier2 {
            index: self.index.as_ref(),
            tolerance: self.config.effective_signature_tolerance(),
        };
        let structural = tier2.check(claim, candidates)?;
        if let Some(v) = structural.verdict {
            if v.is_terminal(floor) {
                return Ok(finish(Tier::Structural, v));
            }
            last_confidence = Some(v.confidence);
        }
        if let Some(concern) = &structural.concern {
            debug!(concern = %concern, "structural concern, tier 3 cannot verify");
        }

        if let Some(v) = tier3::check(
            candidates,
            self.weights,
            self.config.effective_semantic_verify_threshold(),
            structural.concern.is_some(),
        ) {
            return Ok(finish(Tier::Semantic, v));
        }

        if let Some(queue) = &self.queue {
            let task_id = tier4::dispatch(
                queue,
                self.index.as_ref(),
                &self.tokens,
                self.budget,
                scan_run_id,
                claim,
                candidates,
            )?;
            debug!(task_id = %task_id, "escalated to agent tier");
            return Ok(VerifyOutcome::Deferred { task_id });
        }

        let mut reasoning = String::from("no tier reached a verdict and the agent tier is disabled");
        if let Some(concern) = structural.concern {
            reasoning = format!("{reasoning}; {concern}");
        }
        Ok(finish(
            Tier::Semantic,
            TierVerdict::uncertain(last_confidence.unwrap_or(0.0), reasoning)
                .with_path(VerificationPath::Exhausted),
        ))
    }
}
