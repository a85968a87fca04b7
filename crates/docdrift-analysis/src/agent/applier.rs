//! Applies agent task results to the database.
//!
//! Delivery is at-least-once, so every effect is idempotent: results are
//! keyed by `(claim, scan run, path)`, fixes by result, mappings by
//! `(file, entity)`, follow-up tasks by dedup key and rules by target.

use std::sync::Arc;

use chrono::{Duration, Utc};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use docdrift_core::config::MappingConfig;
use docdrift_core::errors::{AgentError, StorageError};
use docdrift_core::models::{
    AgentMode, AgentTask, AgentTaskType, AgentVerdict, Claim, ClaimMapping, ClassificationPayload,
    ClassificationResult, ExtractionResult, FeedbackInterpretation, FeedbackInterpretationPayload,
    FixGenerationPayload, FixResult, InterpretedAction, MappingMethod, MappingWeights,
    PostCheckPayload, RuleSource, SuppressionRule, SuppressionScope, Tier, Verdict,
    VerificationPath, VerificationPayload, VerificationResult,
};
use docdrift_storage::connection::writer::with_immediate_transaction;
use docdrift_storage::queries::{claims, mappings, suggested_fixes, suppression};
use docdrift_storage::DatabaseManager;

use super::queue::AgentQueue;
use crate::mapper::{candidate_set, slim_claim, strategies::normalize_path};
use crate::suppression::{RuleTarget, SuppressionEngine};
use crate::verifier::{build_result, persist_result, TierVerdict};

/// Confidence given to files the agent cited as evidence when it did not
/// report its own confidence.
const EVIDENCE_MAPPING_CONFIDENCE: f64 = 0.8;

/// Confidence given to files chosen by claim classification.
const CLASSIFICATION_CONFIDENCE: f64 = 0.9;

/// What applying one task result changed.
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedEffect {
    Verification {
        result: VerificationResult,
        fix_task: Option<String>,
    },
    Classification {
        mappings: usize,
    },
    Fix {
        inserted: bool,
        post_check_task: Option<String>,
    },
    PostCheck {
        result: VerificationResult,
    },
    FeedbackInterpreted {
        rule: Option<SuppressionRule>,
    },
    ClaimsExtracted {
        inserted: usize,
        rejected: usize,
    },
}

fn invalid(task: &AgentTask, what: &str, e: impl std::fmt::Display) -> AgentError {
    AgentError::InvalidResult {
        message: format!("{} {what} for task {}: {e}", task.task_type, task.id),
    }
}

#[derive(Clone)]
pub struct ResultApplier {
    db: Arc<DatabaseManager>,
    queue: AgentQueue,
    suppression: SuppressionEngine,
    weights: MappingWeights,
}

impl ResultApplier {
    pub fn new(queue: AgentQueue, mapping: &MappingConfig) -> Self {
        let db = queue.db().clone();
        Self {
            suppression: SuppressionEngine::new(db.clone()),
            db,
            queue,
            weights: mapping.weights(),
        }
    }

    #[instrument(skip(self, task, result), fields(task_id = %task.id, task_type = %task.task_type))]
    pub fn apply(&self, task: &AgentTask, result: &serde_json::Value) -> Result<AppliedEffect, AgentError> {
        let effect = match task.task_type {
            AgentTaskType::Verification => self.verification(task, result)?,
            AgentTaskType::ClaimClassification => self.classification(task, result)?,
            AgentTaskType::FixGeneration => self.fix(task, result)?,
            AgentTaskType::PostCheck => self.post_check(task, result)?,
            AgentTaskType::FeedbackInterpretation => self.feedback(task, result)?,
            AgentTaskType::ClaimExtraction => self.extraction(task, result)?,
        };
        debug!("agent result applied");
        Ok(effect)
    }

    /// The stored claim, or the payload copy when the claim row is gone.
    fn current_claim(&self, fallback: Claim) -> Result<Claim, StorageError> {
        Ok(self
            .db
            .with_reader(|conn| claims::get_claim(conn, &fallback.id))?
            .unwrap_or(fallback))
    }

    fn insert_llm_mappings(
        &self,
        scan_run_id: &str,
        claim_id: &str,
        files: &[String],
        confidence: f64,
    ) -> Result<usize, StorageError> {
        let rows: Vec<ClaimMapping> = files
            .iter()
            .map(|f| normalize_path(f))
            .filter(|f| !f.is_empty())
            .map(|f| ClaimMapping::new(claim_id, f, confidence, MappingMethod::LlmAssisted))
            .collect();
        if !rows.is_empty() {
            self.db
                .with_writer(|conn| mappings::insert_mappings(conn, scan_run_id, &rows))?;
        }
        Ok(rows.len())
    }

    fn verification(&self, task: &AgentTask, raw: &serde_json::Value) -> Result<AppliedEffect, AgentError> {
        let payload: VerificationPayload = task.payload_as().map_err(|e| invalid(task, "payload", e))?;
        let verdict: AgentVerdict =
            serde_json::from_value(raw.clone()).map_err(|e| invalid(task, "result", e))?;
        let claim = self.current_claim(payload.claim)?;

        let cited = verdict.evidence_files.clone();
        self.insert_llm_mappings(
            &task.scan_run_id,
            &claim.id,
            &cited,
            verdict.confidence.unwrap_or(EVIDENCE_MAPPING_CONFIDENCE),
        )?;
        // Cited files only settle a tie when they leave a single best candidate.
        let ambiguous = self.candidates_ambiguous(&task.scan_run_id, &claim.id)?;

        let path = match payload.mode {
            AgentMode::Evidence => VerificationPath::AgentEvidence,
            AgentMode::Exploration => VerificationPath::AgentExploration,
        };
        let result = self.agent_result(&claim, &task.scan_run_id, verdict, path, ambiguous);
        let rules = self.suppression.load(&claim.repo_id)?;
        let stored = persist_result(&self.db, &rules, &claim, result, true)?;

        let mut fix_task = None;
        if stored.verdict == Verdict::Drifted {
            match stored.suggested_fix.as_deref() {
                Some(fix) => {
                    self.db.with_writer(|conn| {
                        suggested_fixes::insert_fix(conn, &claim.id, &stored.id, fix)
                    })?;
                }
                None => {
                    let enqueued = self.queue.enqueue(
                        &claim.repo_id,
                        &task.scan_run_id,
                        Some(&claim.id),
                        AgentTaskType::FixGeneration,
                        &stored.id,
                        &FixGenerationPayload {
                            claim: slim_claim(&claim),
                            verification_result_id: stored.id.clone(),
                            specific_mismatch: stored.specific_mismatch.clone(),
                        },
                    )?;
                    fix_task = Some(enqueued.task_id);
                }
            }
        }
        info!(claim_id = %claim.id, verdict = %stored.verdict, "agent verdict recorded");
        Ok(AppliedEffect::Verification {
            result: stored,
            fix_task,
        })
    }

    fn candidates_ambiguous(&self, scan_run_id: &str, claim_id: &str) -> Result<bool, StorageError> {
        let stored = self
            .db
            .with_reader(|conn| mappings::list_for_claim(conn, scan_run_id, claim_id))?;
        Ok(candidate_set(claim_id, stored, self.weights, &[], false).is_ambiguous())
    }

    fn agent_result(
        &self,
        claim: &Claim,
        scan_run_id: &str,
        verdict: AgentVerdict,
        path: VerificationPath,
        ambiguous: bool,
    ) -> VerificationResult {
        let default_confidence = match verdict.verdict {
            Verdict::Uncertain => 0.5,
            _ => EVIDENCE_MAPPING_CONFIDENCE,
        };
        let mut v = TierVerdict {
            verdict: verdict.verdict,
            confidence: verdict.confidence.unwrap_or(default_confidence).clamp(0.0, 1.0),
            reasoning: verdict
                .reasoning
                .unwrap_or_else(|| "agent verdict without reasoning".to_string()),
            specific_mismatch: verdict.specific_mismatch,
            suggested_fix: verdict.suggested_fix.filter(|f| !f.trim().is_empty()),
            evidence_files: verdict.evidence_files,
            path: Some(path),
        };
        if v.verdict != Verdict::Drifted {
            v.suggested_fix = None;
        }
        let mut result = build_result(claim, scan_run_id, Tier::Agent, v, ambiguous, verdict.duration_ms);
        result.token_cost = verdict.token_cost;
        result
    }

    fn classification(&self, task: &AgentTask, raw: &serde_json::Value) -> Result<AppliedEffect, AgentError> {
        let payload: ClassificationPayload = task.payload_as().map_err(|e| invalid(task, "payload", e))?;
        let result: ClassificationResult =
            serde_json::from_value(raw.clone()).map_err(|e| invalid(task, "result", e))?;
        let n = self.insert_llm_mappings(
            &task.scan_run_id,
            &payload.claim.id,
            &result.files,
            CLASSIFICATION_CONFIDENCE,
        )?;
        Ok(AppliedEffect::Classification { mappings: n })
    }

    fn fix(&self, task: &AgentTask, raw: &serde_json::Value) -> Result<AppliedEffect, AgentError> {
        let payload: FixGenerationPayload = task.payload_as().map_err(|e| invalid(task, "payload", e))?;
        let result: FixResult = serde_json::from_value(raw.clone()).map_err(|e| invalid(task, "result", e))?;
        let fix = result.suggested_fix.trim();
        if fix.is_empty() {
            return Err(invalid(task, "result", "empty suggested_fix"));
        }
        let inserted = self.db.with_writer(|conn| {
            suggested_fixes::insert_fix(conn, &payload.claim.id, &payload.verification_result_id, fix)
        })?;
        let enqueued = self.queue.enqueue(
            &task.repo_id,
            &task.scan_run_id,
            Some(&payload.claim.id),
            AgentTaskType::PostCheck,
            &payload.verification_result_id,
            &PostCheckPayload {
                claim: payload.claim.clone(),
                verification_result_id: payload.verification_result_id.clone(),
                suggested_fix: Some(fix.to_string()),
            },
        )?;
        Ok(AppliedEffect::Fix {
            inserted,
            post_check_task: Some(enqueued.task_id),
        })
    }

    /// A post-check result is recorded alongside the drift finding; it does
    /// not change the claim's status.
    fn post_check(&self, task: &AgentTask, raw: &serde_json::Value) -> Result<AppliedEffect, AgentError> {
        let payload: PostCheckPayload = task.payload_as().map_err(|e| invalid(task, "payload", e))?;
        let verdict: AgentVerdict =
            serde_json::from_value(raw.clone()).map_err(|e| invalid(task, "result", e))?;
        let claim = self.current_claim(payload.claim)?;
        let result = self.agent_result(&claim, &task.scan_run_id, verdict, VerificationPath::PostCheck, false);
        let rules = self.suppression.load(&claim.repo_id)?;
        let stored = persist_result(&self.db, &rules, &claim, result, false)?;
        Ok(AppliedEffect::PostCheck { result: stored })
    }

    fn feedback(&self, task: &AgentTask, raw: &serde_json::Value) -> Result<AppliedEffect, AgentError> {
        let payload: FeedbackInterpretationPayload =
            task.payload_as().map_err(|e| invalid(task, "payload", e))?;
        let interpretation: FeedbackInterpretation =
            serde_json::from_value(raw.clone()).map_err(|e| invalid(task, "result", e))?;
        let InterpretedAction::Suppress {
            scope,
            pattern,
            expires_in_days,
        } = interpretation.action
        else {
            return Ok(AppliedEffect::FeedbackInterpreted { rule: None });
        };

        let claim = &payload.claim;
        let target = match scope {
            SuppressionScope::Claim => RuleTarget::Claim(claim.id.clone()),
            SuppressionScope::File => RuleTarget::File(claim.source_file.clone()),
            SuppressionScope::ClaimType => RuleTarget::ClaimType(claim.claim_type),
            SuppressionScope::Pattern => {
                let p = pattern
                    .filter(|p| !p.trim().is_empty())
                    .ok_or_else(|| invalid(task, "result", "pattern scope without a pattern"))?;
                Regex::new(&p).map_err(|e| invalid(task, "pattern", e))?;
                RuleTarget::Pattern(p)
            }
        };
        let now = Utc::now();
        let exists = self.db.with_reader(|conn| {
            suppression::has_active_rule(
                conn,
                &claim.repo_id,
                target.scope(),
                RuleSource::AgentInterpreted,
                &target.key(),
                now,
            )
        })?;
        if exists {
            return Ok(AppliedEffect::FeedbackInterpreted { rule: None });
        }
        let reason = interpretation
            .reasoning
            .unwrap_or_else(|| format!("interpreted from feedback {}", payload.feedback_id));
        let expires_at = expires_in_days.filter(|d| *d > 0).map(|d| now + Duration::days(d));
        let rule = self.suppression.create_rule(
            &claim.repo_id,
            target,
            &reason,
            RuleSource::AgentInterpreted,
            expires_at,
        )?;
        Ok(AppliedEffect::FeedbackInterpreted { rule: Some(rule) })
    }

    fn extraction(&self, task: &AgentTask, raw: &serde_json::Value) -> Result<AppliedEffect, AgentError> {
        let result: ExtractionResult =
            serde_json::from_value(raw.clone()).map_err(|e| invalid(task, "result", e))?;
        let mut valid = Vec::new();
        let mut rejected = 0;
        for claim in result.claims {
            if claim.repo_id != task.repo_id {
                warn!(claim_id = %claim.id, "extracted claim for another repo, skipped");
                rejected += 1;
                continue;
            }
            match claim.validate() {
                Ok(()) => valid.push(claim),
                Err(e) => {
                    warn!(error = %e, "extracted claim rejected");
                    rejected += 1;
                }
            }
        }
        let inserted = valid.len();
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                for claim in &valid {
                    claims::upsert_claim(tx, claim)?;
                }
                Ok(())
            })
        })?;
        Ok(AppliedEffect::ClaimsExtracted { inserted, rejected })
    }
}
