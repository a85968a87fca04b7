//! Feedback intake and the rules it generates.
//!
//! Every event is appended to the feedback log. Quick picks map straight to
//! rules, repeated negative feedback produces count-based rules, positive
//! feedback revokes count-based claim rules, and free text is handed to the
//! agent for interpretation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use docdrift_core::config::{DocDriftConfig, SuppressionConfig};
use docdrift_core::errors::StorageError;
use docdrift_core::models::{
    AgentTaskType, Claim, Feedback, FeedbackInterpretationPayload, FeedbackType, QuickPickReason,
    RuleSource, SuppressionRule,
};
use docdrift_storage::queries::{claims, feedback, results, suppression};
use docdrift_storage::DatabaseManager;

use super::engine::{RuleTarget, SuppressionEngine};
use crate::agent::AgentQueue;
use crate::mapper::slim_claim;

/// Scan scope for interpretation tasks raised outside any scan.
pub const FEEDBACK_SCOPE: &str = "feedback";

/// A feedback event as submitted by a reviewer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackInput {
    pub claim_id: String,
    pub verification_result_id: Option<String>,
    pub feedback_type: FeedbackType,
    pub quick_pick: Option<QuickPickReason>,
    pub free_text: Option<String>,
}

impl FeedbackInput {
    pub fn new(claim_id: impl Into<String>, feedback_type: FeedbackType) -> Self {
        Self {
            claim_id: claim_id.into(),
            verification_result_id: None,
            feedback_type,
            quick_pick: None,
            free_text: None,
        }
    }

    pub fn for_result(mut self, result_id: impl Into<String>) -> Self {
        self.verification_result_id = Some(result_id.into());
        self
    }

    pub fn with_quick_pick(mut self, reason: QuickPickReason) -> Self {
        self.quick_pick = Some(reason);
        self
    }

    pub fn with_free_text(mut self, text: impl Into<String>) -> Self {
        self.free_text = Some(text.into());
        self
    }
}

/// What recording one feedback event changed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackOutcome {
    pub feedback: Feedback,
    pub rules_created: Vec<SuppressionRule>,
    pub rules_revoked: Vec<String>,
    pub interpretation_task: Option<String>,
}

/// Rule a quick pick produces: target kind and lifetime in days
/// (`None` = permanent). `None` overall means no rule.
pub fn quick_pick_rule(reason: QuickPickReason) -> Option<(QuickPickTarget, Option<i64>)> {
    match reason {
        QuickPickReason::FalsePositive => Some((QuickPickTarget::Claim, Some(180))),
        QuickPickReason::IntentionallyDifferent => Some((QuickPickTarget::Claim, None)),
        QuickPickReason::DocsAreAspirational => Some((QuickPickTarget::File, Some(90))),
        QuickPickReason::NotRelevant => Some((QuickPickTarget::Claim, Some(90))),
        QuickPickReason::WillFixLater => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickPickTarget {
    Claim,
    File,
}

pub struct FeedbackService {
    db: Arc<DatabaseManager>,
    engine: SuppressionEngine,
    queue: Option<AgentQueue>,
    config: SuppressionConfig,
}

impl FeedbackService {
    pub fn new(db: Arc<DatabaseManager>, config: &DocDriftConfig) -> Self {
        let queue = config
            .agent
            .effective_enabled()
            .then(|| AgentQueue::new(db.clone(), &config.agent));
        Self {
            engine: SuppressionEngine::new(db.clone()),
            db,
            queue,
            config: config.suppression.clone(),
        }
    }

    /// Replace (or remove) the queue used for free-text interpretation.
    pub fn with_queue(mut self, queue: Option<AgentQueue>) -> Self {
        self.queue = queue;
        self
    }

    #[instrument(skip(self, input), fields(claim_id = %input.claim_id, feedback_type = %input.feedback_type))]
    pub fn record(&self, input: FeedbackInput) -> Result<FeedbackOutcome, StorageError> {
        self.record_at(input, Utc::now())
    }

    pub fn record_at(&self, input: FeedbackInput, now: DateTime<Utc>) -> Result<FeedbackOutcome, StorageError> {
        let claim = self
            .db
            .with_reader(|conn| claims::require_claim(conn, &input.claim_id))?;
        let entry = Feedback {
            id: uuid::Uuid::new_v4().to_string(),
            repo_id: claim.repo_id.clone(),
            claim_id: claim.id.clone(),
            verification_result_id: input.verification_result_id.clone(),
            feedback_type: input.feedback_type,
            quick_pick: input.quick_pick,
            free_text: input.free_text.clone(),
            created_at: now,
        };
        self.db.with_writer(|conn| feedback::insert_feedback(conn, &entry))?;

        let mut outcome = FeedbackOutcome {
            feedback: entry,
            rules_created: Vec::new(),
            rules_revoked: Vec::new(),
            interpretation_task: None,
        };

        if let Some(reason) = input.quick_pick {
            if let Some(rule) = self.quick_pick(&claim, reason, now)? {
                outcome.rules_created.push(rule);
            }
        }

        if input.feedback_type.is_negative() {
            outcome.rules_created.extend(self.count_based(&claim, now)?);
        } else if input.feedback_type.is_positive() {
            outcome.rules_revoked = self.revoke_count_based(&claim)?;
        }

        if let Some(text) = input.free_text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            outcome.interpretation_task = self.enqueue_interpretation(&claim, &outcome.feedback, text)?;
        }
        Ok(outcome)
    }

    fn quick_pick(
        &self,
        claim: &Claim,
        reason: QuickPickReason,
        now: DateTime<Utc>,
    ) -> Result<Option<SuppressionRule>, StorageError> {
        let Some((target, days)) = quick_pick_rule(reason) else {
            return Ok(None);
        };
        let target = match target {
            QuickPickTarget::Claim => RuleTarget::Claim(claim.id.clone()),
            QuickPickTarget::File => RuleTarget::File(claim.source_file.clone()),
        };
        let expires_at = days.map(|d| now + Duration::days(d));
        self.create_once(claim, target, &format!("quick pick: {reason}"), RuleSource::QuickPick, expires_at, now)
    }

    fn count_based(&self, claim: &Claim, now: DateTime<Utc>) -> Result<Vec<SuppressionRule>, StorageError> {
        let (per_claim, per_type) = self.db.with_reader(|conn| {
            Ok((
                feedback::count_negative_for_claim(conn, &claim.repo_id, &claim.id)?,
                feedback::count_dismissed_claims_of_type(conn, &claim.repo_id, claim.claim_type)?,
            ))
        })?;
        let expires_at = Some(now + Duration::days(self.config.effective_count_based_expiry_days()));
        let mut created = Vec::new();

        let claim_threshold = self.config.effective_claim_dismissal_threshold();
        if per_claim >= claim_threshold {
            let reason = format!("dismissed {per_claim} times");
            if let Some(rule) = self.create_once(
                claim,
                RuleTarget::Claim(claim.id.clone()),
                &reason,
                RuleSource::CountBased,
                expires_at,
                now,
            )? {
                created.push(rule);
            }
        }

        let type_threshold = self.config.effective_claim_type_dismissal_threshold();
        if per_type >= type_threshold {
            let reason = format!("{per_type} {} claims dismissed", claim.claim_type);
            if let Some(rule) = self.create_once(
                claim,
                RuleTarget::ClaimType(claim.claim_type),
                &reason,
                RuleSource::CountBased,
                expires_at,
                now,
            )? {
                created.push(rule);
            }
        }
        Ok(created)
    }

    fn revoke_count_based(&self, claim: &Claim) -> Result<Vec<String>, StorageError> {
        let revoked = self
            .db
            .with_writer(|conn| suppression::revoke_count_based_for_claim(conn, &claim.repo_id, &claim.id))?;
        for rule_id in &revoked {
            self.engine.restamp(&claim.repo_id, rule_id)?;
            info!(rule_id = %rule_id, "count-based rule revoked by positive feedback");
        }
        Ok(revoked)
    }

    /// Create a rule unless an active one from the same source already
    /// covers the target.
    fn create_once(
        &self,
        claim: &Claim,
        target: RuleTarget,
        reason: &str,
        source: RuleSource,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Option<SuppressionRule>, StorageError> {
        let exists = self.db.with_reader(|conn| {
            suppression::has_active_rule(conn, &claim.repo_id, target.scope(), source, &target.key(), now)
        })?;
        if exists {
            return Ok(None);
        }
        self.engine
            .create_rule(&claim.repo_id, target, reason, source, expires_at)
            .map(Some)
    }

    fn enqueue_interpretation(
        &self,
        claim: &Claim,
        entry: &Feedback,
        text: &str,
    ) -> Result<Option<String>, StorageError> {
        let Some(queue) = &self.queue else {
            return Ok(None);
        };
        let scan_run_id = self.db.with_reader(|conn| {
            let result = match &entry.verification_result_id {
                Some(id) => results::get(conn, id)?,
                None => results::latest_for_claim(conn, &claim.id)?,
            };
            Ok(result.map(|r| r.scan_run_id))
        })?;
        let enqueued = queue.enqueue(
            &claim.repo_id,
            scan_run_id.as_deref().unwrap_or(FEEDBACK_SCOPE),
            Some(&claim.id),
            AgentTaskType::FeedbackInterpretation,
            &entry.id,
            &FeedbackInterpretationPayload {
                feedback_id: entry.id.clone(),
                claim: slim_claim(claim),
                free_text: text.to_string(),
            },
        )?;
        Ok(Some(enqueued.task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_pick_mapping() {
        assert_eq!(
            quick_pick_rule(QuickPickReason::FalsePositive),
            Some((QuickPickTarget::Claim, Some(180)))
        );
        assert_eq!(
            quick_pick_rule(QuickPickReason::IntentionallyDifferent),
            Some((QuickPickTarget::Claim, None))
        );
        assert_eq!(
            quick_pick_rule(QuickPickReason::DocsAreAspirational),
            Some((QuickPickTarget::File, Some(90)))
        );
        assert_eq!(
            quick_pick_rule(QuickPickReason::NotRelevant),
            Some((QuickPickTarget::Claim, Some(90)))
        );
        assert_eq!(quick_pick_rule(QuickPickReason::WillFixLater), None);
    }
}
