//! Suppression rules: matching, creation, revocation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{info, warn};

use docdrift_core::errors::StorageError;
use docdrift_core::models::{Claim, ClaimType, RuleSource, SuppressionRule, SuppressionScope};
use docdrift_storage::connection::writer::with_immediate_transaction;
use docdrift_storage::queries::{claims, results, suppression};
use docdrift_storage::DatabaseManager;

/// What a new rule targets. The variant fixes the rule's scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    Claim(String),
    File(String),
    ClaimType(ClaimType),
    /// Regex over the claim text.
    Pattern(String),
}

impl RuleTarget {
    pub fn scope(&self) -> SuppressionScope {
        match self {
            Self::Claim(_) => SuppressionScope::Claim,
            Self::File(_) => SuppressionScope::File,
            Self::ClaimType(_) => SuppressionScope::ClaimType,
            Self::Pattern(_) => SuppressionScope::Pattern,
        }
    }

    /// The value stored in the scope's target column.
    pub fn key(&self) -> String {
        match self {
            Self::Claim(s) | Self::File(s) | Self::Pattern(s) => s.clone(),
            Self::ClaimType(t) => t.as_str().to_string(),
        }
    }
}

struct CompiledRule {
    rule: SuppressionRule,
    pattern: Option<Regex>,
}

/// Active rules for one repo, patterns compiled once.
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    loaded_at: DateTime<Utc>,
}

impl RuleSet {
    /// Compile `rules`. A pattern rule whose regex does not compile is
    /// dropped with a warning.
    pub fn new(rules: Vec<SuppressionRule>, now: DateTime<Utc>) -> Self {
        let rules = rules
            .into_iter()
            .filter_map(|rule| {
                let pattern = match (rule.scope, rule.target_pattern.as_deref()) {
                    (SuppressionScope::Pattern, Some(p)) => match Regex::new(p) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            warn!(rule_id = %rule.id, error = %e, "invalid suppression pattern, rule skipped");
                            return None;
                        }
                    },
                    (SuppressionScope::Pattern, None) => {
                        warn!(rule_id = %rule.id, "pattern rule without a pattern, rule skipped");
                        return None;
                    }
                    _ => None,
                };
                Some(CompiledRule { rule, pattern })
            })
            .collect();
        Self {
            rules,
            loaded_at: now,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Utc::now())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule (oldest first) that applies to `claim` at load time.
    pub fn matches(&self, claim: &Claim) -> Option<&SuppressionRule> {
        self.matches_at(claim, self.loaded_at)
    }

    pub fn matches_at(&self, claim: &Claim, now: DateTime<Utc>) -> Option<&SuppressionRule> {
        self.rules
            .iter()
            .filter(|c| c.rule.is_active(now))
            .find(|c| rule_applies(c, claim))
            .map(|c| &c.rule)
    }
}

fn rule_applies(c: &CompiledRule, claim: &Claim) -> bool {
    let rule = &c.rule;
    match rule.scope {
        SuppressionScope::Claim => rule.target_claim_id.as_deref() == Some(claim.id.as_str()),
        SuppressionScope::File => rule.target_file.as_deref() == Some(claim.source_file.as_str()),
        SuppressionScope::ClaimType => rule.target_claim_type == Some(claim.claim_type),
        SuppressionScope::Pattern => c
            .pattern
            .as_ref()
            .is_some_and(|re| re.is_match(&claim.claim_text)),
    }
}

#[derive(Clone)]
pub struct SuppressionEngine {
    db: Arc<DatabaseManager>,
}

impl SuppressionEngine {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Active rules for `repo_id` as of now.
    pub fn load(&self, repo_id: &str) -> Result<RuleSet, StorageError> {
        self.load_at(repo_id, Utc::now())
    }

    pub fn load_at(&self, repo_id: &str, now: DateTime<Utc>) -> Result<RuleSet, StorageError> {
        let rules = self
            .db
            .with_reader(|conn| suppression::list_active(conn, repo_id, now))?;
        Ok(RuleSet::new(rules, now))
    }

    /// The rule that would suppress a result for `claim`, if any.
    pub fn evaluate(&self, claim: &Claim) -> Result<Option<SuppressionRule>, StorageError> {
        Ok(self.load(&claim.repo_id)?.matches(claim).cloned())
    }

    pub fn create_rule(
        &self,
        repo_id: &str,
        target: RuleTarget,
        reason: &str,
        source: RuleSource,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<SuppressionRule, StorageError> {
        let rule = new_rule(repo_id, target, reason, source, expires_at);
        let single = RuleSet::new(vec![rule.clone()], rule.created_at);
        let stamped = self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                suppression::insert_rule(tx, &rule)?;
                let mut stamped = 0usize;
                for r in results::list_unsuppressed_for_repo(tx, repo_id)? {
                    let Some(claim) = claims::get_claim(tx, &r.claim_id)? else {
                        continue;
                    };
                    if single.matches(&claim).is_some() {
                        results::set_suppression(tx, &r.id, Some(&rule.id))?;
                        stamped += 1;
                    }
                }
                Ok(stamped)
            })
        })?;
        info!(
            rule_id = %rule.id,
            scope = %rule.scope,
            source = %rule.source,
            stamped,
            "suppression rule created"
        );
        Ok(rule)
    }

    /// Active rules, or every rule including revoked and expired ones.
    pub fn list_rules(&self, repo_id: &str, include_inactive: bool) -> Result<Vec<SuppressionRule>, StorageError> {
        self.db.with_reader(|conn| {
            if include_inactive {
                suppression::list_all(conn, repo_id)
            } else {
                suppression::list_active(conn, repo_id, Utc::now())
            }
        })
    }

    /// Soft-delete a rule and re-stamp the results it suppressed against
    /// the remaining rules. Returns false when the rule was not active.
    pub fn revoke_rule(&self, rule_id: &str) -> Result<bool, StorageError> {
        let Some(rule) = self.db.with_reader(|conn| suppression::get(conn, rule_id))? else {
            return Err(StorageError::NotFound {
                entity: "suppression rule",
                id: rule_id.to_string(),
            });
        };
        let revoked = self.db.with_writer(|conn| suppression::revoke(conn, rule_id))?;
        if !revoked {
            return Ok(false);
        }
        let restamped = self.restamp(&rule.repo_id, rule_id)?;
        info!(rule_id, restamped, "suppression rule revoked");
        Ok(true)
    }

    /// Release results stamped by rules that have since expired (or were
    /// revoked), re-stamping them against the rules still active. Returns how
    /// many results were touched.
    pub fn release_inactive(&self, repo_id: &str) -> Result<usize, StorageError> {
        self.release_inactive_at(repo_id, Utc::now())
    }

    pub fn release_inactive_at(&self, repo_id: &str, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let remaining = self.load_at(repo_id, now)?;
        let released = self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                let stale = results::list_suppressed_by_inactive_rules(tx, repo_id, now)?;
                for r in &stale {
                    let replacement = match claims::get_claim(tx, &r.claim_id)? {
                        Some(claim) => remaining.matches(&claim).map(|m| m.id.clone()),
                        None => None,
                    };
                    results::set_suppression(tx, &r.id, replacement.as_deref())?;
                }
                Ok(stale.len())
            })
        })?;
        if released > 0 {
            info!(repo_id, released, "released results of inactive suppression rules");
        }
        Ok(released)
    }

    /// Re-evaluate results suppressed by a revoked rule against the rules
    /// still active. Returns how many results were touched.
    pub(crate) fn restamp(&self, repo_id: &str, rule_id: &str) -> Result<usize, StorageError> {
        let remaining = self.load(repo_id)?;
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                let affected = results::list_suppressed_by_rule(tx, rule_id)?;
                for r in &affected {
                    let replacement = match claims::get_claim(tx, &r.claim_id)? {
                        Some(claim) => remaining.matches(&claim).map(|m| m.id.clone()),
                        None => None,
                    };
                    results::set_suppression(tx, &r.id, replacement.as_deref())?;
                }
                Ok(affected.len())
            })
        })
    }
}

pub(crate) fn new_rule(
    repo_id: &str,
    target: RuleTarget,
    reason: &str,
    source: RuleSource,
    expires_at: Option<DateTime<Utc>>,
) -> SuppressionRule {
    let mut rule = SuppressionRule {
        id: uuid::Uuid::new_v4().to_string(),
        repo_id: repo_id.to_string(),
        scope: target.scope(),
        target_claim_id: None,
        target_file: None,
        target_claim_type: None,
        target_pattern: None,
        reason: reason.to_string(),
        source,
        expires_at,
        revoked: false,
        created_at: Utc::now(),
    };
    match target {
        RuleTarget::Claim(id) => rule.target_claim_id = Some(id),
        RuleTarget::File(f) => rule.target_file = Some(f),
        RuleTarget::ClaimType(t) => rule.target_claim_type = Some(t),
        RuleTarget::Pattern(p) => rule.target_pattern = Some(p),
    }
    rule
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use docdrift_core::models::ExtractedValue;

    fn claim() -> Claim {
        Claim::new(
            "c1",
            "repo",
            "docs/roadmap.md",
            4,
            "We will support Postgres soon",
            ExtractedValue::Behavior {
                description: "postgres support".into(),
            },
        )
    }

    #[test]
    fn each_scope_matches() {
        let now = Utc::now();
        let c = claim();
        for target in [
            RuleTarget::Claim("c1".into()),
            RuleTarget::File("docs/roadmap.md".into()),
            RuleTarget::ClaimType(ClaimType::Behavior),
            RuleTarget::Pattern("(?i)postgres".into()),
        ] {
            let set = RuleSet::new(vec![new_rule("repo", target.clone(), "r", RuleSource::Manual, None)], now);
            assert!(set.matches(&c).is_some(), "{target:?} should match");
        }
    }

    #[test]
    fn non_matching_targets() {
        let now = Utc::now();
        let set = RuleSet::new(
            vec![
                new_rule("repo", RuleTarget::Claim("c2".into()), "r", RuleSource::Manual, None),
                new_rule("repo", RuleTarget::File("README.md".into()), "r", RuleSource::Manual, None),
                new_rule("repo", RuleTarget::ClaimType(ClaimType::Command), "r", RuleSource::Manual, None),
                new_rule("repo", RuleTarget::Pattern("^mysql".into()), "r", RuleSource::Manual, None),
            ],
            now,
        );
        assert!(set.matches(&claim()).is_none());
    }

    #[test]
    fn expired_and_revoked_rules_never_match() {
        let now = Utc::now();
        let expired = new_rule(
            "repo",
            RuleTarget::Claim("c1".into()),
            "r",
            RuleSource::QuickPick,
            Some(now - Duration::seconds(1)),
        );
        let mut revoked = new_rule("repo", RuleTarget::Claim("c1".into()), "r", RuleSource::Manual, None);
        revoked.revoked = true;
        let set = RuleSet::new(vec![expired, revoked], now);
        assert!(set.matches(&claim()).is_none());
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let set = RuleSet::new(
            vec![new_rule("repo", RuleTarget::Pattern("(unclosed".into()), "r", RuleSource::Manual, None)],
            Utc::now(),
        );
        assert!(set.is_empty());
    }
}
