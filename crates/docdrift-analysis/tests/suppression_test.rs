//! Feedback intake, generated rules and rule matching.

use std::sync::Arc;

use chrono::{Duration, Utc};

use docdrift_analysis::suppression::{FeedbackInput, FeedbackService, RuleSet, RuleTarget, SuppressionEngine};
use docdrift_analysis::verifier::{build_result, persist_result, TierVerdict};
use docdrift_core::config::DocDriftConfig;
use docdrift_core::models::{
    AgentTaskType, Claim, ClaimType, ExtractedValue, FeedbackType, QuickPickReason, RuleSource,
    SuppressionRule, SuppressionScope, Tier, VerificationResult,
};
use docdrift_storage::queries::{agent_tasks, claims, feedback, results};
use docdrift_storage::DatabaseManager;

const REPO: &str = "repo";

fn setup(agent_enabled: bool) -> (Arc<DatabaseManager>, FeedbackService) {
    let db = Arc::new(DatabaseManager::open_in_memory().unwrap());
    let mut config = DocDriftConfig::default();
    config.agent.enabled = Some(agent_enabled);
    let service = FeedbackService::new(db.clone(), &config);
    (db, service)
}

fn path_claim(id: &str, path: &str) -> Claim {
    Claim::new(
        id,
        REPO,
        "README.md",
        3,
        format!("See `{path}`"),
        ExtractedValue::PathReference { path: path.into() },
    )
}

fn store(db: &DatabaseManager, claim: &Claim) {
    db.with_writer(|conn| claims::upsert_claim(conn, claim)).unwrap();
}

fn dismiss(id: &str) -> FeedbackInput {
    FeedbackInput::new(id, FeedbackType::ThumbsDown)
}

#[test]
fn every_event_is_logged() {
    let (db, service) = setup(false);
    store(&db, &path_claim("c1", "src/a.ts"));
    service.record(dismiss("c1")).unwrap();
    service.record(FeedbackInput::new("c1", FeedbackType::ThumbsUp)).unwrap();
    let log = db
        .with_reader(|conn| feedback::list_for_claim(conn, REPO, "c1"))
        .unwrap();
    assert_eq!(log.len(), 2);
}

#[test]
fn feedback_on_unknown_claim_is_rejected() {
    let (_db, service) = setup(false);
    assert!(service.record(dismiss("missing")).is_err());
}

#[test]
fn false_positive_quick_pick_suppresses_the_claim_for_180_days() {
    let (db, service) = setup(false);
    store(&db, &path_claim("c1", "src/a.ts"));
    let now = Utc::now();
    let outcome = service
        .record_at(dismiss("c1").with_quick_pick(QuickPickReason::FalsePositive), now)
        .unwrap();

    assert_eq!(outcome.rules_created.len(), 1);
    let rule = &outcome.rules_created[0];
    assert_eq!(rule.scope, SuppressionScope::Claim);
    assert_eq!(rule.source, RuleSource::QuickPick);
    assert_eq!(rule.target_claim_id.as_deref(), Some("c1"));
    assert_eq!(rule.expires_at, Some(now + Duration::days(180)));
}

#[test]
fn aspirational_docs_suppress_the_whole_file() {
    let (db, service) = setup(false);
    store(&db, &path_claim("c1", "src/a.ts"));
    store(&db, &path_claim("c2", "src/b.ts"));
    let outcome = service
        .record(dismiss("c1").with_quick_pick(QuickPickReason::DocsAreAspirational))
        .unwrap();
    let rule = &outcome.rules_created[0];
    assert_eq!(rule.scope, SuppressionScope::File);

    let rules = SuppressionEngine::new(db.clone()).load(REPO).unwrap();
    assert!(rules.matches(&path_claim("c2", "src/b.ts")).is_some());
}

#[test]
fn will_fix_later_creates_no_rule() {
    let (db, service) = setup(false);
    store(&db, &path_claim("c1", "src/a.ts"));
    let outcome = service
        .record(dismiss("c1").with_quick_pick(QuickPickReason::WillFixLater))
        .unwrap();
    assert!(outcome.rules_created.is_empty());
}

#[test]
fn repeated_dismissals_create_one_count_based_rule() {
    let (db, service) = setup(false);
    store(&db, &path_claim("c1", "src/a.ts"));

    let first = service.record(dismiss("c1")).unwrap();
    assert!(first.rules_created.is_empty());

    let second = service.record(dismiss("c1")).unwrap();
    assert_eq!(second.rules_created.len(), 1);
    let rule = &second.rules_created[0];
    assert_eq!(rule.source, RuleSource::CountBased);
    assert_eq!(rule.scope, SuppressionScope::Claim);
    assert!(rule.expires_at.is_some());

    let third = service.record(dismiss("c1")).unwrap();
    assert!(third.rules_created.is_empty());
}

#[test]
fn dismissing_many_claims_of_a_type_suppresses_the_type() {
    let (db, service) = setup(false);
    let mut created = Vec::new();
    for i in 0..5 {
        let id = format!("c{i}");
        store(&db, &path_claim(&id, &format!("src/{i}.ts")));
        created.extend(service.record(dismiss(&id)).unwrap().rules_created);
    }
    let type_rules: Vec<&SuppressionRule> = created
        .iter()
        .filter(|r| r.scope == SuppressionScope::ClaimType)
        .collect();
    assert_eq!(type_rules.len(), 1);
    assert_eq!(type_rules[0].target_claim_type, Some(ClaimType::PathReference));
}

#[test]
fn positive_feedback_revokes_count_based_claim_rules() {
    let (db, service) = setup(false);
    store(&db, &path_claim("c1", "src/a.ts"));
    service
        .record(dismiss("c1").with_quick_pick(QuickPickReason::IntentionallyDifferent))
        .unwrap();
    service.record(dismiss("c1")).unwrap();

    let outcome = service.record(FeedbackInput::new("c1", FeedbackType::FixAccepted)).unwrap();
    assert_eq!(outcome.rules_revoked.len(), 1);

    // The quick-pick rule is untouched.
    let engine = SuppressionEngine::new(db.clone());
    let active = engine.list_rules(REPO, false).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].source, RuleSource::QuickPick);
}

#[test]
fn free_text_is_queued_for_interpretation() {
    let (db, service) = setup(true);
    store(&db, &path_claim("c1", "src/a.ts"));
    let outcome = service
        .record(dismiss("c1").with_free_text("this section documents the v2 layout"))
        .unwrap();
    let task_id = outcome.interpretation_task.expect("interpretation queued");
    let task = db
        .with_reader(|conn| agent_tasks::get(conn, &task_id))
        .unwrap()
        .unwrap();
    assert_eq!(task.task_type, AgentTaskType::FeedbackInterpretation);
    assert_eq!(task.claim_id.as_deref(), Some("c1"));
}

#[test]
fn free_text_without_agent_is_only_logged() {
    let (db, service) = setup(false);
    store(&db, &path_claim("c1", "src/a.ts"));
    let outcome = service
        .record(dismiss("c1").with_free_text("not a real problem"))
        .unwrap();
    assert!(outcome.interpretation_task.is_none());
    assert_eq!(outcome.feedback.free_text.as_deref(), Some("not a real problem"));
}

#[test]
fn blank_free_text_is_ignored() {
    let (db, service) = setup(true);
    store(&db, &path_claim("c1", "src/a.ts"));
    let outcome = service.record(dismiss("c1").with_free_text("   ")).unwrap();
    assert!(outcome.interpretation_task.is_none());
}

fn drifted_result(db: &DatabaseManager, claim: &Claim) -> VerificationResult {
    let result = build_result(
        claim,
        "s1",
        Tier::Deterministic,
        TierVerdict::drifted(0.95, "file is gone"),
        false,
        None,
    );
    persist_result(db, &RuleSet::empty(), claim, result, true).unwrap()
}

fn reload(db: &DatabaseManager, id: &str) -> VerificationResult {
    db.with_reader(|conn| results::get(conn, id)).unwrap().unwrap()
}

#[test]
fn dismissal_hides_the_existing_finding_at_once() {
    let (db, service) = setup(false);
    let claim = path_claim("c1", "src/a.ts");
    store(&db, &claim);
    let result = drifted_result(&db, &claim);
    assert!(!result.suppressed);

    let outcome = service
        .record(dismiss("c1").for_result(&result.id).with_quick_pick(QuickPickReason::FalsePositive))
        .unwrap();
    let stored = reload(&db, &result.id);
    assert!(stored.suppressed);
    assert_eq!(stored.suppression_rule_id.as_deref(), Some(outcome.rules_created[0].id.as_str()));
}

#[test]
fn new_rule_leaves_unmatched_findings_visible() {
    let (db, _service) = setup(false);
    let a = path_claim("c1", "src/a.ts");
    let b = path_claim("c2", "src/b.ts");
    store(&db, &a);
    store(&db, &b);
    let ra = drifted_result(&db, &a);
    let rb = drifted_result(&db, &b);

    SuppressionEngine::new(db.clone())
        .create_rule(REPO, RuleTarget::Claim("c1".into()), "noise", RuleSource::Manual, None)
        .unwrap();
    assert!(reload(&db, &ra.id).suppressed);
    assert!(!reload(&db, &rb.id).suppressed);
}

#[test]
fn expired_rule_releases_its_findings() {
    let (db, _service) = setup(false);
    let claim = path_claim("c1", "src/a.ts");
    store(&db, &claim);
    let result = drifted_result(&db, &claim);
    let engine = SuppressionEngine::new(db.clone());
    let now = Utc::now();
    let rule = engine
        .create_rule(
            REPO,
            RuleTarget::Claim("c1".into()),
            "later",
            RuleSource::QuickPick,
            Some(now + Duration::days(1)),
        )
        .unwrap();
    assert_eq!(reload(&db, &result.id).suppression_rule_id.as_deref(), Some(rule.id.as_str()));

    assert_eq!(engine.release_inactive_at(REPO, now).unwrap(), 0);
    assert!(reload(&db, &result.id).suppressed);

    assert_eq!(engine.release_inactive_at(REPO, now + Duration::days(2)).unwrap(), 1);
    let stored = reload(&db, &result.id);
    assert!(!stored.suppressed);
    assert_eq!(stored.suppression_rule_id, None);
}

#[test]
fn expired_rule_hands_findings_to_a_remaining_rule() {
    let (db, _service) = setup(false);
    let claim = path_claim("c1", "src/a.ts");
    store(&db, &claim);
    let result = drifted_result(&db, &claim);
    let engine = SuppressionEngine::new(db.clone());
    let now = Utc::now();
    engine
        .create_rule(
            REPO,
            RuleTarget::Claim("c1".into()),
            "later",
            RuleSource::QuickPick,
            Some(now + Duration::days(1)),
        )
        .unwrap();
    let lasting = engine
        .create_rule(REPO, RuleTarget::File("README.md".into()), "roadmap", RuleSource::Manual, None)
        .unwrap();

    engine.release_inactive_at(REPO, now + Duration::days(2)).unwrap();
    let stored = reload(&db, &result.id);
    assert!(stored.suppressed);
    assert_eq!(stored.suppression_rule_id.as_deref(), Some(lasting.id.as_str()));
}

// ---- Matching ----

fn rule(id: &str, target: RuleTarget, expires_in: Option<Duration>) -> SuppressionRule {
    let now = Utc::now();
    let mut r = SuppressionRule {
        id: id.into(),
        repo_id: REPO.into(),
        scope: target.scope(),
        target_claim_id: None,
        target_file: None,
        target_claim_type: None,
        target_pattern: None,
        reason: "test".into(),
        source: RuleSource::Manual,
        expires_at: expires_in.map(|d| now + d),
        revoked: false,
        created_at: now,
    };
    match target {
        RuleTarget::Claim(c) => r.target_claim_id = Some(c),
        RuleTarget::File(f) => r.target_file = Some(f),
        RuleTarget::ClaimType(t) => r.target_claim_type = Some(t),
        RuleTarget::Pattern(p) => r.target_pattern = Some(p),
    }
    r
}

#[test]
fn expired_rules_never_match() {
    let claim = path_claim("c1", "src/a.ts");
    let now = Utc::now();
    let rules = RuleSet::new(vec![rule("r1", RuleTarget::Claim("c1".into()), Some(Duration::days(1)))], now);
    assert!(rules.matches_at(&claim, now).is_some());
    assert!(rules.matches_at(&claim, now + Duration::days(2)).is_none());
}

#[test]
fn invalid_pattern_rule_is_skipped() {
    let rules = RuleSet::new(
        vec![
            rule("bad", RuleTarget::Pattern("(unclosed".into()), None),
            rule("good", RuleTarget::Pattern("^See `src/".into()), None),
        ],
        Utc::now(),
    );
    assert_eq!(rules.len(), 1);
    let hit = rules.matches(&path_claim("c1", "src/a.ts")).unwrap();
    assert_eq!(hit.id, "good");
    assert!(rules.matches(&path_claim("c2", "lib/a.ts")).is_none());
}

#[test]
fn oldest_matching_rule_wins() {
    let rules = RuleSet::new(
        vec![
            rule("first", RuleTarget::File("README.md".into()), None),
            rule("second", RuleTarget::ClaimType(ClaimType::PathReference), None),
        ],
        Utc::now(),
    );
    assert_eq!(rules.matches(&path_claim("c1", "src/a.ts")).unwrap().id, "first");
}

#[test]
fn revoking_an_unknown_rule_is_not_found() {
    let db = Arc::new(DatabaseManager::open_in_memory().unwrap());
    let engine = SuppressionEngine::new(db);
    assert!(engine.revoke_rule("nope").is_err());
}
