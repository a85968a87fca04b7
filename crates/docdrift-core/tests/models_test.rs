//! Data model invariants.

use chrono::{Duration, Utc};
use docdrift_core::models::{
    CandidateSet, Claim, ClaimMapping, ClaimType, ExtractedValue, MappingMethod, MappingStatus,
    MappingWeights, RuleSource, SuppressionRule, SuppressionScope, Testability,
};
use proptest::prelude::*;

fn rule(expires_in: Option<i64>, revoked: bool) -> SuppressionRule {
    let now = Utc::now();
    SuppressionRule {
        id: "r1".into(),
        repo_id: "repo".into(),
        scope: SuppressionScope::Claim,
        target_claim_id: Some("c1".into()),
        target_file: None,
        target_claim_type: None,
        target_pattern: None,
        reason: "false_positive".into(),
        source: RuleSource::QuickPick,
        expires_at: expires_in.map(|d| now + Duration::days(d)),
        revoked,
        created_at: now,
    }
}

#[test]
fn rule_activity_respects_expiry_and_revocation() {
    let now = Utc::now();
    assert!(rule(None, false).is_active(now));
    assert!(rule(Some(1), false).is_active(now));
    assert!(!rule(Some(-1), false).is_active(now));
    assert!(!rule(None, true).is_active(now));
}

#[test]
fn claim_new_derives_type_and_testability() {
    let claim = Claim::new(
        "c1",
        "repo",
        "docs/arch.md",
        12,
        "Requests are retried with exponential backoff",
        ExtractedValue::Behavior {
            description: "retries with exponential backoff".into(),
        },
    );
    assert_eq!(claim.claim_type, ClaimType::Behavior);
    assert_eq!(claim.testability, Testability::Semantic);
    assert!(claim.validate().is_ok());
}

#[test]
fn top_tied_returns_all_equal_leaders() {
    let set = CandidateSet {
        claim_id: "c1".into(),
        mappings: vec![
            ClaimMapping::new("c1", "a.rs", 0.475, MappingMethod::SymbolSearch),
            ClaimMapping::new("c1", "b.rs", 0.475, MappingMethod::SymbolSearch),
            ClaimMapping::new("c1", "c.rs", 0.3, MappingMethod::SemanticSearch),
        ],
        status: MappingStatus::AmbiguousTie,
        pinned: false,
        pending_agent_task: None,
    };
    assert_eq!(set.top_tied(MappingWeights::default()).len(), 2);
    assert_eq!(set.files(), vec!["a.rs", "b.rs", "c.rs"]);
}

proptest! {
    #[test]
    fn effective_confidence_stays_in_unit_interval(
        conf in -2.0f64..3.0,
        boost in 0.0f64..1.0,
        wc in 0.0f64..4.0,
        wb in 0.0f64..4.0,
    ) {
        let mut m = ClaimMapping::new("c", "f.rs", conf, MappingMethod::SemanticSearch);
        m.co_change_boost = boost;
        let e = m.effective_confidence(MappingWeights { confidence: wc, co_change: wb });
        prop_assert!((0.0..=1.0).contains(&e));
    }
}
