//! End-to-end scan runs against an in-memory index.

use std::collections::BTreeMap;
use std::sync::Arc;

use docdrift_analysis::scan::ScanRunner;
use docdrift_analysis::suppression::{RuleSet, RuleTarget, SuppressionEngine};
use docdrift_analysis::verifier::{build_result, persist_result, TierVerdict};
use docdrift_core::config::DocDriftConfig;
use docdrift_core::models::{
    AgentTaskType, Claim, ExtractedValue, RepoManifest, RuleSource, ScanStatus, Severity, Testability,
    Tier, Verdict, VerificationPath, VerificationResult, VerificationStatus,
};
use docdrift_core::traits::{Cancellable, CancellationToken};
use docdrift_storage::queries::{agent_tasks, claims, results, scan_runs};
use docdrift_storage::{DatabaseManager, SqliteIndex};

const REPO: &str = "repo";

struct Fixture {
    db: Arc<DatabaseManager>,
    index: Arc<SqliteIndex>,
}

impl Fixture {
    fn new() -> Self {
        let db = Arc::new(DatabaseManager::open_in_memory().unwrap());
        let index = Arc::new(SqliteIndex::new(db.clone()));
        Self { db, index }
    }

    fn file(&self, path: &str) -> &Self {
        self.index.add_file(REPO, path, Some("export {}")).unwrap();
        self
    }

    fn manifest(&self, deps: &[(&str, &str)]) -> &Self {
        let manifest = RepoManifest {
            file_path: "package.json".into(),
            dependencies: deps
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            ..Default::default()
        };
        self.index.add_manifest(REPO, &manifest).unwrap();
        self
    }

    fn runner(&self, config: &DocDriftConfig) -> ScanRunner {
        ScanRunner::new(self.db.clone(), self.index.clone(), self.index.clone(), config).unwrap()
    }
}

fn offline_config() -> DocDriftConfig {
    let mut config = DocDriftConfig::default();
    config.agent.enabled = Some(false);
    config.agent.concurrency = Some(2);
    config.url_check.enabled = Some(false);
    config
}

fn path_claim(id: &str, path: &str) -> Claim {
    Claim::new(
        id,
        REPO,
        "README.md",
        3,
        format!("See {path}"),
        ExtractedValue::PathReference { path: path.into() },
    )
}

fn dependency_claim(id: &str, package: &str, version: &str) -> Claim {
    Claim::new(
        id,
        REPO,
        "README.md",
        7,
        format!("Requires {package} {version}"),
        ExtractedValue::DependencyVersion {
            package: package.into(),
            version: Some(version.into()),
        },
    )
}

#[test]
fn renamed_file_is_never_verified() {
    let f = Fixture::new();
    f.file("src/config/config.ts");
    let report = f
        .runner(&offline_config())
        .run(REPO, vec![path_claim("c1", "src/config/index.ts")], &CancellationToken::new())
        .unwrap();

    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.results.len(), 1);
    let r = &report.results[0];
    assert_ne!(r.verdict, Verdict::Verified);
    assert_eq!(r.verdict, Verdict::Drifted);
    assert_eq!(r.tier, Tier::Deterministic);
    assert!(r.severity.is_some());
}

#[test]
fn caret_range_admits_newer_minor_at_tier_one() {
    let f = Fixture::new();
    f.manifest(&[("express", "4.19.2")]);
    let report = f
        .runner(&offline_config())
        .run(REPO, vec![dependency_claim("c1", "express", "^4.18")], &CancellationToken::new())
        .unwrap();

    let r = &report.results[0];
    assert_eq!(r.verdict, Verdict::Verified);
    assert_eq!(r.tier, Tier::Deterministic);
    assert_eq!(r.evidence_files, vec!["package.json".to_string()]);
    assert_eq!(report.health_score, 1.0);
}

#[test]
fn tied_suffix_matches_stay_uncertain() {
    let f = Fixture::new();
    f.file("src/a/index.ts").file("src/b/index.ts");
    let report = f
        .runner(&offline_config())
        .run(REPO, vec![path_claim("c1", "index.ts")], &CancellationToken::new())
        .unwrap();

    let r = &report.results[0];
    assert_eq!(r.verdict, Verdict::Uncertain);
    assert_eq!(r.verification_path, VerificationPath::Ambiguity);
    assert!(r.confidence <= 0.5);
}

#[test]
fn claim_status_tracks_latest_result() {
    let f = Fixture::new();
    f.file("src/app.ts");
    let report = f
        .runner(&offline_config())
        .run(REPO, vec![path_claim("c1", "src/app.ts")], &CancellationToken::new())
        .unwrap();

    let stored = f.db.with_reader(|conn| claims::require_claim(conn, "c1")).unwrap();
    assert_eq!(stored.verification_status, VerificationStatus::Verified);
    assert_eq!(stored.last_verification_result_id.as_deref(), Some(report.results[0].id.as_str()));
}

#[test]
fn untestable_claims_are_skipped() {
    let f = Fixture::new();
    f.manifest(&[("express", "4.19.2")]);
    let vague = Claim::new(
        "c2",
        REPO,
        "README.md",
        9,
        "The code is elegant",
        ExtractedValue::Convention {
            description: "elegant".into(),
        },
    )
    .with_testability(Testability::Untestable);

    let report = f
        .runner(&offline_config())
        .run(
            REPO,
            vec![dependency_claim("c1", "express", "^4.18"), vague],
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.skipped, vec!["c2".to_string()]);
    assert_eq!(report.total_claims, 1);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.health_score, 1.0);
    let run = f
        .db
        .with_reader(|conn| scan_runs::get(conn, &report.scan_run_id))
        .unwrap()
        .unwrap();
    assert_eq!(run.skipped, 1);
    assert_eq!(run.total_claims, 1);
}

#[test]
fn malformed_claim_does_not_abort_the_batch() {
    let f = Fixture::new();
    f.file("src/app.ts");
    let mut broken = path_claim("bad", "src/app.ts");
    broken.claim_text = "   ".into();
    let mut foreign = path_claim("other-repo", "src/app.ts");
    foreign.repo_id = "elsewhere".into();

    let report = f
        .runner(&offline_config())
        .run(
            REPO,
            vec![broken, foreign, path_claim("good", "src/app.ts")],
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|fl| fl.step == "validate"));
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].claim_id, "good");
    assert!(f.db.with_reader(|conn| claims::get_claim(conn, "bad")).unwrap().is_none());
}

#[test]
fn health_score_counts_every_testable_claim() {
    let f = Fixture::new();
    f.file("src/app.ts");
    let report = f
        .runner(&offline_config())
        .run(
            REPO,
            vec![path_claim("c1", "src/app.ts"), path_claim("c2", "src/gone.ts")],
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.count(Verdict::Verified), 1);
    assert_eq!(report.count(Verdict::Drifted), 1);
    assert!((report.health_score - 0.5).abs() < 1e-9);

    let run = f
        .db
        .with_reader(|conn| scan_runs::get(conn, &report.scan_run_id))
        .unwrap()
        .unwrap();
    assert_eq!(run.status, ScanStatus::Completed);
    assert_eq!((run.verified, run.drifted, run.pending), (1, 1, 0));
    assert!(run.completed_at.is_some());
}

#[test]
fn suppressed_results_are_stored_but_hidden() {
    let f = Fixture::new();
    let engine = SuppressionEngine::new(f.db.clone());
    let rule = engine
        .create_rule(REPO, RuleTarget::File("README.md".into()), "roadmap", RuleSource::Manual, None)
        .unwrap();

    let report = f
        .runner(&offline_config())
        .run(REPO, vec![path_claim("c1", "src/missing.ts")], &CancellationToken::new())
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.visible().count(), 0);
    assert_eq!(report.suppressed().count(), 1);
    let stored = f
        .db
        .with_reader(|conn| results::list_for_scan(conn, &report.scan_run_id))
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].suppressed);
    assert_eq!(stored[0].suppression_rule_id.as_deref(), Some(rule.id.as_str()));
    assert_eq!(stored[0].verdict, Verdict::Drifted);
}

#[test]
fn revoked_rule_stops_hiding_the_result() {
    let f = Fixture::new();
    let engine = SuppressionEngine::new(f.db.clone());
    let rule = engine
        .create_rule(REPO, RuleTarget::Claim("c1".into()), "noise", RuleSource::Manual, None)
        .unwrap();
    let report = f
        .runner(&offline_config())
        .run(REPO, vec![path_claim("c1", "src/missing.ts")], &CancellationToken::new())
        .unwrap();
    assert!(report.results[0].suppressed);

    assert!(engine.revoke_rule(&rule.id).unwrap());
    let stored = f
        .db
        .with_reader(|conn| results::get(conn, &report.results[0].id))
        .unwrap()
        .unwrap();
    assert!(!stored.suppressed);
    assert_eq!(stored.suppression_rule_id, None);
    assert!(!engine.revoke_rule(&rule.id).unwrap());
}

#[test]
fn min_severity_filters_visible_findings() {
    let f = Fixture::new();
    let mut config = offline_config();
    config.verification.min_severity = Some(Severity::High);
    let report = f
        .runner(&config)
        .run(REPO, vec![path_claim("c1", "src/missing.ts")], &CancellationToken::new())
        .unwrap();

    assert_eq!(report.count(Verdict::Drifted), 1);
    assert_eq!(report.results[0].severity, Some(Severity::Medium));
    assert_eq!(report.findings().count(), 0);
}

#[test]
fn persisting_the_same_result_twice_is_a_no_op() {
    let f = Fixture::new();
    let claim = path_claim("c1", "src/app.ts");
    f.db.with_writer(|conn| claims::upsert_claim(conn, &claim)).unwrap();

    let first = build_result(&claim, "s1", Tier::Deterministic, TierVerdict::verified(1.0, "ok"), false, None);
    let again = build_result(&claim, "s1", Tier::Deterministic, TierVerdict::drifted(0.9, "no"), false, None);
    let a = persist_result(&f.db, &RuleSet::empty(), &claim, first, true).unwrap();
    let b = persist_result(&f.db, &RuleSet::empty(), &claim, again, true).unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(b.verdict, Verdict::Verified);
    let stored = f.db.with_reader(|conn| results::list_for_scan(conn, "s1")).unwrap();
    assert_eq!(stored.len(), 1);
}

#[test]
fn rescanning_unchanged_index_gives_the_same_verdicts() {
    let f = Fixture::new();
    f.file("src/app.ts").file("src/a/index.ts").file("src/b/index.ts");
    let claims = || {
        vec![
            path_claim("c1", "src/app.ts"),
            path_claim("c2", "index.ts"),
            path_claim("c3", "src/nope.ts"),
        ]
    };
    let runner = f.runner(&offline_config());
    let first = runner.run(REPO, claims(), &CancellationToken::new()).unwrap();
    let second = runner.run(REPO, claims(), &CancellationToken::new()).unwrap();
    assert_ne!(first.scan_run_id, second.scan_run_id);

    let key = |r: &VerificationResult| {
        (r.claim_id.clone(), r.verdict, r.tier, r.verification_path)
    };
    let mut a: Vec<_> = first.results.iter().map(key).collect();
    let mut b: Vec<_> = second.results.iter().map(key).collect();
    a.sort_by(|x, y| x.0.cmp(&y.0));
    b.sort_by(|x, y| x.0.cmp(&y.0));
    assert_eq!(a, b);
}

#[test]
fn cancelled_scan_leaves_claims_pending_until_resumed() {
    let f = Fixture::new();
    f.file("src/app.ts");
    let runner = f.runner(&offline_config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = runner.run(REPO, vec![path_claim("c1", "src/app.ts")], &cancel).unwrap();
    assert_eq!(report.status, ScanStatus::Cancelled);
    assert!(report.results.is_empty());
    assert_eq!(report.unprocessed, vec!["c1".to_string()]);
    assert_eq!(report.health_score, 0.0);
    let stored = f.db.with_reader(|conn| claims::require_claim(conn, "c1")).unwrap();
    assert_eq!(stored.verification_status, VerificationStatus::Pending);

    let resumed = runner
        .rerun_pending(&report.scan_run_id, &CancellationToken::new())
        .unwrap();
    assert_eq!(resumed.status, ScanStatus::Completed);
    assert_eq!(resumed.results.len(), 1);
    assert_eq!(resumed.results[0].scan_run_id, report.scan_run_id);
    let run = f
        .db
        .with_reader(|conn| scan_runs::get(conn, &report.scan_run_id))
        .unwrap()
        .unwrap();
    assert_eq!((run.verified, run.pending), (1, 0));
}

#[test]
fn rerun_only_touches_its_own_claims() {
    let f = Fixture::new();
    f.file("src/app.ts").file("src/lib.ts");
    let mut config = offline_config();
    config.agent.enabled = Some(true);
    let runner = f.runner(&config);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let behavior = Claim::new(
        "b1",
        REPO,
        "docs/arch.md",
        12,
        "Requests are retried with exponential backoff",
        ExtractedValue::Behavior {
            description: "retries with exponential backoff".into(),
        },
    );

    let first = runner
        .run(REPO, vec![path_claim("c1", "src/app.ts"), behavior.clone()], &cancel)
        .unwrap();
    let other = runner.run(REPO, vec![path_claim("c2", "src/lib.ts")], &cancel).unwrap();
    // A concurrent run picks up the behavior claim and hands it to the agent.
    let live = runner.run(REPO, vec![behavior], &CancellationToken::new()).unwrap();
    assert_eq!(live.deferred.len(), 1);

    let resumed = runner
        .rerun_pending(&first.scan_run_id, &CancellationToken::new())
        .unwrap();
    let ids: Vec<&str> = resumed.results.iter().map(|r| r.claim_id.as_str()).collect();
    assert_eq!(ids, vec!["c1"]);
    assert!(resumed.deferred.is_empty());
    let tasks = f
        .db
        .with_reader(|conn| agent_tasks::list_by_scan(conn, &first.scan_run_id))
        .unwrap();
    assert!(tasks.is_empty());

    let untouched = f.db.with_reader(|conn| claims::require_claim(conn, "c2")).unwrap();
    assert_eq!(untouched.verification_status, VerificationStatus::Pending);
    assert_ne!(other.scan_run_id, first.scan_run_id);
}

#[test]
fn rerun_of_unknown_scan_is_an_error() {
    let f = Fixture::new();
    assert!(f
        .runner(&offline_config())
        .rerun_pending("no-such-scan", &CancellationToken::new())
        .is_err());
}

#[test]
fn semantic_claim_is_deferred_to_the_agent() {
    let f = Fixture::new();
    let mut config = offline_config();
    config.agent.enabled = Some(true);
    let claim = Claim::new(
        "c1",
        REPO,
        "docs/arch.md",
        12,
        "Requests are retried with exponential backoff",
        ExtractedValue::Behavior {
            description: "retries with exponential backoff".into(),
        },
    );

    let report = f
        .runner(&config)
        .run(REPO, vec![claim], &CancellationToken::new())
        .unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.deferred.len(), 1);
    assert_eq!(report.pending(), 1);
    assert_eq!(report.health_score, 0.0);

    let tasks = f
        .db
        .with_reader(|conn| agent_tasks::list_by_scan(conn, &report.scan_run_id))
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].task_type, AgentTaskType::Verification);
    assert_eq!(tasks[0].id, report.deferred[0].task_id);
    let stored = f.db.with_reader(|conn| claims::require_claim(conn, "c1")).unwrap();
    assert_eq!(stored.verification_status, VerificationStatus::Pending);
}

#[test]
fn scan_survives_reopening_the_database() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("docdrift.db");
    let scan_run_id = {
        let db = Arc::new(DatabaseManager::open(&path).unwrap());
        let index = Arc::new(SqliteIndex::new(db.clone()));
        index.add_file(REPO, "src/app.ts", None).unwrap();
        let runner = ScanRunner::new(db, index.clone(), index, &offline_config()).unwrap();
        runner
            .run(REPO, vec![path_claim("c1", "src/app.ts")], &CancellationToken::new())
            .unwrap()
            .scan_run_id
    };

    let db = DatabaseManager::open(&path).unwrap();
    let run = db
        .with_reader(|conn| scan_runs::get(conn, &scan_run_id))
        .unwrap()
        .unwrap();
    assert_eq!(run.status, ScanStatus::Completed);
    let c = db.with_reader(|conn| claims::require_claim(conn, "c1")).unwrap();
    assert_eq!(c.verification_status, VerificationStatus::Verified);
}
