//! Mapper strategies, pins, co-change boost and `llm_assisted` enqueue.

use std::sync::Arc;

use chrono::Utc;

use docdrift_analysis::embedding::TfIdfEmbedder;
use docdrift_analysis::mapper::Mapper;
use docdrift_analysis::scan::ScanRunner;
use docdrift_analysis::verifier::url_probe::{UrlProbe, UrlStatus};
use docdrift_core::config::DocDriftConfig;
use docdrift_core::models::{
    AgentTaskType, Claim, CodeEntity, EntityType, ExtractedValue, MappingMethod, MappingStatus, Tier,
    Verdict, VerificationPath,
};
use docdrift_core::traits::{CancellationToken, EmbeddingProvider};
use docdrift_storage::queries::{agent_tasks, mappings};
use docdrift_storage::{DatabaseManager, SqliteIndex};

const REPO: &str = "repo";
const SCAN: &str = "s1";

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

    fn files(&self, paths: &[&str]) {
        for p in paths {
            self.index.add_file(REPO, p, None).unwrap();
        }
    }

    fn mapper(&self, config: &DocDriftConfig) -> Mapper {
        Mapper::new(self.db.clone(), self.index.clone(), self.index.clone(), config)
    }
}

fn offline() -> DocDriftConfig {
    let mut config = DocDriftConfig::default();
    config.agent.enabled = Some(false);
    config.url_check.enabled = Some(false);
    config
}

fn index_claim() -> Claim {
    Claim::new(
        "c1",
        REPO,
        "README.md",
        2,
        "Entry point is index.ts",
        ExtractedValue::PathReference {
            path: "index.ts".into(),
        },
    )
}

const RETRY_TEXT: &str = "Requests are retried with exponential backoff";

fn behavior_claim() -> Claim {
    Claim::new(
        "b1",
        REPO,
        "docs/arch.md",
        9,
        RETRY_TEXT,
        ExtractedValue::Behavior {
            description: "exponential backoff".into(),
        },
    )
}

#[test]
fn exact_path_is_a_direct_reference() {
    let f = Fixture::new();
    f.files(&["src/config/index.ts"]);
    let claim = Claim::new(
        "c1",
        REPO,
        "README.md",
        2,
        "See ./src/config/index.ts:12",
        ExtractedValue::PathReference {
            path: "./src/config/index.ts:12".into(),
        },
    );
    let set = f.mapper(&offline()).map_claim(SCAN, &claim).unwrap();
    assert_eq!(set.status, MappingStatus::Resolved);
    let top = set.top().unwrap();
    assert_eq!(top.code_file, "src/config/index.ts");
    assert_eq!(top.mapping_method, MappingMethod::DirectReference);
    assert_eq!(top.confidence, 1.0);
}

#[test]
fn suffix_ties_are_kept_and_flagged() {
    let f = Fixture::new();
    f.files(&["src/a/index.ts", "src/b/index.ts"]);
    let set = f.mapper(&offline()).map_claim(SCAN, &index_claim()).unwrap();
    assert_eq!(set.status, MappingStatus::AmbiguousSuffixMatch);
    assert_eq!(set.mappings.len(), 2);
    assert_eq!(set.mappings[0].confidence, set.mappings[1].confidence);

    let stored = f
        .db
        .with_reader(|conn| mappings::list_for_claim(conn, SCAN, "c1"))
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[test]
fn co_change_history_breaks_a_tie() {
    let f = Fixture::new();
    f.files(&["src/a/index.ts", "src/b/index.ts"]);
    for sha in ["c1", "c2", "c3"] {
        f.index
            .record_commit(REPO, sha, Utc::now(), &["README.md".into(), "src/b/index.ts".into()])
            .unwrap();
    }
    let set = f.mapper(&offline()).map_claim(SCAN, &index_claim()).unwrap();
    assert_eq!(set.status, MappingStatus::Resolved);
    let top = set.top().unwrap();
    assert_eq!(top.code_file, "src/b/index.ts");
    assert!(top.co_change_boost > 0.0);
    // The boost is additive; the base confidence is untouched.
    assert_eq!(top.confidence, set.mappings[1].confidence);
}

#[test]
fn existing_path_outranks_a_co_changed_symbol() {
    let f = Fixture::new();
    f.files(&["src/config.ts", "src/loader.ts"]);
    let entity = CodeEntity::new("e1", REPO, "src/loader.ts", EntityType::Function, "loadConfig");
    f.index.add_entities(&[entity]).unwrap();
    for i in 0..20 {
        f.index
            .record_commit(REPO, &format!("h{i}"), Utc::now(), &["README.md".into(), "src/loader.ts".into()])
            .unwrap();
    }
    let claim = Claim::new(
        "c1",
        REPO,
        "README.md",
        2,
        "Config is read by `loadConfig` in src/config.ts",
        ExtractedValue::PathReference {
            path: "src/config.ts".into(),
        },
    )
    .with_keywords(["loadConfig"]);

    let set = f.mapper(&offline()).map_claim(SCAN, &claim).unwrap();
    assert_eq!(set.status, MappingStatus::Resolved);
    assert_eq!(set.top().unwrap().code_file, "src/config.ts");
    assert_eq!(set.top().unwrap().mapping_method, MappingMethod::DirectReference);
    let loader = set.mappings.iter().find(|m| m.code_file == "src/loader.ts").unwrap();
    assert!(loader.co_change_boost > 0.19);

    let runner = ScanRunner::new(f.db.clone(), f.index.clone(), f.index.clone(), &offline()).unwrap();
    let report = runner.run(REPO, vec![claim], &CancellationToken::new()).unwrap();
    let r = &report.results[0];
    assert_eq!(r.verdict, Verdict::Verified);
    assert_ne!(r.verification_path, VerificationPath::Ambiguity);
}

#[test]
fn pin_overrides_every_strategy_until_removed() {
    let f = Fixture::new();
    f.files(&["src/a/index.ts", "src/b/index.ts"]);
    let mapper = f.mapper(&offline());
    mapper.pin("c1", "src/b/index.ts", None).unwrap();

    let set = mapper.map_claim(SCAN, &index_claim()).unwrap();
    assert!(set.pinned);
    assert_eq!(set.status, MappingStatus::Resolved);
    assert_eq!(set.mappings.len(), 1);
    assert_eq!(set.mappings[0].mapping_method, MappingMethod::Manual);

    assert!(mapper.unpin("c1", "src/b/index.ts", None).unwrap());
    let set = mapper.map_claim("s2", &index_claim()).unwrap();
    assert!(!set.pinned);
    assert!(set.is_ambiguous());
}

#[test]
fn semantic_search_finds_similar_entities() {
    let f = Fixture::new();
    let embedder = TfIdfEmbedder::default();
    let entity = CodeEntity::new("e1", REPO, "src/retry.ts", EntityType::Function, "retryWithBackoff")
        .with_embedding(embedder.embed(RETRY_TEXT).unwrap());
    f.index.add_entities(&[entity]).unwrap();

    let set = f.mapper(&offline()).map_claim(SCAN, &behavior_claim()).unwrap();
    let top = set.top().expect("semantic candidate");
    assert_eq!(top.code_file, "src/retry.ts");
    assert_eq!(top.mapping_method, MappingMethod::SemanticSearch);
    assert!(top.confidence >= 0.7);
    assert!(set.pending_agent_task.is_none());
}

#[test]
fn unmapped_semantic_claim_gets_an_exploration_task() {
    let f = Fixture::new();
    let mut config = offline();
    config.agent.enabled = Some(true);
    let mapper = f.mapper(&config);

    let set = mapper.map_claim(SCAN, &behavior_claim()).unwrap();
    assert_eq!(set.status, MappingStatus::Unmapped);
    let task_id = set.pending_agent_task.expect("agent task queued");
    let task = f
        .db
        .with_reader(|conn| agent_tasks::get(conn, &task_id))
        .unwrap()
        .unwrap();
    assert_eq!(task.task_type, AgentTaskType::Verification);

    // Mapping again in the same scan reuses the task.
    let again = mapper.map_claim(SCAN, &behavior_claim()).unwrap();
    assert_eq!(again.pending_agent_task.as_deref(), Some(task_id.as_str()));
}

struct FixedProbe(UrlStatus);

impl UrlProbe for FixedProbe {
    fn probe(&self, _url: &str) -> UrlStatus {
        self.0.clone()
    }
}

fn url_claim() -> Claim {
    Claim::new(
        "u1",
        REPO,
        "README.md",
        40,
        "Docs live at https://example.com/guide",
        ExtractedValue::UrlReference {
            url: "https://example.com/guide".into(),
        },
    )
}

#[test]
fn dead_link_drifts_and_live_link_verifies() {
    for (status, expected) in [
        (UrlStatus::Gone(404), Verdict::Drifted),
        (UrlStatus::Reachable(200), Verdict::Verified),
    ] {
        let f = Fixture::new();
        let runner = ScanRunner::new(f.db.clone(), f.index.clone(), f.index.clone(), &offline())
            .unwrap()
            .with_url_probe(Some(Arc::new(FixedProbe(status))));
        let report = runner
            .run(REPO, vec![url_claim()], &CancellationToken::new())
            .unwrap();
        let r = &report.results[0];
        assert_eq!(r.verdict, expected);
        assert_eq!(r.tier, Tier::Deterministic);
    }
}
