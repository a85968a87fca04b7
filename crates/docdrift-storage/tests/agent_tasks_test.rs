//! Lease semantics of the agent task queue at the SQL level.

use chrono::{Duration, Utc};
use docdrift_core::models::{AgentTaskStatus, AgentTaskType};
use docdrift_storage::queries::agent_tasks::{self, NewAgentTask, TaskScope};
use docdrift_storage::DatabaseManager;
use serde_json::json;

fn scope() -> TaskScope {
    TaskScope {
        repo_id: "repo".into(),
        scan_run_id: Some("s1".into()),
        task_type: None,
    }
}

fn enqueue(db: &DatabaseManager, key: &str) -> (String, bool) {
    let payload = json!({ "claim": key });
    db.with_writer(|conn| {
        agent_tasks::enqueue(
            conn,
            &NewAgentTask {
                repo_id: "repo",
                scan_run_id: "s1",
                claim_id: Some(key),
                task_type: AgentTaskType::Verification,
                dedup_key: key,
                payload: &payload,
            },
            Utc::now(),
            Duration::minutes(30),
        )
    })
    .unwrap()
}

#[test]
fn enqueue_is_idempotent_per_subject() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let (a, created_a) = enqueue(&db, "c1");
    let (b, created_b) = enqueue(&db, "c1");
    assert!(created_a);
    assert!(!created_b);
    assert_eq!(a, b);
    let (c, _) = enqueue(&db, "c2");
    assert_ne!(a, c);
}

#[test]
fn claimed_task_is_not_claimable_until_lease_elapses() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let (id, _) = enqueue(&db, "c1");
    let now = Utc::now();
    let lease = Duration::seconds(120);

    let t = db
        .with_writer(|conn| agent_tasks::claim_next(conn, "w1", &scope(), now, lease, 3))
        .unwrap()
        .unwrap();
    assert_eq!(t.id, id);
    assert_eq!(t.status, AgentTaskStatus::InProgress);
    assert_eq!(t.attempts, 1);

    let none = db
        .with_writer(|conn| agent_tasks::claim_next(conn, "w2", &scope(), now, lease, 3))
        .unwrap();
    assert!(none.is_none());

    // After the lease, another worker takes over and the first loses its lease.
    let later = now + Duration::seconds(121);
    let t2 = db
        .with_writer(|conn| agent_tasks::claim_next(conn, "w2", &scope(), later, lease, 3))
        .unwrap()
        .unwrap();
    assert_eq!(t2.claimed_by.as_deref(), Some("w2"));
    assert_eq!(t2.attempts, 2);
    assert!(!db
        .with_writer(|conn| agent_tasks::complete(conn, &id, "w1", &json!({}), later))
        .unwrap());
    assert!(db
        .with_writer(|conn| agent_tasks::complete(conn, &id, "w2", &json!({"ok": true}), later))
        .unwrap());

    let done = db.with_reader(|conn| agent_tasks::get(conn, &id)).unwrap().unwrap();
    assert_eq!(done.status, AgentTaskStatus::Completed);
    assert_eq!(done.result, Some(json!({"ok": true})));
}

#[test]
fn fail_requeues_until_attempts_exhausted() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let (id, _) = enqueue(&db, "c1");
    let lease = Duration::seconds(60);

    for attempt in 1..=2 {
        let now = Utc::now();
        let t = db
            .with_writer(|conn| agent_tasks::claim_next(conn, "w1", &scope(), now, lease, 2))
            .unwrap()
            .unwrap();
        assert_eq!(t.attempts, attempt);
        let status = db
            .with_writer(|conn| agent_tasks::fail(conn, &id, "w1", "boom", now, 2))
            .unwrap();
        let expected = if attempt < 2 {
            AgentTaskStatus::Pending
        } else {
            AgentTaskStatus::Failed
        };
        assert_eq!(status, Some(expected));
    }

    let none = db
        .with_writer(|conn| agent_tasks::claim_next(conn, "w1", &scope(), Utc::now(), lease, 2))
        .unwrap();
    assert!(none.is_none());
    let task = db.with_reader(|conn| agent_tasks::get(conn, &id)).unwrap().unwrap();
    assert_eq!(task.error.as_deref(), Some("boom"));
    assert_eq!(db.with_reader(|conn| agent_tasks::count_open(conn, &scope())).unwrap(), 0);
}

#[test]
fn expire_stale_sweeps_elapsed_leases() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let (a, _) = enqueue(&db, "c1");
    let (b, _) = enqueue(&db, "c2");
    let now = Utc::now();
    let lease = Duration::seconds(30);
    db.with_writer(|conn| agent_tasks::claim_next(conn, "w1", &scope(), now, lease, 1))
        .unwrap();
    db.with_writer(|conn| agent_tasks::claim_next(conn, "w2", &scope(), now, lease, 3))
        .unwrap();

    let counts = db
        .with_writer(|conn| agent_tasks::expire_stale(conn, now + Duration::seconds(31), 1))
        .unwrap();
    // Both were claimed once; with one attempt allowed both fail.
    assert_eq!(counts.failed, 2);
    for id in [a, b] {
        let t = db.with_reader(|conn| agent_tasks::get(conn, &id)).unwrap().unwrap();
        assert_eq!(t.status, AgentTaskStatus::Failed);
    }
}

#[test]
fn expired_tasks_are_claimable_again() {
    let db = DatabaseManager::open_in_memory().unwrap();
    let (id, _) = enqueue(&db, "c1");
    let now = Utc::now();
    db.with_writer(|conn| agent_tasks::claim_next(conn, "w1", &scope(), now, Duration::seconds(5), 3))
        .unwrap();
    let later = now + Duration::seconds(6);
    let counts = db
        .with_writer(|conn| agent_tasks::expire_stale(conn, later, 3))
        .unwrap();
    assert_eq!(counts.expired, 1);
    let t = db
        .with_writer(|conn| agent_tasks::claim_next(conn, "w2", &scope(), later, Duration::seconds(5), 3))
        .unwrap()
        .unwrap();
    assert_eq!(t.id, id);
    assert_eq!(t.claimed_by.as_deref(), Some("w2"));
}

#[test]
fn scope_filters_by_scan_and_type() {
    let db = DatabaseManager::open_in_memory().unwrap();
    enqueue(&db, "c1");
    let other = TaskScope {
        repo_id: "repo".into(),
        scan_run_id: Some("s2".into()),
        task_type: None,
    };
    let typed = TaskScope {
        task_type: Some(AgentTaskType::FixGeneration),
        ..scope()
    };
    let now = Utc::now();
    let lease = Duration::seconds(60);
    assert!(db
        .with_writer(|conn| agent_tasks::claim_next(conn, "w", &other, now, lease, 3))
        .unwrap()
        .is_none());
    assert!(db
        .with_writer(|conn| agent_tasks::claim_next(conn, "w", &typed, now, lease, 3))
        .unwrap()
        .is_none());
    assert_eq!(db.with_reader(|conn| agent_tasks::list_by_scan(conn, "s1")).unwrap().len(), 1);
}
