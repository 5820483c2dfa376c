use hive_storage::{MemoryWorkStore, WorkStore};
use hive_types::{PublicKey, WorkKind, WorkStatus, WorkUnit};
use hive_work::{AssignmentConfig, AssignmentStore, WorkError};
use std::sync::Arc;

fn key(b: u8) -> PublicKey {
    PublicKey::from_bytes([b; 32])
}

async fn store_with(ids: &[&str]) -> (Arc<MemoryWorkStore>, Arc<AssignmentStore>) {
    let store = Arc::new(MemoryWorkStore::new());
    for id in ids {
        store
            .insert_unit(WorkUnit::new(*id, WorkKind::Todo, "Implement feature", "org", "repo"))
            .await
            .unwrap();
    }
    let assignments = Arc::new(AssignmentStore::new(
        store.clone(),
        AssignmentConfig {
            task_id: "task-1".to_string(),
            max_assignees: 2,
        },
    ));
    (store, assignments)
}

#[tokio::test]
async fn test_two_concurrent_claims_fill_the_cap() {
    let (store, assignments) = store_with(&["todo-1"]).await;

    let a = {
        let assignments = assignments.clone();
        tokio::spawn(async move {
            assignments
                .try_assign(WorkKind::Todo, "todo-1", &key(1), 9, "alice")
                .await
        })
    };
    let b = {
        let assignments = assignments.clone();
        tokio::spawn(async move {
            assignments
                .try_assign(WorkKind::Todo, "todo-1", &key(2), 9, "bob")
                .await
        })
    };
    assert!(a.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());

    let unit = store.get_unit(WorkKind::Todo, "todo-1").await.unwrap().unwrap();
    assert_eq!(unit.assigned_to.len(), 2);
}

#[tokio::test]
async fn test_many_concurrent_claims_never_exceed_cap() {
    let (store, assignments) = store_with(&["todo-1"]).await;

    let handles: Vec<_> = (1..=12u8)
        .map(|b| {
            let assignments = assignments.clone();
            tokio::spawn(async move {
                assignments
                    .try_assign(WorkKind::Todo, "todo-1", &key(b), 9, "worker")
                    .await
            })
        })
        .collect();

    let mut ok = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(WorkError::StateConflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(ok, 2);
    assert_eq!(conflicts, 10);

    let unit = store.get_unit(WorkKind::Todo, "todo-1").await.unwrap().unwrap();
    assert_eq!(unit.assigned_to.len(), 2);
}

#[tokio::test]
async fn test_same_key_same_round_conflicts() {
    let (_, assignments) = store_with(&["todo-1"]).await;
    assignments
        .try_assign(WorkKind::Todo, "todo-1", &key(1), 4, "alice")
        .await
        .unwrap();

    assert!(matches!(
        assignments
            .try_assign(WorkKind::Todo, "todo-1", &key(1), 4, "alice")
            .await,
        Err(WorkError::StateConflict(_))
    ));
}

#[tokio::test]
async fn test_submission_without_assignment_is_not_found_and_writes_nothing() {
    let (store, assignments) = store_with(&["todo-1"]).await;
    assignments
        .try_assign(WorkKind::Todo, "todo-1", &key(1), 4, "alice")
        .await
        .unwrap();
    let before = store.get_unit(WorkKind::Todo, "todo-1").await.unwrap().unwrap();

    // wrong round, then a key that was never assigned
    for (worker, round) in [(key(1), 5), (key(2), 4)] {
        assert!(matches!(
            assignments
                .record_submission(
                    WorkKind::Todo,
                    None,
                    &worker,
                    round,
                    "https://github.com/o/r/pull/1",
                    "sig",
                )
                .await,
            Err(WorkError::NotFound(_))
        ));
    }

    let after = store.get_unit(WorkKind::Todo, "todo-1").await.unwrap().unwrap();
    assert_eq!(before, after);
    assert_eq!(after.status, WorkStatus::InProgress);
}

#[tokio::test]
async fn test_issue_submission_must_name_assigned_unit() {
    let store = Arc::new(MemoryWorkStore::new());
    for id in ["issue-1", "issue-2"] {
        store
            .insert_unit(WorkUnit::new(id, WorkKind::Issue, "Epic", "org", "repo"))
            .await
            .unwrap();
    }
    let assignments = AssignmentStore::new(
        store,
        AssignmentConfig {
            task_id: "task-1".to_string(),
            max_assignees: 2,
        },
    );
    assignments
        .try_assign(WorkKind::Issue, "issue-1", &key(1), 2, "alice")
        .await
        .unwrap();

    assert!(matches!(
        assignments
            .record_submission(
                WorkKind::Issue,
                Some("issue-2"),
                &key(1),
                2,
                "https://github.com/o/r/pull/1",
                "sig",
            )
            .await,
        Err(WorkError::NotFound(_))
    ));
    assert!(assignments
        .record_submission(
            WorkKind::Issue,
            Some("issue-1"),
            &key(1),
            2,
            "https://github.com/o/r/pull/1",
            "sig",
        )
        .await
        .is_ok());
}

#[tokio::test]
async fn test_query_returns_open_assignment() {
    let (_, assignments) = store_with(&["todo-1", "todo-2"]).await;
    assert!(assignments.query(WorkKind::Todo, &key(1)).await.unwrap().is_none());

    let claimed = assignments
        .claim_next(WorkKind::Todo, &key(1), 1, "alice")
        .await
        .unwrap()
        .unwrap();
    let held = assignments.query(WorkKind::Todo, &key(1)).await.unwrap().unwrap();
    assert_eq!(claimed.id, held.id);

    assignments
        .record_submission(WorkKind::Todo, None, &key(1), 1, "https://github.com/o/r/pull/3", "sig")
        .await
        .unwrap();
    assert!(assignments.query(WorkKind::Todo, &key(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_claims_in_later_round_hold_one_unit() {
    let (store, assignments) = store_with(&["todo-1", "todo-2", "todo-3", "todo-4"]).await;

    // round 1 claim never gets a pull request
    let first = assignments
        .claim_next(WorkKind::Todo, &key(1), 1, "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, "todo-1");

    let mut round_two = Vec::new();
    for _ in 0..3 {
        let unit = assignments
            .claim_next(WorkKind::Todo, &key(1), 2, "alice")
            .await
            .unwrap()
            .unwrap();
        round_two.push(unit.id);
    }
    assert_eq!(round_two, vec!["todo-2", "todo-2", "todo-2"]);

    let held = store
        .list_units(WorkKind::Todo)
        .await
        .unwrap()
        .iter()
        .filter(|u| u.assignment("task-1", &key(1), 2).is_some())
        .count();
    assert_eq!(held, 1);
}
