use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use hive_crypto::Keypair;
use hive_distribution::{MemoryChain, TaskState};
use hive_node::{router, AppState, NodeConfig, SignedRequest, TRANSACTION_ID_HEADER};
use hive_storage::{MemoryWorkStore, WorkStore};
use hive_types::{
    AuditResult, IssuePr, RepoCreation, RoundPayload, TodoPr, WorkKind, WorkRequest, WorkStatus,
    WorkUnit,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const TASK_ID: &str = "task-1";

struct Harness {
    app: Router,
    store: Arc<MemoryWorkStore>,
}

async fn harness(staked: &[&Keypair]) -> Harness {
    let mut config = NodeConfig::default();
    config.task.task_id = TASK_ID.to_string();
    config.task.max_assignees = 2;

    let chain = Arc::new(MemoryChain::new());
    let mut state = TaskState::new(TASK_ID);
    for keypair in staked {
        state.stake_list.insert(keypair.public_key().to_base58(), 100);
    }
    chain.set_task_state(state).await;

    let store = Arc::new(MemoryWorkStore::new());
    store
        .insert_unit(WorkUnit::new("todo-1", WorkKind::Todo, "Add parser", "org", "repo"))
        .await
        .unwrap();
    store
        .insert_unit(WorkUnit::new("issue-1", WorkKind::Issue, "Epic", "org", "repo"))
        .await
        .unwrap();

    let app_state = AppState::new(&config, store.clone(), chain);
    Harness {
        app: router(Arc::new(app_state)),
        store,
    }
}

fn signed(keypair: &Keypair, payload: &RoundPayload) -> SignedRequest {
    let signature = hive_crypto::sign(keypair, payload).unwrap();
    SignedRequest::new(signature, payload.pub_key(), keypair.public_key())
}

fn work_request(keypair: &Keypair, round: u64) -> WorkRequest {
    WorkRequest {
        task_id: TASK_ID.to_string(),
        round_number: round,
        github_username: "octocat".to_string(),
        staking_key: *keypair.public_key(),
        pub_key: *keypair.public_key(),
    }
}

fn todo_pr(keypair: &Keypair, round: u64, pr_url: &str) -> RoundPayload {
    RoundPayload::AddTodoPr(TodoPr {
        task_id: TASK_ID.to_string(),
        round_number: round,
        pr_url: pr_url.to_string(),
        staking_key: *keypair.public_key(),
        pub_key: *keypair.public_key(),
    })
}

fn post(uri: &str, body: &impl serde::Serialize) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let h = harness(&[]).await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["todoCount"], 1);
    assert_eq!(body["data"]["issueCount"], 1);
    assert_eq!(body["data"]["assignmentCount"], 0);
}

#[tokio::test]
async fn test_fetch_submit_and_check_todo() {
    let worker = Keypair::generate();
    let h = harness(&[&worker]).await;

    let fetch = signed(&worker, &RoundPayload::FetchTodo(work_request(&worker, 4)));
    let (status, body) = send(&h.app, post("/fetch-todo", &fetch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "todo-1");

    // same worker, same round: the unit is handed back rather than a second claim
    let (status, body) = send(&h.app, post("/fetch-todo", &fetch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["assignedTo"].as_array().unwrap().len(), 1);

    let pr_url = "https://github.com/org/repo/pull/7";
    let submit = signed(&worker, &todo_pr(&worker, 4, pr_url));
    let (status, body) = send(&h.app, post("/add-todo-pr", &submit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "IN_REVIEW");

    let check = json!({
        "stakingKey": worker.public_key().to_base58(),
        "pubKey": worker.public_key().to_base58(),
        "roundNumber": 4,
        "githubUsername": "octocat",
        "prUrl": pr_url,
        "taskId": TASK_ID,
    });
    let (status, _) = send(&h.app, post("/check-todo", &check)).await;
    assert_eq!(status, StatusCode::OK);

    let mut wrong_pr = check.clone();
    wrong_pr["prUrl"] = json!("https://github.com/org/repo/pull/8");
    let (status, _) = send(&h.app, post("/check-todo", &wrong_pr)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut wrong_task = check.clone();
    wrong_task["taskId"] = json!("task-2");
    let (status, _) = send(&h.app, post("/check-todo", &wrong_task)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_fetch_when_nothing_available() {
    let worker = Keypair::generate();
    let h = harness(&[&worker]).await;

    let fetch = signed(&worker, &RoundPayload::FetchIssue(work_request(&worker, 1)));
    let (status, _) = send(&h.app, post("/fetch-issue", &fetch)).await;
    assert_eq!(status, StatusCode::OK);

    // the only issue is already held by this worker from round 1
    let fetch = signed(&worker, &RoundPayload::FetchIssue(work_request(&worker, 2)));
    let (status, body) = send(&h.app, post("/fetch-issue", &fetch)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_signature_by_another_key_is_rejected() {
    let worker = Keypair::generate();
    let impostor = Keypair::generate();
    let h = harness(&[&worker]).await;

    let payload = RoundPayload::FetchTodo(work_request(&worker, 1));
    let mut request = signed(&impostor, &payload);
    request.staking_key = worker.public_key().to_base58();

    let (status, body) = send(&h.app, post("/fetch-todo", &request)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(h.store.get_unit(WorkKind::Todo, "todo-1").await.unwrap().unwrap().assigned_to.is_empty());
}

#[tokio::test]
async fn test_garbage_signature_and_keys_are_rejected() {
    let worker = Keypair::generate();
    let h = harness(&[&worker]).await;

    let request = json!({
        "signature": "not-base58-0OIl",
        "pubKey": worker.public_key().to_base58(),
        "stakingKey": worker.public_key().to_base58(),
    });
    let (status, _) = send(&h.app, post("/fetch-todo", &request)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = json!({
        "signature": "abc",
        "pubKey": "nope",
        "stakingKey": "nope",
    });
    let (status, _) = send(&h.app, post("/fetch-todo", &request)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unstaked_worker_is_rejected() {
    let worker = Keypair::generate();
    let h = harness(&[]).await;

    let fetch = signed(&worker, &RoundPayload::FetchTodo(work_request(&worker, 1)));
    let (status, body) = send(&h.app, post("/fetch-todo", &fetch)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid staking key");
}

#[tokio::test]
async fn test_wrong_task_and_wrong_action_are_rejected() {
    let worker = Keypair::generate();
    let h = harness(&[&worker]).await;

    let mut other_task = work_request(&worker, 1);
    other_task.task_id = "task-2".to_string();
    let request = signed(&worker, &RoundPayload::FetchTodo(other_task));
    let (status, _) = send(&h.app, post("/fetch-todo", &request)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // a fetch-issue payload replayed against fetch-todo
    let request = signed(&worker, &RoundPayload::FetchIssue(work_request(&worker, 1)));
    let (status, _) = send(&h.app, post("/fetch-todo", &request)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_submission_without_assignment_is_rejected() {
    let worker = Keypair::generate();
    let h = harness(&[&worker]).await;

    let submit = signed(&worker, &todo_pr(&worker, 3, "https://github.com/org/repo/pull/1"));
    let (status, _) = send(&h.app, post("/add-todo-pr", &submit)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unit = h.store.get_unit(WorkKind::Todo, "todo-1").await.unwrap().unwrap();
    assert_eq!(unit.status, WorkStatus::Initialized);
}

#[tokio::test]
async fn test_duplicate_submission_conflicts() {
    let worker = Keypair::generate();
    let h = harness(&[&worker]).await;

    let fetch = signed(&worker, &RoundPayload::FetchTodo(work_request(&worker, 2)));
    send(&h.app, post("/fetch-todo", &fetch)).await;

    let first = signed(&worker, &todo_pr(&worker, 2, "https://github.com/org/repo/pull/1"));
    let (status, _) = send(&h.app, post("/add-todo-pr", &first)).await;
    assert_eq!(status, StatusCode::OK);

    let second = signed(&worker, &todo_pr(&worker, 2, "https://github.com/org/repo/pull/2"));
    let (status, _) = send(&h.app, post("/add-todo-pr", &second)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_issue_pr_and_aggregator_repo() {
    let worker = Keypair::generate();
    let outsider = Keypair::generate();
    let h = harness(&[&worker, &outsider]).await;

    let fetch = signed(&worker, &RoundPayload::FetchIssue(work_request(&worker, 5)));
    let (status, _) = send(&h.app, post("/fetch-issue", &fetch)).await;
    assert_eq!(status, StatusCode::OK);

    let repo = |keypair: &Keypair| {
        RoundPayload::CreateRepo(RepoCreation {
            task_id: TASK_ID.to_string(),
            round_number: 5,
            issue_uuid: "issue-1".to_string(),
            aggregator_url: "https://github.com/octocat/aggregator".to_string(),
            staking_key: *keypair.public_key(),
            pub_key: *keypair.public_key(),
        })
    };

    let (status, _) = send(&h.app, post("/create-repo", &signed(&outsider, &repo(&outsider)))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&h.app, post("/create-repo", &signed(&worker, &repo(&worker)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["aggregatorUrl"], "https://github.com/octocat/aggregator");

    let (status, _) = send(&h.app, post("/create-repo", &signed(&worker, &repo(&worker)))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let issue_pr = RoundPayload::AddIssuePr(IssuePr {
        task_id: TASK_ID.to_string(),
        round_number: 5,
        pr_url: "https://github.com/org/repo/pull/42".to_string(),
        issue_uuid: "issue-1".to_string(),
        staking_key: *worker.public_key(),
        pub_key: *worker.public_key(),
    });
    let (status, body) = send(&h.app, post("/add-issue-pr", &signed(&worker, &issue_pr))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "IN_REVIEW");
}

#[tokio::test]
async fn test_update_audit_result() {
    let worker = Keypair::generate();
    let auditor = Keypair::generate();
    let h = harness(&[&worker, &auditor]).await;

    let fetch = signed(&worker, &RoundPayload::FetchTodo(work_request(&worker, 6)));
    send(&h.app, post("/fetch-todo", &fetch)).await;
    let submit = signed(&worker, &todo_pr(&worker, 6, "https://github.com/org/repo/pull/3"));
    send(&h.app, post("/add-todo-pr", &submit)).await;

    let result = signed(
        &auditor,
        &RoundPayload::UpdateAuditResult(AuditResult {
            task_id: TASK_ID.to_string(),
            round_number: 6,
            work_kind: WorkKind::Todo,
            passed: vec![*worker.public_key()],
            staking_key: *auditor.public_key(),
            pub_key: *auditor.public_key(),
        }),
    );

    let (status, _) = send(&h.app, post("/update-audit-result", &result)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let with_header = |id: &str| {
        Request::builder()
            .method("POST")
            .uri("/update-audit-result")
            .header("content-type", "application/json")
            .header(TRANSACTION_ID_HEADER, id)
            .body(Body::from(serde_json::to_vec(&result).unwrap()))
            .unwrap()
    };

    let (status, body) = send(&h.app, with_header("tx-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["approved"], 1);
    assert_eq!(body["data"]["transactionId"], "tx-1");

    let unit = h.store.get_unit(WorkKind::Todo, "todo-1").await.unwrap().unwrap();
    assert_eq!(unit.status, WorkStatus::Approved);

    let (status, body) = send(&h.app, with_header("tx-2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Round already processed");
    assert_eq!(body["data"]["approved"], 0);
}
