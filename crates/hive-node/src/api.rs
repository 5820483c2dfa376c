use crate::auth::{authenticate, ensure_staked, parse_key, SignedRequest, TransactionId};
use crate::config::NodeConfig;
use crate::error::{ApiError, ApiResponse};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use hive_distribution::ChainClient;
use hive_storage::{StorageStats, WorkStore};
use hive_types::{Action, RoundPayload, WorkKind, WorkUnit};
use hive_work::{AssignmentStore, ProcessedRounds, WorkError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

pub struct AppState {
    pub task_id: String,
    pub assignments: AssignmentStore,
    pub chain: Arc<dyn ChainClient>,
    pub processed_rounds: ProcessedRounds,
    pub collaborator_timeout: Duration,
}

impl AppState {
    pub fn new(config: &NodeConfig, store: Arc<dyn WorkStore>, chain: Arc<dyn ChainClient>) -> Self {
        Self {
            task_id: config.task.task_id.clone(),
            assignments: AssignmentStore::new(store, config.assignment_config()),
            chain,
            processed_rounds: ProcessedRounds::new(config.round_cache_config()),
            collaborator_timeout: config.collaborator_timeout(),
        }
    }
}

/// Unsigned assignment lookup issued by the audit collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckBody {
    pub staking_key: String,
    pub pub_key: String,
    pub round_number: u64,
    pub github_username: String,
    pub pr_url: String,
    pub task_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResultSummary {
    pub approved: usize,
    pub transaction_id: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/fetch-todo", post(fetch_todo))
        .route("/fetch-issue", post(fetch_issue))
        .route("/add-todo-pr", post(add_todo_pr))
        .route("/add-issue-pr", post(add_issue_pr))
        .route("/check-todo", post(check_todo))
        .route("/check-issue", post(check_issue))
        .route("/create-repo", post(create_repo))
        .route("/update-audit-result", post(update_audit_result))
        .with_state(state)
}

pub fn start_api_server(state: Arc<AppState>, host: String, port: u16) -> JoinHandle<anyhow::Result<()>> {
    let app = router(state);
    let addr = format!("{}:{}", host, port);

    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(addr = %addr, "📡 API server listening");
        axum::serve(listener, app).await?;
        Ok(())
    })
}

async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StorageStats>>, ApiError> {
    let stats = state
        .assignments
        .store()
        .get_stats()
        .await
        .map_err(WorkError::from)?;
    Ok(ApiResponse::ok("OK", stats))
}

fn unexpected(payload: &RoundPayload) -> ApiError {
    ApiError::Unauthorized(format!("Unexpected payload {}", payload.action()))
}

/// A submission with no matching assignment is an authorization failure
fn submission_error(e: WorkError) -> ApiError {
    match e {
        WorkError::NotFound(msg) => ApiError::Unauthorized(msg),
        other => other.into(),
    }
}

async fn fetch_work(
    state: &AppState,
    kind: WorkKind,
    action: Action,
    request: SignedRequest,
) -> Result<Json<ApiResponse<WorkUnit>>, ApiError> {
    let payload = authenticate(state, &request, action).await?;
    let work = match payload {
        RoundPayload::FetchTodo(w) | RoundPayload::FetchIssue(w) => w,
        other => return Err(unexpected(&other)),
    };

    match state
        .assignments
        .claim_next(kind, &work.staking_key, work.round_number, &work.github_username)
        .await?
    {
        Some(unit) => Ok(ApiResponse::ok("Work assigned", unit)),
        None => Err(ApiError::NotFound(format!("No {} available", kind))),
    }
}

async fn fetch_todo(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignedRequest>,
) -> Result<Json<ApiResponse<WorkUnit>>, ApiError> {
    fetch_work(&state, WorkKind::Todo, Action::FetchTodo, request).await
}

async fn fetch_issue(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignedRequest>,
) -> Result<Json<ApiResponse<WorkUnit>>, ApiError> {
    fetch_work(&state, WorkKind::Issue, Action::FetchIssue, request).await
}

async fn add_todo_pr(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignedRequest>,
) -> Result<Json<ApiResponse<WorkUnit>>, ApiError> {
    let pr = match authenticate(&state, &request, Action::AddTodoPr).await? {
        RoundPayload::AddTodoPr(pr) => pr,
        other => return Err(unexpected(&other)),
    };

    let unit = state
        .assignments
        .record_submission(
            WorkKind::Todo,
            None,
            &pr.staking_key,
            pr.round_number,
            &pr.pr_url,
            &request.signature,
        )
        .await
        .map_err(submission_error)?;
    Ok(ApiResponse::ok("Pull request recorded", unit))
}

async fn add_issue_pr(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignedRequest>,
) -> Result<Json<ApiResponse<WorkUnit>>, ApiError> {
    let pr = match authenticate(&state, &request, Action::AddIssuePr).await? {
        RoundPayload::AddIssuePr(pr) => pr,
        other => return Err(unexpected(&other)),
    };

    let unit = state
        .assignments
        .record_submission(
            WorkKind::Issue,
            Some(&pr.issue_uuid),
            &pr.staking_key,
            pr.round_number,
            &pr.pr_url,
            &request.signature,
        )
        .await
        .map_err(submission_error)?;
    Ok(ApiResponse::ok("Pull request recorded", unit))
}

async fn check_work(
    state: &AppState,
    kind: WorkKind,
    body: CheckBody,
) -> Result<Json<ApiResponse<WorkUnit>>, ApiError> {
    let staking_key = parse_key("staking key", &body.staking_key)?;
    parse_key("pubKey", &body.pub_key)?;
    if body.task_id != state.task_id {
        return Err(ApiError::Unauthorized(format!("Invalid task id {}", body.task_id)));
    }
    ensure_staked(state, &staking_key).await?;

    state
        .assignments
        .check(
            kind,
            &staking_key,
            body.round_number,
            &body.github_username,
            &body.pr_url,
        )
        .await?
        .map(|unit| ApiResponse::ok("Assignment found", unit))
        .ok_or_else(|| ApiError::NotFound("No matching assignment".to_string()))
}

async fn check_todo(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckBody>,
) -> Result<Json<ApiResponse<WorkUnit>>, ApiError> {
    check_work(&state, WorkKind::Todo, body).await
}

async fn check_issue(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckBody>,
) -> Result<Json<ApiResponse<WorkUnit>>, ApiError> {
    check_work(&state, WorkKind::Issue, body).await
}

async fn create_repo(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignedRequest>,
) -> Result<Json<ApiResponse<WorkUnit>>, ApiError> {
    let repo = match authenticate(&state, &request, Action::CreateRepo).await? {
        RoundPayload::CreateRepo(repo) => repo,
        other => return Err(unexpected(&other)),
    };

    let unit = state
        .assignments
        .set_aggregator(&repo.issue_uuid, &repo.staking_key, &repo.aggregator_url)
        .await?;
    Ok(ApiResponse::ok("Aggregator repository recorded", unit))
}

async fn update_audit_result(
    State(state): State<Arc<AppState>>,
    TransactionId(transaction_id): TransactionId,
    Json(request): Json<SignedRequest>,
) -> Result<Json<ApiResponse<AuditResultSummary>>, ApiError> {
    let result = match authenticate(&state, &request, Action::UpdateAuditResult).await? {
        RoundPayload::UpdateAuditResult(result) => result,
        other => return Err(unexpected(&other)),
    };

    // todo and issue results for a round are processed independently
    let round_key = format!("{}/{}", state.task_id, result.work_kind);
    if state
        .processed_rounds
        .contains(&round_key, result.round_number)
        .await
    {
        info!(
            transaction_id = %transaction_id,
            round = result.round_number,
            kind = %result.work_kind,
            "Audit result already applied"
        );
        return Ok(ApiResponse::ok(
            "Round already processed",
            AuditResultSummary {
                approved: 0,
                transaction_id,
            },
        ));
    }

    let approved = state
        .assignments
        .approve(result.work_kind, result.round_number, &result.passed)
        .await?;
    state
        .processed_rounds
        .mark(&round_key, result.round_number)
        .await;

    info!(
        transaction_id = %transaction_id,
        round = result.round_number,
        kind = %result.work_kind,
        approved,
        "Audit result applied"
    );
    Ok(ApiResponse::ok(
        "Audit result applied",
        AuditResultSummary {
            approved,
            transaction_id,
        },
    ))
}
