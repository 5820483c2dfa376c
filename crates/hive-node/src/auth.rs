//! Request authentication
//!
//! Signed endpoints carry `{signature, pubKey, stakingKey}`. The payload is
//! recovered from the signature under `stakingKey`, must name the endpoint's
//! action and the configured task, must repeat both keys from the body, and
//! the staking key must hold stake on chain.

use crate::api::AppState;
use crate::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use hive_crypto::open_payload;
use hive_types::{Action, PublicKey, RoundPayload};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const TRANSACTION_ID_HEADER: &str = "X-Transaction-Id";

/// Body of every signed endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRequest {
    pub signature: String,
    pub pub_key: String,
    pub staking_key: String,
}

impl SignedRequest {
    pub fn new(signature: String, pub_key: &PublicKey, staking_key: &PublicKey) -> Self {
        Self {
            signature,
            pub_key: pub_key.to_base58(),
            staking_key: staking_key.to_base58(),
        }
    }
}

pub(crate) fn parse_key(field: &str, value: &str) -> Result<PublicKey, ApiError> {
    PublicKey::from_base58(value).map_err(|_| ApiError::Unauthorized(format!("Invalid {}", field)))
}

/// Caller-supplied transaction id. Requests without one are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for TransactionId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(TRANSACTION_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| TransactionId(id.to_string()))
            .ok_or(ApiError::MissingHeader(TRANSACTION_ID_HEADER))
    }
}

/// Verify a signed request for `expected` and return the recovered payload
pub async fn authenticate(
    state: &AppState,
    request: &SignedRequest,
    expected: Action,
) -> Result<RoundPayload, ApiError> {
    let staking_key = parse_key("staking key", &request.staking_key)?;
    let pub_key = parse_key("pubKey", &request.pub_key)?;

    let payload = open_payload(&request.signature, &staking_key)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid signature: {}", e)))?;

    payload
        .ensure(expected, &state.task_id)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    if *payload.staking_key() != staking_key || *payload.pub_key() != pub_key {
        return Err(ApiError::Unauthorized(
            "Signed keys do not match request".to_string(),
        ));
    }

    ensure_staked(state, &staking_key).await?;

    debug!(
        action = %expected,
        worker = %staking_key.short(),
        round = payload.round_number(),
        "Signed request verified"
    );
    Ok(payload)
}

/// The staking key must appear with a positive stake in the task's stake list
pub async fn ensure_staked(state: &AppState, staking_key: &PublicKey) -> Result<(), ApiError> {
    let task_state = tokio::time::timeout(
        state.collaborator_timeout,
        state.chain.get_task_state(&state.task_id),
    )
    .await
    .map_err(|_| ApiError::Internal("Task state fetch timed out".to_string()))?
    .map_err(|e| ApiError::Internal(format!("Task state unavailable: {}", e)))?;

    if !task_state.is_staked(&staking_key.to_base58()) {
        return Err(ApiError::Unauthorized("Invalid staking key".to_string()));
    }
    Ok(())
}
