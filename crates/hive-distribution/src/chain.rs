//! Read-only chain collaborator
//!
//! The coordinator reads two things from the chain: the task state (stake
//! list, per-round submissions, per-round distribution-list submissions) and
//! raw account bytes of a distribution leader.

use crate::decoder;
use crate::error::ChainError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// A node's round submission: reference into the blob store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionEntry {
    pub submission_value: String,
    #[serde(default)]
    pub slot: u64,
}

/// A node's posted distribution list for a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSubmission {
    pub submitter: String,
    pub submission_value: String,
    #[serde(default)]
    pub slot: u64,
}

/// On-chain task state as returned by the RPC.
///
/// `distribution_rewards_submission` keeps the order the chain returned,
/// which the legacy leader rule depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    #[serde(default)]
    pub stake_list: BTreeMap<String, u64>,
    #[serde(default)]
    pub submissions: BTreeMap<u64, BTreeMap<String, SubmissionEntry>>,
    #[serde(default)]
    pub distribution_rewards_submission: BTreeMap<u64, Vec<DistributionSubmission>>,
}

impl TaskState {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            ..Default::default()
        }
    }

    pub fn is_staked(&self, staking_key: &str) -> bool {
        self.stake_list.get(staking_key).is_some_and(|stake| *stake > 0)
    }

    pub fn submission(&self, round: u64, staking_key: &str) -> Option<&SubmissionEntry> {
        self.submissions.get(&round)?.get(staking_key)
    }
}

/// How the account bytes were delivered by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountEncoding {
    Raw,
    Snappy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountData {
    pub data: Vec<u8>,
    pub encoding: AccountEncoding,
}

impl AccountData {
    pub fn raw(data: Vec<u8>) -> Self {
        Self {
            data,
            encoding: AccountEncoding::Raw,
        }
    }

    /// Strip the transport compression layer, yielding the stored account bytes
    pub fn into_stored_bytes(self) -> Result<Vec<u8>, ChainError> {
        match self.encoding {
            AccountEncoding::Raw => Ok(self.data),
            AccountEncoding::Snappy => decoder::decompress(&self.data)
                .map_err(|e| ChainError::Malformed(e.to_string())),
        }
    }
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_task_state(&self, task_id: &str) -> Result<TaskState, ChainError>;

    /// `Ok(None)` when the account does not exist
    async fn get_account_data(&self, account: &str) -> Result<Option<AccountData>, ChainError>;
}

/// In-memory chain for tests and local runs
#[derive(Default)]
pub struct MemoryChain {
    tasks: RwLock<HashMap<String, TaskState>>,
    accounts: RwLock<HashMap<String, AccountData>>,
    unreachable: AtomicBool,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_task_state(&self, state: TaskState) {
        self.tasks.write().await.insert(state.task_id.clone(), state);
    }

    pub async fn set_account(&self, account: impl Into<String>, data: AccountData) {
        self.accounts.write().await.insert(account.into(), data);
    }

    /// Make every subsequent call fail with a transport error
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), ChainError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ChainError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for MemoryChain {
    async fn get_task_state(&self, task_id: &str) -> Result<TaskState, ChainError> {
        self.check_reachable()?;
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| ChainError::AccountNotFound(task_id.to_string()))
    }

    async fn get_account_data(&self, account: &str) -> Result<Option<AccountData>, ChainError> {
        self.check_reachable()?;
        Ok(self.accounts.read().await.get(account).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfoResult {
    value: Option<AccountInfoValue>,
}

#[derive(Debug, Deserialize)]
struct AccountInfoValue {
    /// `[base64 data, encoding name]`
    data: (String, String),
}

/// JSON-RPC chain client.
///
/// `getTaskState [taskId]` returns a [`TaskState`]; `getAccountInfo [account,
/// {encoding}]` returns base64 account bytes, optionally snappy-compressed
/// for the transfer.
pub struct HttpChainClient {
    rpc_url: String,
    client: reqwest::Client,
    request_compressed: bool,
}

impl HttpChainClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(format!("HTTP client: {}", e)))?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            client,
            request_compressed: true,
        })
    }

    pub fn with_compressed_accounts(mut self, compressed: bool) -> Self {
        self.request_compressed = compressed;
        self
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChainError::Timeout
                } else {
                    ChainError::Transport(e.to_string())
                }
            })?
            .error_for_status()
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::Malformed(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(ChainError::Malformed(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn get_task_state(&self, task_id: &str) -> Result<TaskState, ChainError> {
        self.call::<TaskState>("getTaskState", json!([task_id]))
            .await?
            .ok_or_else(|| ChainError::AccountNotFound(task_id.to_string()))
    }

    async fn get_account_data(&self, account: &str) -> Result<Option<AccountData>, ChainError> {
        let encoding = if self.request_compressed {
            "base64+snappy"
        } else {
            "base64"
        };
        let result: Option<AccountInfoResult> = self
            .call("getAccountInfo", json!([account, { "encoding": encoding }]))
            .await?;

        let Some(value) = result.and_then(|r| r.value) else {
            debug!(account, "Account not found on chain");
            return Ok(None);
        };

        let (data, returned_encoding) = value.data;
        let bytes = STANDARD
            .decode(data.as_bytes())
            .map_err(|e| ChainError::Malformed(format!("base64: {}", e)))?;

        let encoding = match returned_encoding.as_str() {
            "base64" => AccountEncoding::Raw,
            "base64+snappy" => AccountEncoding::Snappy,
            other => {
                return Err(ChainError::Malformed(format!(
                    "unsupported account encoding {}",
                    other
                )))
            }
        };
        Ok(Some(AccountData {
            data: bytes,
            encoding,
        }))
    }
}
