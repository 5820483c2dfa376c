//! Signed round payloads
//!
//! One explicit payload type per action. Payloads are decoded from the bytes
//! recovered out of a signature, so unknown and missing fields are rejected at
//! the boundary instead of being checked one by one by each handler.

use crate::error::{HiveError, Result};
use crate::keys::PublicKey;
use crate::work::WorkKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved `prUrl` value for a submission that carries no work product.
pub const NO_PR_URL: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    FetchTodo,
    FetchIssue,
    AddTodoPr,
    AddIssuePr,
    CreateRepo,
    Audit,
    UpdateAuditResult,
    Check,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::FetchTodo => "fetch-todo",
            Action::FetchIssue => "fetch-issue",
            Action::AddTodoPr => "add-todo-pr",
            Action::AddIssuePr => "add-issue-pr",
            Action::CreateRepo => "create-repo",
            Action::Audit => "audit",
            Action::UpdateAuditResult => "update-audit-result",
            Action::Check => "check",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request for a unit of work (`fetch-todo` / `fetch-issue`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkRequest {
    pub task_id: String,
    pub round_number: u64,
    pub github_username: String,
    pub staking_key: PublicKey,
    pub pub_key: PublicKey,
}

/// Pull-request URL recorded against a todo assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TodoPr {
    pub task_id: String,
    pub round_number: u64,
    pub pr_url: String,
    pub staking_key: PublicKey,
    pub pub_key: PublicKey,
}

/// Pull-request URL recorded against an issue assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IssuePr {
    pub task_id: String,
    pub round_number: u64,
    pub pr_url: String,
    pub issue_uuid: String,
    pub staking_key: PublicKey,
    pub pub_key: PublicKey,
}

/// Aggregator repository created for an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepoCreation {
    pub task_id: String,
    pub round_number: u64,
    pub issue_uuid: String,
    pub aggregator_url: String,
    pub staking_key: PublicKey,
    pub pub_key: PublicKey,
}

/// Proof of work posted to the blob store and audited by peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuditSubmission {
    pub task_id: String,
    pub round_number: u64,
    pub pr_url: String,
    pub github_username: String,
    pub staking_key: PublicKey,
    pub pub_key: PublicKey,
}

impl AuditSubmission {
    /// Whether the submission declares an actual work product.
    pub fn has_work_product(&self) -> bool {
        !self.pr_url.is_empty() && self.pr_url != NO_PR_URL
    }
}

/// Audit verdicts for one round, posted by the auditing node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuditResult {
    pub task_id: String,
    pub round_number: u64,
    pub work_kind: WorkKind,
    pub passed: Vec<PublicKey>,
    pub staking_key: PublicKey,
    pub pub_key: PublicKey,
}

/// Assignment existence query issued by the audit collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckRequest {
    pub task_id: String,
    pub round_number: u64,
    pub github_username: String,
    pub pr_url: String,
    pub staking_key: PublicKey,
    pub pub_key: PublicKey,
}

/// A round-scoped payload, tagged by `action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum RoundPayload {
    #[serde(rename = "fetch-todo")]
    FetchTodo(WorkRequest),
    #[serde(rename = "fetch-issue")]
    FetchIssue(WorkRequest),
    #[serde(rename = "add-todo-pr")]
    AddTodoPr(TodoPr),
    #[serde(rename = "add-issue-pr")]
    AddIssuePr(IssuePr),
    #[serde(rename = "create-repo")]
    CreateRepo(RepoCreation),
    #[serde(rename = "audit")]
    Audit(AuditSubmission),
    #[serde(rename = "update-audit-result")]
    UpdateAuditResult(AuditResult),
    #[serde(rename = "check")]
    Check(CheckRequest),
}

impl RoundPayload {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| HiveError::MalformedPayload(e.to_string()))
    }

    pub fn action(&self) -> Action {
        match self {
            RoundPayload::FetchTodo(_) => Action::FetchTodo,
            RoundPayload::FetchIssue(_) => Action::FetchIssue,
            RoundPayload::AddTodoPr(_) => Action::AddTodoPr,
            RoundPayload::AddIssuePr(_) => Action::AddIssuePr,
            RoundPayload::CreateRepo(_) => Action::CreateRepo,
            RoundPayload::Audit(_) => Action::Audit,
            RoundPayload::UpdateAuditResult(_) => Action::UpdateAuditResult,
            RoundPayload::Check(_) => Action::Check,
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            RoundPayload::FetchTodo(p) | RoundPayload::FetchIssue(p) => &p.task_id,
            RoundPayload::AddTodoPr(p) => &p.task_id,
            RoundPayload::AddIssuePr(p) => &p.task_id,
            RoundPayload::CreateRepo(p) => &p.task_id,
            RoundPayload::Audit(p) => &p.task_id,
            RoundPayload::UpdateAuditResult(p) => &p.task_id,
            RoundPayload::Check(p) => &p.task_id,
        }
    }

    pub fn round_number(&self) -> u64 {
        match self {
            RoundPayload::FetchTodo(p) | RoundPayload::FetchIssue(p) => p.round_number,
            RoundPayload::AddTodoPr(p) => p.round_number,
            RoundPayload::AddIssuePr(p) => p.round_number,
            RoundPayload::CreateRepo(p) => p.round_number,
            RoundPayload::Audit(p) => p.round_number,
            RoundPayload::UpdateAuditResult(p) => p.round_number,
            RoundPayload::Check(p) => p.round_number,
        }
    }

    pub fn staking_key(&self) -> &PublicKey {
        match self {
            RoundPayload::FetchTodo(p) | RoundPayload::FetchIssue(p) => &p.staking_key,
            RoundPayload::AddTodoPr(p) => &p.staking_key,
            RoundPayload::AddIssuePr(p) => &p.staking_key,
            RoundPayload::CreateRepo(p) => &p.staking_key,
            RoundPayload::Audit(p) => &p.staking_key,
            RoundPayload::UpdateAuditResult(p) => &p.staking_key,
            RoundPayload::Check(p) => &p.staking_key,
        }
    }

    pub fn pub_key(&self) -> &PublicKey {
        match self {
            RoundPayload::FetchTodo(p) | RoundPayload::FetchIssue(p) => &p.pub_key,
            RoundPayload::AddTodoPr(p) => &p.pub_key,
            RoundPayload::AddIssuePr(p) => &p.pub_key,
            RoundPayload::CreateRepo(p) => &p.pub_key,
            RoundPayload::Audit(p) => &p.pub_key,
            RoundPayload::UpdateAuditResult(p) => &p.pub_key,
            RoundPayload::Check(p) => &p.pub_key,
        }
    }

    /// Check the action and the process-wide task id.
    pub fn ensure(&self, expected: Action, task_id: &str) -> Result<()> {
        if self.action() != expected {
            return Err(HiveError::PayloadMismatch {
                field: "action",
                expected: expected.to_string(),
                actual: self.action().to_string(),
            });
        }
        if self.task_id() != task_id {
            return Err(HiveError::PayloadMismatch {
                field: "taskId",
                expected: task_id.to_string(),
                actual: self.task_id().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(b: u8) -> PublicKey {
        PublicKey::from_bytes([b; 32])
    }

    #[test]
    fn test_tagged_round_trip() {
        let payload = RoundPayload::FetchTodo(WorkRequest {
            task_id: "task-1".to_string(),
            round_number: 12,
            github_username: "octo".to_string(),
            staking_key: key(1),
            pub_key: key(2),
        });
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["action"], "fetch-todo");
        assert_eq!(value["roundNumber"], 12);
        assert_eq!(value["githubUsername"], "octo");

        let back: RoundPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let value = json!({
            "action": "add-todo-pr",
            "taskId": "task-1",
            "roundNumber": 1,
            "prUrl": "https://github.com/o/r/pull/1",
            "stakingKey": key(1).to_base58(),
            "pubKey": key(2).to_base58(),
            "bonus": true,
        });
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(RoundPayload::from_slice(&bytes).is_err());
    }

    #[test]
    fn test_missing_field_rejected() {
        let value = json!({
            "action": "add-issue-pr",
            "taskId": "task-1",
            "roundNumber": 1,
            "prUrl": "https://github.com/o/r/pull/1",
            "stakingKey": key(1).to_base58(),
            "pubKey": key(2).to_base58(),
        });
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(RoundPayload::from_slice(&bytes).is_err());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let value = json!({ "action": "withdraw", "taskId": "task-1", "roundNumber": 1 });
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(RoundPayload::from_slice(&bytes).is_err());
    }

    #[test]
    fn test_ensure_checks_action_and_task() {
        let payload = RoundPayload::AddTodoPr(TodoPr {
            task_id: "task-1".to_string(),
            round_number: 3,
            pr_url: "https://github.com/o/r/pull/9".to_string(),
            staking_key: key(1),
            pub_key: key(2),
        });
        assert!(payload.ensure(Action::AddTodoPr, "task-1").is_ok());
        assert!(matches!(
            payload.ensure(Action::FetchTodo, "task-1"),
            Err(HiveError::PayloadMismatch { field: "action", .. })
        ));
        assert!(matches!(
            payload.ensure(Action::AddTodoPr, "task-2"),
            Err(HiveError::PayloadMismatch { field: "taskId", .. })
        ));
    }

    #[test]
    fn test_work_product_sentinel() {
        let mut submission = AuditSubmission {
            task_id: "task-1".to_string(),
            round_number: 3,
            pr_url: NO_PR_URL.to_string(),
            github_username: "octo".to_string(),
            staking_key: key(1),
            pub_key: key(2),
        };
        assert!(!submission.has_work_product());
        submission.pr_url = "https://github.com/o/r/pull/2".to_string();
        assert!(submission.has_work_product());
    }
}
