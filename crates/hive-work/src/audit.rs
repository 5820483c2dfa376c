//! Submission audit
//!
//! Turns a submission reference into a [`AuditOutcome`]. Collaborator
//! failures are reported as [`AuditOutcome::Indeterminate`] and are never
//! folded into a pass.

use crate::error::WorkError;
use crate::rewards::RoundVotes;
use async_trait::async_trait;
use futures_util::future::join_all;
use hive_crypto::SignedPayload;
use hive_storage::ContentStore;
use hive_types::{AuditSubmission, PublicKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Submission references meaning "nothing was submitted this round"
pub const DEFAULT_SENTINELS: &[&str] = &["0", "none", "no-submission"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Pass,
    Fail(String),
    /// A collaborator could not be reached
    Indeterminate(String),
}

impl AuditOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, AuditOutcome::Pass)
    }
}

/// How an indeterminate audit is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbstentionPolicy {
    /// Do not vote on the round at all
    #[default]
    Abstain,
    CountAsPass,
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub task_id: String,
    pub sentinels: Vec<String>,
    /// Bound on each blob store and checker call
    pub collaborator_timeout: Duration,
    pub abstention: AbstentionPolicy,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            task_id: String::new(),
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
            collaborator_timeout: Duration::from_secs(30),
            abstention: AbstentionPolicy::default(),
        }
    }
}

/// Normalized submission handed to the domain checker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSubmission {
    pub task_id: String,
    pub round_number: u64,
    pub staking_key: PublicKey,
    pub pub_key: PublicKey,
    pub github_username: String,
    pub pr_url: String,
}

impl From<&AuditSubmission> for CheckSubmission {
    fn from(s: &AuditSubmission) -> Self {
        Self {
            task_id: s.task_id.clone(),
            round_number: s.round_number,
            staking_key: s.staking_key,
            pub_key: s.pub_key,
            github_username: s.github_username.clone(),
            pr_url: s.pr_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckVerdict {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

/// Domain verification of a work product (e.g. pull-request review)
#[async_trait]
pub trait SubmissionChecker: Send + Sync {
    async fn check(&self, submission: &CheckSubmission) -> Result<CheckVerdict, WorkError>;
}

/// Checker service reached over HTTP: `POST {url}` with a [`CheckSubmission`] body
pub struct HttpSubmissionChecker {
    url: String,
    client: reqwest::Client,
}

impl HttpSubmissionChecker {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WorkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkError::Transport(format!("HTTP client: {}", e)))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl SubmissionChecker for HttpSubmissionChecker {
    async fn check(&self, submission: &CheckSubmission) -> Result<CheckVerdict, WorkError> {
        let response = self
            .client
            .post(&self.url)
            .json(submission)
            .send()
            .await
            .map_err(|e| WorkError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| WorkError::Transport(e.to_string()))?;

        response
            .json::<CheckVerdict>()
            .await
            .map_err(|e| WorkError::Transport(format!("checker response: {}", e)))
    }
}

pub struct AuditGate {
    config: AuditConfig,
    content: Arc<dyn ContentStore>,
    checker: Arc<dyn SubmissionChecker>,
}

impl AuditGate {
    pub fn new(
        config: AuditConfig,
        content: Arc<dyn ContentStore>,
        checker: Arc<dyn SubmissionChecker>,
    ) -> Self {
        Self {
            config,
            content,
            checker,
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn is_sentinel(&self, submission_ref: &str) -> bool {
        self.config.sentinels.iter().any(|s| s == submission_ref)
    }

    /// Audit one submission reference for `round`, claimed by `submitter`
    pub async fn audit(&self, submission_ref: &str, round: u64, submitter: &PublicKey) -> AuditOutcome {
        let outcome = self.run_audit(submission_ref, round, submitter).await;
        match &outcome {
            AuditOutcome::Pass => debug!(round, submitter = %submitter.short(), "Audit passed"),
            AuditOutcome::Fail(reason) => {
                warn!(round, submitter = %submitter.short(), reason = %reason, "❌ Audit failed")
            }
            AuditOutcome::Indeterminate(reason) => {
                warn!(round, submitter = %submitter.short(), reason = %reason, "Audit indeterminate")
            }
        }
        outcome
    }

    async fn run_audit(&self, submission_ref: &str, round: u64, submitter: &PublicKey) -> AuditOutcome {
        if self.is_sentinel(submission_ref) {
            return AuditOutcome::Pass;
        }

        let timeout = self.config.collaborator_timeout;
        let blob = match tokio::time::timeout(timeout, self.content.get(submission_ref)).await {
            Err(_) => return AuditOutcome::Indeterminate("blob fetch timed out".to_string()),
            Ok(Err(e)) => return AuditOutcome::Indeterminate(format!("blob fetch: {}", e)),
            Ok(Ok(None)) => return AuditOutcome::Fail("submission blob not found".to_string()),
            Ok(Ok(Some(blob))) => blob,
        };

        let submission = match SignedPayload::from_slice(&blob)
            .and_then(|signed| signed.open_submission(submitter))
        {
            Ok(submission) => submission,
            Err(e) => return AuditOutcome::Fail(format!("signature: {}", e)),
        };

        if submission.task_id != self.config.task_id {
            return AuditOutcome::Fail(format!("task id {}", submission.task_id));
        }
        if submission.round_number != round {
            return AuditOutcome::Fail(format!(
                "round {} does not match audited round {}",
                submission.round_number, round
            ));
        }
        if submission.staking_key != *submitter {
            return AuditOutcome::Fail("staking key does not match submitter".to_string());
        }

        if !submission.has_work_product() {
            return AuditOutcome::Pass;
        }

        let request = CheckSubmission::from(&submission);
        match tokio::time::timeout(timeout, self.checker.check(&request)).await {
            Err(_) => AuditOutcome::Indeterminate("checker timed out".to_string()),
            Ok(Err(e)) => AuditOutcome::Indeterminate(e.to_string()),
            Ok(Ok(verdict)) if verdict.success => AuditOutcome::Pass,
            Ok(Ok(verdict)) => AuditOutcome::Fail(
                verdict
                    .context
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "checker rejected submission".to_string()),
            ),
        }
    }

    /// Audit every `(submitter, reference)` of a round concurrently and tally the votes
    pub async fn audit_round(&self, round: u64, submissions: &[(PublicKey, String)]) -> RoundVotes {
        let outcomes = join_all(
            submissions
                .iter()
                .map(|(submitter, cid)| self.audit(cid, round, submitter)),
        )
        .await;

        let mut votes = RoundVotes::new(round, self.config.abstention);
        for ((submitter, _), outcome) in submissions.iter().zip(outcomes.iter()) {
            votes.record(*submitter, outcome);
        }

        info!(
            task_id = %self.config.task_id,
            round,
            audited = submissions.len(),
            skip_voting = votes.skip_voting(),
            "🔍 Round audited"
        );
        votes
    }
}
