use crate::keys::PublicKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum concurrent assignments a single work unit admits.
pub const DEFAULT_MAX_ASSIGNEES: usize = 2;

/// Raw per-round reward weights keyed by base58 staking key.
///
/// Zero means ineligible, positive is a reward share, negative is slashing intent.
pub type DistributionMap = BTreeMap<String, i64>;

/// Which collection a work unit lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Todo,
    Issue,
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkKind::Todo => f.write_str("todo"),
            WorkKind::Issue => f.write_str("issue"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkStatus {
    Initialized,
    InProgress,
    InReview,
    Approved,
}

/// Derived position of a work unit in the assignment state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentPhase {
    Unassigned,
    PartiallyAssigned,
    FullyAssigned,
    Submitted,
    Closed,
}

/// One worker's claim on a work unit for one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub staking_key: PublicKey,
    pub task_id: String,
    pub round_number: u64,
    pub github_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_signature: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

impl Assignment {
    pub fn new(
        staking_key: PublicKey,
        task_id: impl Into<String>,
        round_number: u64,
        github_username: impl Into<String>,
    ) -> Self {
        Self {
            staking_key,
            task_id: task_id.into(),
            round_number,
            github_username: github_username.into(),
            pr_url: None,
            pr_signature: None,
            assigned_at: Utc::now(),
        }
    }

    /// Whether this entry belongs to the `(taskId, stakingKey, roundNumber)` triple.
    pub fn matches(&self, task_id: &str, staking_key: &PublicKey, round_number: u64) -> bool {
        self.task_id == task_id
            && self.staking_key == *staking_key
            && self.round_number == round_number
    }

    pub fn is_submitted(&self) -> bool {
        self.pr_url.is_some()
    }
}

/// A todo or issue that workers claim and submit pull requests for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnit {
    pub id: String,
    pub kind: WorkKind,
    pub title: String,
    pub acceptance_criteria: Vec<String>,
    pub repo_owner: String,
    pub repo_name: String,
    pub status: WorkStatus,
    #[serde(default)]
    pub assigned_to: Vec<Assignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkUnit {
    pub fn new(
        id: impl Into<String>,
        kind: WorkKind,
        title: impl Into<String>,
        repo_owner: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            acceptance_criteria: Vec::new(),
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
            status: WorkStatus::Initialized,
            assigned_to: Vec::new(),
            aggregator_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn assignment(
        &self,
        task_id: &str,
        staking_key: &PublicKey,
        round_number: u64,
    ) -> Option<&Assignment> {
        self.assigned_to
            .iter()
            .find(|a| a.matches(task_id, staking_key, round_number))
    }

    pub fn assignment_mut(
        &mut self,
        task_id: &str,
        staking_key: &PublicKey,
        round_number: u64,
    ) -> Option<&mut Assignment> {
        self.assigned_to
            .iter_mut()
            .find(|a| a.matches(task_id, staking_key, round_number))
    }

    pub fn is_assigned_to(&self, staking_key: &PublicKey) -> bool {
        self.assigned_to.iter().any(|a| a.staking_key == *staking_key)
    }

    /// Latest assignment for `staking_key` that has no pull request yet.
    pub fn pending_assignment(&self, staking_key: &PublicKey) -> Option<&Assignment> {
        self.assigned_to
            .iter()
            .filter(|a| a.staking_key == *staking_key && !a.is_submitted())
            .max_by_key(|a| a.round_number)
    }

    pub fn phase(&self, max_assignees: usize) -> AssignmentPhase {
        if self.status == WorkStatus::Approved {
            return AssignmentPhase::Closed;
        }
        let count = self.assigned_to.len();
        if count == 0 {
            AssignmentPhase::Unassigned
        } else if count < max_assignees {
            AssignmentPhase::PartiallyAssigned
        } else if self.assigned_to.iter().all(Assignment::is_submitted) {
            AssignmentPhase::Submitted
        } else {
            AssignmentPhase::FullyAssigned
        }
    }
}
