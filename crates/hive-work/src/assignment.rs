//! Round assignment state machine
//!
//! Every mutation goes through one [`WorkStore::find_one_and_update`] call
//! whose filter restates the precondition, so a stale read can never
//! double-assign the last slot or overwrite a recorded submission.

use crate::error::{Result, WorkError};
use hive_storage::WorkStore;
use hive_types::{
    Assignment, PublicKey, WorkKind, WorkStatus, WorkUnit, DEFAULT_MAX_ASSIGNEES,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AssignmentConfig {
    /// Process-wide task id every assignment is scoped to
    pub task_id: String,
    /// Concurrent assignments a unit admits
    pub max_assignees: usize,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            task_id: String::new(),
            max_assignees: DEFAULT_MAX_ASSIGNEES,
        }
    }
}

pub struct AssignmentStore {
    store: Arc<dyn WorkStore>,
    config: AssignmentConfig,
}

fn has_round_claim(unit: &WorkUnit, staking_key: &PublicKey, round: u64) -> bool {
    unit.assigned_to
        .iter()
        .any(|a| a.staking_key == *staking_key && a.round_number == round)
}

impl AssignmentStore {
    pub fn new(store: Arc<dyn WorkStore>, config: AssignmentConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AssignmentConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn WorkStore> {
        &self.store
    }

    fn push_assignment(&self, unit: &mut WorkUnit, assignment: &Assignment) {
        unit.assigned_to.push(assignment.clone());
        if unit.status == WorkStatus::Initialized {
            unit.status = WorkStatus::InProgress;
        }
    }

    /// Claim a specific unit for `staking_key` in `round`.
    ///
    /// Succeeds only while the unit is below the cap and holds no assignment
    /// for the same `(staking_key, round)`.
    pub async fn try_assign(
        &self,
        kind: WorkKind,
        unit_id: &str,
        staking_key: &PublicKey,
        round: u64,
        github_username: &str,
    ) -> Result<Assignment> {
        let cap = self.config.max_assignees;
        let assignment = Assignment::new(*staking_key, &self.config.task_id, round, github_username);

        let updated = self
            .store
            .find_one_and_update(
                kind,
                &|u| {
                    u.id == unit_id
                        && u.status != WorkStatus::Approved
                        && u.assigned_to.len() < cap
                        && !has_round_claim(u, staking_key, round)
                },
                &|u| self.push_assignment(u, &assignment),
            )
            .await?;

        if updated.is_some() {
            info!(
                kind = %kind,
                unit = unit_id,
                worker = %staking_key.short(),
                round,
                "📌 Work assigned"
            );
            return Ok(assignment);
        }

        let unit = self
            .store
            .get_unit(kind, unit_id)
            .await?
            .ok_or_else(|| WorkError::NotFound(format!("{} {}", kind, unit_id)))?;

        let reason = if unit.status == WorkStatus::Approved {
            "unit already approved"
        } else if has_round_claim(&unit, staking_key, round) {
            "already assigned for this round"
        } else {
            "assignment cap reached"
        };
        debug!(unit = unit_id, worker = %staking_key.short(), round, reason, "Assignment refused");
        Err(WorkError::StateConflict(reason.to_string()))
    }

    /// The unit `staking_key` currently holds an open assignment on
    pub async fn query(&self, kind: WorkKind, staking_key: &PublicKey) -> Result<Option<WorkUnit>> {
        let task_id = self.config.task_id.as_str();
        Ok(self
            .store
            .find_unit(kind, &|u| {
                u.pending_assignment(staking_key)
                    .is_some_and(|a| a.task_id == task_id)
            })
            .await?)
    }

    /// The unit carrying `staking_key`'s assignment for exactly `round`, submitted or not
    pub async fn held_in_round(
        &self,
        kind: WorkKind,
        staking_key: &PublicKey,
        round: u64,
    ) -> Result<Option<WorkUnit>> {
        let task_id = self.config.task_id.as_str();
        Ok(self
            .store
            .find_unit(kind, &|u| u.assignment(task_id, staking_key, round).is_some())
            .await?)
    }

    /// Hand `staking_key` a unit for `round`.
    ///
    /// Repeated calls within a round return the unit already held. Otherwise
    /// the first open unit the worker has never held is claimed. `Ok(None)`
    /// when nothing is available.
    pub async fn claim_next(
        &self,
        kind: WorkKind,
        staking_key: &PublicKey,
        round: u64,
        github_username: &str,
    ) -> Result<Option<WorkUnit>> {
        if let Some(unit) = self.held_in_round(kind, staking_key, round).await? {
            debug!(unit = %unit.id, worker = %staking_key.short(), round, "Returning existing assignment");
            return Ok(Some(unit));
        }

        let cap = self.config.max_assignees;
        let assignment = Assignment::new(*staking_key, &self.config.task_id, round, github_username);

        let claimed = self
            .store
            .find_one_and_update(
                kind,
                &|u| {
                    u.status != WorkStatus::Approved
                        && u.assigned_to.len() < cap
                        && !u.is_assigned_to(staking_key)
                        && !has_round_claim(u, staking_key, round)
                },
                &|u| self.push_assignment(u, &assignment),
            )
            .await?;

        match &claimed {
            Some(unit) => info!(
                kind = %kind,
                unit = %unit.id,
                worker = %staking_key.short(),
                round,
                phase = ?unit.phase(cap),
                "📌 Work assigned"
            ),
            None => debug!(kind = %kind, worker = %staking_key.short(), round, "No work available"),
        }
        Ok(claimed)
    }

    /// Record a pull request against the `(task, staking_key, round)` assignment.
    ///
    /// `unit_id` narrows the match to one unit when the caller names it.
    /// Nothing is written when no open assignment matches.
    pub async fn record_submission(
        &self,
        kind: WorkKind,
        unit_id: Option<&str>,
        staking_key: &PublicKey,
        round: u64,
        pr_url: &str,
        signature: &str,
    ) -> Result<WorkUnit> {
        let task_id = self.config.task_id.as_str();
        let id_matches = |u: &WorkUnit| unit_id.map_or(true, |id| u.id == id);

        let updated = self
            .store
            .find_one_and_update(
                kind,
                &|u| {
                    id_matches(u)
                        && u.assignment(task_id, staking_key, round)
                            .is_some_and(|a| !a.is_submitted())
                },
                &|u| {
                    if let Some(a) = u.assignment_mut(task_id, staking_key, round) {
                        a.pr_url = Some(pr_url.to_string());
                        a.pr_signature = Some(signature.to_string());
                    }
                    if u.status != WorkStatus::Approved {
                        u.status = WorkStatus::InReview;
                    }
                },
            )
            .await?;

        if let Some(unit) = updated {
            info!(
                kind = %kind,
                unit = %unit.id,
                worker = %staking_key.short(),
                round,
                pr_url,
                phase = ?unit.phase(self.config.max_assignees),
                "📝 Submission recorded"
            );
            return Ok(unit);
        }

        let already = self
            .store
            .find_unit(kind, &|u| {
                id_matches(u) && u.assignment(task_id, staking_key, round).is_some()
            })
            .await?;

        if already.is_some() {
            warn!(worker = %staking_key.short(), round, "Submission already recorded");
            return Err(WorkError::StateConflict(
                "submission already recorded for this round".to_string(),
            ));
        }
        warn!(worker = %staking_key.short(), round, "No matching assignment for submission");
        Err(WorkError::NotFound(format!(
            "no {} assignment for round {}",
            kind, round
        )))
    }

    /// Whether an assignment with this exact pull request exists
    pub async fn check(
        &self,
        kind: WorkKind,
        staking_key: &PublicKey,
        round: u64,
        github_username: &str,
        pr_url: &str,
    ) -> Result<Option<WorkUnit>> {
        let task_id = self.config.task_id.as_str();
        Ok(self
            .store
            .find_unit(kind, &|u| {
                u.assignment(task_id, staking_key, round).is_some_and(|a| {
                    a.github_username == github_username && a.pr_url.as_deref() == Some(pr_url)
                })
            })
            .await?)
    }

    /// Mark every in-review unit with a passing submission for `round` approved
    pub async fn approve(&self, kind: WorkKind, round: u64, passed: &[PublicKey]) -> Result<usize> {
        if passed.is_empty() {
            return Ok(0);
        }
        let task_id = self.config.task_id.as_str();
        let approved = self
            .store
            .update_many(
                kind,
                &|u| {
                    u.status == WorkStatus::InReview
                        && u.assigned_to.iter().any(|a| {
                            a.task_id == task_id
                                && a.round_number == round
                                && a.is_submitted()
                                && passed.contains(&a.staking_key)
                        })
                },
                &|u| u.status = WorkStatus::Approved,
            )
            .await?;

        info!(kind = %kind, round, passed = passed.len(), approved, "✅ Audit results applied");
        Ok(approved)
    }

    /// Record the aggregator repository for an issue, once.
    ///
    /// Only a worker assigned to the issue may set it.
    pub async fn set_aggregator(
        &self,
        issue_id: &str,
        staking_key: &PublicKey,
        aggregator_url: &str,
    ) -> Result<WorkUnit> {
        let updated = self
            .store
            .find_one_and_update(
                WorkKind::Issue,
                &|u| {
                    u.id == issue_id
                        && u.aggregator_url.is_none()
                        && u.is_assigned_to(staking_key)
                },
                &|u| u.aggregator_url = Some(aggregator_url.to_string()),
            )
            .await?;

        if let Some(unit) = updated {
            info!(issue = issue_id, aggregator_url, "Aggregator repository recorded");
            return Ok(unit);
        }

        let unit = self
            .store
            .get_unit(WorkKind::Issue, issue_id)
            .await?
            .ok_or_else(|| WorkError::NotFound(format!("issue {}", issue_id)))?;

        if unit.aggregator_url.is_some() {
            Err(WorkError::StateConflict("aggregator already set".to_string()))
        } else {
            Err(WorkError::AuthenticationFailure(
                "worker is not assigned to this issue".to_string(),
            ))
        }
    }
}
