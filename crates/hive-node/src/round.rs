//! Round-level operations run by the node operator: auditing the round's
//! submissions and settling its payout.

use crate::collaborators;
use crate::config::NodeConfig;
use anyhow::{Context, Result};
use hive_distribution::{ChainClient, ChainError, DistributionResolver, ResolveError, TaskState};
use hive_storage::ContentStore;
use hive_types::PublicKey;
use hive_work::{AuditGate, RewardAllocator, RoundVotes, SubmissionChecker};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub type Payout = BTreeMap<PublicKey, u64>;

pub struct RoundRunner {
    task_id: String,
    timeout: Duration,
    chain: Arc<dyn ChainClient>,
    gate: AuditGate,
    resolver: DistributionResolver,
    allocator: RewardAllocator,
}

impl RoundRunner {
    pub fn new(
        config: &NodeConfig,
        chain: Arc<dyn ChainClient>,
        content: Arc<dyn ContentStore>,
        checker: Arc<dyn SubmissionChecker>,
    ) -> Self {
        Self {
            task_id: config.task.task_id.clone(),
            timeout: config.collaborator_timeout(),
            gate: AuditGate::new(config.audit_config(), content.clone(), checker),
            resolver: DistributionResolver::new(config.resolver_config(), chain.clone(), content),
            allocator: RewardAllocator::new(config.reward_config()),
            chain,
        }
    }

    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        Ok(Self::new(
            config,
            collaborators::chain_client(config)?,
            collaborators::content_store(config)?,
            collaborators::submission_checker(config)?,
        ))
    }

    /// Task state from the chain; `Ok(None)` when the chain cannot be reached
    async fn task_state(&self) -> Result<Option<TaskState>> {
        match tokio::time::timeout(self.timeout, self.chain.get_task_state(&self.task_id)).await {
            Ok(Ok(state)) => Ok(Some(state)),
            Ok(Err(e @ (ChainError::Transport(_) | ChainError::Timeout))) => {
                warn!(task_id = %self.task_id, error = %e, "Task state unreachable");
                Ok(None)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(task_id = %self.task_id, "Task state fetch timed out");
                Ok(None)
            }
        }
    }

    async fn audit_state(&self, state: &TaskState, round: u64) -> RoundVotes {
        let submissions: Vec<(PublicKey, String)> = state
            .submissions
            .get(&round)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(key, entry)| match PublicKey::from_base58(key) {
                        Ok(pk) => Some((pk, entry.submission_value.clone())),
                        Err(_) => {
                            warn!(round, submitter = %key, "Skipping submission with invalid key");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.gate.audit_round(round, &submissions).await
    }

    /// Audit every submission recorded on chain for `round`
    pub async fn audit(&self, round: u64) -> Result<RoundVotes> {
        let state = self
            .task_state()
            .await?
            .context("task state unreachable")?;
        Ok(self.audit_state(&state, round).await)
    }

    /// Audit the round, cross-check the leader's distribution list and split the bounty.
    ///
    /// `Ok(None)` means this node abstains from the round: the chain, an audit
    /// collaborator or the distribution fetch could not be reached.
    pub async fn settle(&self, round: u64) -> Result<Option<Payout>> {
        let Some(state) = self.task_state().await? else {
            warn!(round, "Skipping round: task state unreachable");
            return Ok(None);
        };

        let votes = self.audit_state(&state, round).await;
        if votes.skip_voting() {
            warn!(round, "Skipping round: audits were indeterminate");
            return Ok(None);
        }

        let eligible = match self.resolver.resolve(round).await {
            Ok(eligible) => eligible,
            Err(ResolveError::Transport(e)) => {
                warn!(round, error = %e, "Skipping round: distribution list unreachable");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let tallies: BTreeMap<PublicKey, i64> = votes
            .tallies()
            .keys()
            .chain(eligible.keys())
            .map(|key| {
                let tally = if eligible.contains_key(key) {
                    votes.tally(key)
                } else {
                    0
                };
                (*key, tally)
            })
            .collect();

        let payout = self.allocator.allocate(&tallies);
        info!(
            round,
            recipients = payout.values().filter(|amount| **amount > 0).count(),
            "Round settled"
        );
        Ok(Some(payout))
    }
}
