//! Distribution list resolution
//!
//! Leader-side cross-check of a round's payout: pick the authoritative
//! distribution submitter, decode its posted list out of account state, and
//! filter the list down to submitters with a verifiable work product.

use crate::chain::{ChainClient, DistributionSubmission, TaskState};
use crate::decoder::decode_distribution;
use crate::error::{ChainError, ResolveError};
use futures_util::future::join_all;
use hive_crypto::SignedPayload;
use hive_storage::ContentStore;
use hive_types::{AuditSubmission, DistributionMap, PublicKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Which distribution submitter is authoritative for a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaderRule {
    /// Lexicographically smallest submitter id
    #[default]
    LowestKey,
    /// First entry in the order the chain returned
    FirstListed,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub task_id: String,
    pub leader_rule: LeaderRule,
    /// Bound on each chain or blob store call
    pub fetch_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            task_id: String::new(),
            leader_rule: LeaderRule::default(),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Verified submissions that survived the eligibility filter
pub type EligibleSubmissions = BTreeMap<PublicKey, AuditSubmission>;

pub fn select_leader(
    submissions: &[DistributionSubmission],
    rule: LeaderRule,
) -> Option<&DistributionSubmission> {
    match rule {
        LeaderRule::FirstListed => submissions.first(),
        LeaderRule::LowestKey => submissions.iter().min_by(|a, b| a.submitter.cmp(&b.submitter)),
    }
}

pub struct DistributionResolver {
    config: ResolverConfig,
    chain: Arc<dyn ChainClient>,
    content: Arc<dyn ContentStore>,
}

impl DistributionResolver {
    pub fn new(
        config: ResolverConfig,
        chain: Arc<dyn ChainClient>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            config,
            chain,
            content,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    async fn task_state(&self) -> Result<TaskState, ResolveError> {
        tokio::time::timeout(
            self.config.fetch_timeout,
            self.chain.get_task_state(&self.config.task_id),
        )
        .await
        .map_err(|_| ResolveError::Transport("task state fetch timed out".to_string()))?
        .map_err(ResolveError::from)
    }

    /// Recover the leader's raw distribution list for `round`.
    ///
    /// `Ok(None)` means the list could not be decoded; transport problems are
    /// errors so the caller can skip the round instead of voting on nothing.
    pub async fn fetch_distribution_list(
        &self,
        round: u64,
    ) -> Result<Option<DistributionMap>, ResolveError> {
        let state = self.task_state().await?;
        self.distribution_list_from(&state, round).await
    }

    async fn distribution_list_from(
        &self,
        state: &TaskState,
        round: u64,
    ) -> Result<Option<DistributionMap>, ResolveError> {
        let task_id = self.config.task_id.as_str();
        let submissions = state
            .distribution_rewards_submission
            .get(&round)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let leader = select_leader(submissions, self.config.leader_rule)
            .ok_or(ResolveError::NoLeader(round))?;
        debug!(task_id, round, leader = %leader.submitter, "Selected distribution leader");

        let account = tokio::time::timeout(
            self.config.fetch_timeout,
            self.chain.get_account_data(&leader.submitter),
        )
        .await
        .map_err(|_| ResolveError::Transport("account fetch timed out".to_string()))?;

        let account = match account {
            Ok(Some(account)) => account,
            Ok(None) | Err(ChainError::AccountNotFound(_)) => {
                warn!(task_id, round, leader = %leader.submitter, "Leader account missing");
                return Ok(None);
            }
            Err(ChainError::Malformed(e)) => {
                warn!(task_id, round, leader = %leader.submitter, error = %e, "Leader account undecodable");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let stored = match account.into_stored_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(task_id, round, error = %e, "Leader account transport encoding invalid");
                return Ok(None);
            }
        };

        let Some(list) = decode_distribution(&stored, round, task_id) else {
            return Ok(None);
        };

        match serde_json::from_str::<DistributionMap>(&list) {
            Ok(map) => Ok(Some(map)),
            Err(e) => {
                warn!(task_id, round, error = %e, "Distribution list is not a key to amount map");
                Ok(None)
            }
        }
    }

    /// Keep entries with a positive amount and a verified, real work product.
    ///
    /// Blob fetches run concurrently. Any transport failure fails the whole
    /// filter with [`ResolveError::Transport`].
    pub async fn filter_eligible(
        &self,
        state: &TaskState,
        round: u64,
        distribution: &DistributionMap,
    ) -> Result<EligibleSubmissions, ResolveError> {
        let checks = distribution
            .iter()
            .filter(|(key, amount)| {
                if **amount <= 0 {
                    debug!(round, submitter = %key, amount = **amount, "Dropping non-positive amount");
                    return false;
                }
                true
            })
            .filter_map(|(key, _)| match PublicKey::from_base58(key) {
                Ok(pk) => Some(pk),
                Err(_) => {
                    warn!(round, submitter = %key, "Dropping unparseable staking key");
                    None
                }
            })
            .map(|staking_key| self.verify_entry(state, round, staking_key));

        let mut eligible = EligibleSubmissions::new();
        for result in join_all(checks).await {
            if let Some((key, submission)) = result? {
                eligible.insert(key, submission);
            }
        }

        info!(
            task_id = %self.config.task_id,
            round,
            candidates = distribution.len(),
            eligible = eligible.len(),
            "Eligibility filter applied"
        );
        Ok(eligible)
    }

    async fn verify_entry(
        &self,
        state: &TaskState,
        round: u64,
        staking_key: PublicKey,
    ) -> Result<Option<(PublicKey, AuditSubmission)>, ResolveError> {
        let key = staking_key.to_base58();
        let Some(entry) = state.submission(round, &key) else {
            debug!(round, submitter = %staking_key.short(), "No submission recorded");
            return Ok(None);
        };

        let blob = tokio::time::timeout(
            self.config.fetch_timeout,
            self.content.get(&entry.submission_value),
        )
        .await
        .map_err(|_| ResolveError::Transport("blob fetch timed out".to_string()))?
        .map_err(|e| ResolveError::Transport(e.to_string()))?;

        let Some(blob) = blob else {
            debug!(round, submitter = %staking_key.short(), "Submission blob missing");
            return Ok(None);
        };

        let submission = match SignedPayload::from_slice(&blob)
            .and_then(|signed| signed.open_submission(&staking_key))
        {
            Ok(submission) => submission,
            Err(e) => {
                warn!(round, submitter = %staking_key.short(), error = %e, "Submission failed verification");
                return Ok(None);
            }
        };

        if submission.staking_key != staking_key || !submission.has_work_product() {
            debug!(round, submitter = %staking_key.short(), "Submission has no work product");
            return Ok(None);
        }

        Ok(Some((staking_key, submission)))
    }

    /// Decode the round's distribution list and filter it
    pub async fn resolve(&self, round: u64) -> Result<EligibleSubmissions, ResolveError> {
        let state = self.task_state().await?;
        let distribution = self
            .distribution_list_from(&state, round)
            .await?
            .ok_or_else(|| ResolveError::NoData {
                task_id: self.config.task_id.clone(),
                round,
            })?;
        self.filter_eligible(&state, round, &distribution).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitter(id: &str) -> DistributionSubmission {
        DistributionSubmission {
            submitter: id.to_string(),
            submission_value: id.to_string(),
            slot: 0,
        }
    }

    #[test]
    fn test_leader_rules() {
        let list = vec![submitter("mike"), submitter("alpha"), submitter("zulu")];
        assert_eq!(
            select_leader(&list, LeaderRule::LowestKey).unwrap().submitter,
            "alpha"
        );
        assert_eq!(
            select_leader(&list, LeaderRule::FirstListed).unwrap().submitter,
            "mike"
        );
        assert!(select_leader(&[], LeaderRule::LowestKey).is_none());
    }
}
