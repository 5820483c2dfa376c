//! Vote tally and equal-split reward allocation

use crate::audit::{AbstentionPolicy, AuditOutcome};
use hive_types::PublicKey;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Per-submitter vote balance for one round
#[derive(Debug, Clone)]
pub struct RoundVotes {
    round: u64,
    policy: AbstentionPolicy,
    tallies: BTreeMap<PublicKey, i64>,
    skip_voting: bool,
}

impl RoundVotes {
    pub fn new(round: u64, policy: AbstentionPolicy) -> Self {
        Self {
            round,
            policy,
            tallies: BTreeMap::new(),
            skip_voting: false,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    /// Pass counts +1, fail -1. Indeterminate follows the abstention policy.
    pub fn record(&mut self, submitter: PublicKey, outcome: &AuditOutcome) {
        let tally = self.tallies.entry(submitter).or_insert(0);
        match outcome {
            AuditOutcome::Pass => *tally += 1,
            AuditOutcome::Fail(_) => *tally -= 1,
            AuditOutcome::Indeterminate(_) => match self.policy {
                AbstentionPolicy::CountAsPass => *tally += 1,
                AbstentionPolicy::Abstain => {
                    debug!(round = self.round, submitter = %submitter.short(), "Abstaining on round");
                    self.skip_voting = true;
                }
            },
        }
    }

    pub fn tally(&self, submitter: &PublicKey) -> i64 {
        self.tallies.get(submitter).copied().unwrap_or(0)
    }

    pub fn tallies(&self) -> &BTreeMap<PublicKey, i64> {
        &self.tallies
    }

    /// Set when an audit could not reach a collaborator under [`AbstentionPolicy::Abstain`]
    pub fn skip_voting(&self) -> bool {
        self.skip_voting
    }

    /// Submitters whose audits came out positive
    pub fn passed(&self) -> Vec<PublicKey> {
        self.tallies
            .iter()
            .filter(|(_, votes)| **votes > 0)
            .map(|(key, _)| *key)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RewardConfig {
    /// Amount split across eligible submitters each round
    pub round_bounty: u64,
}

pub struct RewardAllocator {
    config: RewardConfig,
}

impl RewardAllocator {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    /// Equal split of the bounty over submitters with a positive tally.
    ///
    /// Every candidate appears in the result; ineligible ones get 0. The
    /// remainder of the integer division is not distributed.
    pub fn allocate(&self, tallies: &BTreeMap<PublicKey, i64>) -> BTreeMap<PublicKey, u64> {
        let eligible = tallies.values().filter(|votes| **votes > 0).count() as u64;
        let share = if eligible == 0 {
            0
        } else {
            self.config.round_bounty / eligible
        };

        let payout: BTreeMap<PublicKey, u64> = tallies
            .iter()
            .map(|(key, votes)| (*key, if *votes > 0 { share } else { 0 }))
            .collect();

        info!(
            bounty = self.config.round_bounty,
            candidates = tallies.len(),
            eligible,
            share,
            undistributed = self.config.round_bounty - share * eligible,
            "💰 Round rewards allocated"
        );
        payout
    }

    pub fn allocate_votes(&self, votes: &RoundVotes) -> BTreeMap<PublicKey, u64> {
        self.allocate(votes.tallies())
    }
}
