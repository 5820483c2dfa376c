//! Work coordination for a round: claiming units, recording pull requests,
//! auditing submissions and splitting the bounty.

pub mod assignment;
pub mod audit;
pub mod error;
pub mod rewards;
pub mod round_cache;

pub use assignment::{AssignmentConfig, AssignmentStore};
pub use audit::{
    AbstentionPolicy, AuditConfig, AuditGate, AuditOutcome, CheckSubmission, CheckVerdict,
    HttpSubmissionChecker, SubmissionChecker, DEFAULT_SENTINELS,
};
pub use error::{Result, WorkError};
pub use rewards::{RewardAllocator, RewardConfig, RoundVotes};
pub use round_cache::{ProcessedRounds, RoundCacheConfig};
