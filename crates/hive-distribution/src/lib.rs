//! Recovery of a round's distribution list from on-chain account state, and
//! the eligibility filter applied to it before rewards are allocated.

pub mod chain;
pub mod decoder;
pub mod error;
pub mod resolver;

pub use chain::{
    AccountData, AccountEncoding, ChainClient, DistributionSubmission, HttpChainClient,
    MemoryChain, SubmissionEntry, TaskState,
};
pub use decoder::{decode_distribution, decode_state, encode_state, AccountState};
pub use error::{ChainError, DecodeError, ResolveError};
pub use resolver::{
    select_leader, DistributionResolver, EligibleSubmissions, LeaderRule, ResolverConfig,
};
