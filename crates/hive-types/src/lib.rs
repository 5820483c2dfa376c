//! Shared types for the hive coordination protocol: node identities, the
//! signed round payloads workers exchange with the coordinator, and the work
//! unit records the assignment store owns.

pub mod canonical_json;
pub mod error;
pub mod keys;
pub mod payload;
pub mod work;

pub use error::{HiveError, Result};
pub use keys::{PublicKey, PUBLIC_KEY_LEN};
pub use payload::{
    Action, AuditResult, AuditSubmission, CheckRequest, IssuePr, RepoCreation, RoundPayload,
    TodoPr, WorkRequest, NO_PR_URL,
};
pub use work::{
    Assignment, AssignmentPhase, DistributionMap, WorkKind, WorkStatus, WorkUnit,
    DEFAULT_MAX_ASSIGNEES,
};
