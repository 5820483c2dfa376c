use hive_crypto::CodecError;
use hive_storage::StorageError;
use hive_types::HiveError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkError>;

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Collaborator unavailable: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<CodecError> for WorkError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Payload(msg) => WorkError::MalformedRequest(msg),
            other => WorkError::AuthenticationFailure(other.to_string()),
        }
    }
}

impl From<HiveError> for WorkError {
    fn from(e: HiveError) -> Self {
        match e {
            HiveError::PayloadMismatch { .. } | HiveError::InvalidKey(_) => {
                WorkError::AuthenticationFailure(e.to_string())
            }
            other => WorkError::MalformedRequest(other.to_string()),
        }
    }
}
