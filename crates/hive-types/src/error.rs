use thiserror::Error;

#[derive(Error, Debug)]
pub enum HiveError {
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Payload mismatch: {field} expected {expected}, got {actual}")]
    PayloadMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for HiveError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HiveError>;
