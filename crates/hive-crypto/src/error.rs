use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<hive_types::canonical_json::CanonicalJsonError> for CodecError {
    fn from(e: hive_types::canonical_json::CanonicalJsonError) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
