use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Unexpected end of data reading {field}: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        field: String,
        needed: usize,
        offset: usize,
        available: usize,
    },

    #[error("Invalid UTF-8 in {0}")]
    Utf8(String),

    #[error("Leaf value is not valid JSON: {0}")]
    LeafJson(String),

    #[error("Trailing bytes after record: {0}")]
    TrailingBytes(usize),

    #[error("Legacy JSON layout not recognised: {0}")]
    Legacy(String),
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Chain transport error: {0}")]
    Transport(String),

    #[error("Chain request timed out")]
    Timeout,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Malformed chain response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ResolveError {
    /// A collaborator could not be reached; the round's vote should be skipped
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("No distribution submission for round {0}")]
    NoLeader(u64),

    #[error("No distribution data for round {round} of task {task_id}")]
    NoData { task_id: String, round: u64 },

    /// The chain answered, but not with usable task state
    #[error("Chain data unusable: {0}")]
    Chain(String),
}

impl From<ChainError> for ResolveError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Transport(_) | ChainError::Timeout => ResolveError::Transport(e.to_string()),
            ChainError::AccountNotFound(_) | ChainError::Malformed(_) => {
                ResolveError::Chain(e.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
