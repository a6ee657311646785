use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The request itself cannot be served (empty query, nothing loaded).
    #[error("invalid input: {0}")]
    Input(String),

    /// The vector index could not answer a search.
    #[error("retrieval failed: {0}")]
    Retrieval(String),
}

impl Error {
    /// Returns `true` for errors caused by the caller's request rather than
    /// by the index or the environment.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
