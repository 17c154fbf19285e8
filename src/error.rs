//! Error types for Recall.
//!
//! Uses thiserror for ergonomic error definitions shared by the indexing
//! and retrieval paths. Configuration errors are fatal and never retried;
//! embedding and store errors are transient from the pipeline's point of
//! view and are handled by the caller (propagated in sync mode, logged and
//! dropped by the worker in queued mode).

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::Queue(err.to_string())
    }
}
