//! Error types for batch backend operations.

use thiserror::Error;

/// Result type alias for backend and state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while talking to a batch backend.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The backend refused the request (quota, invalid image, name conflict).
    #[error("request rejected: {0}")]
    Rejected(String),
}
