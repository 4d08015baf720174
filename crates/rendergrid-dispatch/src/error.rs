//! Dispatch error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The channel could not be reached (closed queue, refused connection,
    /// timeout).
    #[error("message channel unreachable: {0}")]
    Unreachable(String),

    /// The channel was reached but refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("batch encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid channel endpoint: {0}")]
    Endpoint(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
