//! Pool lifecycle error types.

use thiserror::Error;

/// Errors that can occur while managing pools.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool creation failed for {pool_id}: {reason}")]
    Creation { pool_id: String, reason: String },

    #[error("pool not found: {0}")]
    NotFound(String),

    #[error("node {node_id} not found in pool {pool_id}")]
    NodeNotFound { pool_id: String, node_id: String },

    /// The backend gave up allocating the pool's nodes.
    #[error("allocation failed for pool {pool_id}: {reason}")]
    AllocationFailed { pool_id: String, reason: String },

    #[error("invalid capacity for pool {pool_id}: {requested} dedicated nodes (allowed 0..={ceiling})")]
    InvalidCapacity {
        pool_id: String,
        requested: i64,
        ceiling: u32,
    },

    #[error("backend error: {0}")]
    Backend(#[from] rendergrid_state::StateError),
}

pub type PoolResult<T> = Result<T, PoolError>;
