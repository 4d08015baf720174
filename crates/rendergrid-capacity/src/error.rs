//! Capacity planner error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("backend error while reading pools: {0}")]
    Backend(#[from] rendergrid_state::StateError),
}

pub type CapacityResult<T> = Result<T, CapacityError>;
