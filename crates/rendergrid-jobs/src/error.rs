//! Job orchestration error types.

use thiserror::Error;

use rendergrid_pools::PoolError;
use rendergrid_state::StateError;

/// Errors that can occur while orchestrating jobs and tasks.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job creation failed for {job_id}: {reason}")]
    Creation { job_id: String, reason: String },

    #[error("task creation failed for job {job_id}: {reason}")]
    TaskCreation { job_id: String, reason: String },

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("backend error: {0}")]
    Backend(#[from] StateError),
}

pub type JobResult<T> = Result<T, JobError>;
