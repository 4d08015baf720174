//! The batch backend contract consumed by the controller.

use async_trait::async_trait;

use crate::error::StateResult;
use crate::types::*;

/// Pool, node, job and task operations against a batch service.
///
/// Every call can fail; the controller never assumes the backend is
/// available and never retries on its behalf. Reads return point-in-time
/// snapshots that go stale as soon as they are returned.
#[async_trait]
pub trait BatchBackend: Send + Sync {
    /// All pools, including those still allocating.
    async fn list_pools(&self) -> StateResult<Vec<Pool>>;

    async fn get_pool(&self, pool_id: &str) -> StateResult<Option<Pool>>;

    /// Submit a pool creation request. Fails with `Rejected` when the
    /// service refuses it.
    async fn create_pool(&self, spec: &PoolSpec) -> StateResult<Pool>;

    /// Request a new dedicated node count. Fails with `NotFound` for an
    /// unknown pool.
    async fn resize_pool(&self, pool_id: &str, target_dedicated_nodes: u32) -> StateResult<()>;

    /// Delete a pool and its nodes. Returns false if it did not exist.
    async fn delete_pool(&self, pool_id: &str) -> StateResult<bool>;

    /// Nodes of a pool, ordered by node id.
    async fn list_nodes(&self, pool_id: &str) -> StateResult<Vec<ComputeNode>>;

    async fn get_node(&self, pool_id: &str, node_id: &str) -> StateResult<Option<ComputeNode>>;

    async fn create_job(&self, job: &Job) -> StateResult<()>;

    async fn get_job(&self, job_id: &str) -> StateResult<Option<Job>>;

    /// Delete a job and its tasks. Returns false if it did not exist.
    async fn delete_job(&self, job_id: &str) -> StateResult<bool>;

    async fn add_task(&self, task: &Task) -> StateResult<()>;

    /// Tasks of a job, ordered by task id.
    async fn list_tasks(&self, job_id: &str) -> StateResult<Vec<Task>>;
}
