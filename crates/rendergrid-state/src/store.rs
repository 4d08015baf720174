//! StateStore — redb-backed local batch backend.
//!
//! Holds pools, nodes, jobs and tasks as JSON values in redb tables and
//! implements [`BatchBackend`] over them. The store supports both on-disk and
//! in-memory backends (the latter for testing).
//!
//! Nothing here advances resource state on its own. A pool stays `resizing`
//! until `settle_pool` or `fail_pool` is called, and a task stays `active`
//! until `complete_task` (or `put_task`) moves it, the way a remote service
//! would between two polls.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::BatchBackend;
use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe local batch backend backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    /// Ceiling on the sum of target dedicated nodes across all pools.
    node_quota: Option<u32>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            node_quota: None,
        };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            node_quota: None,
        };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Reject create/resize requests that would push the total target
    /// dedicated node count above `quota`.
    pub fn with_node_quota(mut self, quota: u32) -> Self {
        self.node_quota = Some(quota);
        self
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(POOLS).map_err(map_err!(Table))?;
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(JOBS).map_err(map_err!(Table))?;
        txn.open_table(TASKS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Pools ──────────────────────────────────────────────────────

    /// Insert or update a pool record.
    pub fn put_pool(&self, pool: &Pool) -> StateResult<()> {
        self.put_json(POOLS, &pool.id, pool)?;
        debug!(pool_id = %pool.id, state = ?pool.allocation_state, "pool stored");
        Ok(())
    }

    pub fn pool(&self, pool_id: &str) -> StateResult<Option<Pool>> {
        self.get_json(POOLS, pool_id)
    }

    pub fn pools(&self) -> StateResult<Vec<Pool>> {
        self.scan_json(POOLS, "")
    }

    /// Delete a pool and all of its nodes. Returns true if the pool existed.
    pub fn remove_pool(&self, pool_id: &str) -> StateResult<bool> {
        let node_keys: Vec<String> = self
            .nodes(pool_id)?
            .iter()
            .map(ComputeNode::table_key)
            .collect();

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut pools = txn.open_table(POOLS).map_err(map_err!(Table))?;
            existed = pools.remove(pool_id).map_err(map_err!(Write))?.is_some();

            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
            for key in &node_keys {
                nodes.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%pool_id, existed, nodes_removed = node_keys.len(), "pool deleted");
        Ok(existed)
    }

    /// Bring a pool to its target size: add idle nodes or drop surplus
    /// ones, then mark the allocation steady.
    pub fn settle_pool(&self, pool_id: &str) -> StateResult<Pool> {
        let mut pool = self
            .pool(pool_id)?
            .ok_or_else(|| StateError::NotFound(format!("pool {pool_id}")))?;
        let mut nodes = self.nodes(pool_id)?;
        let target = pool.target_dedicated_nodes as usize;
        let now = epoch_secs();

        while nodes.len() > target {
            if let Some(surplus) = nodes.pop() {
                self.remove_key(NODES, &surplus.table_key())?;
            }
        }

        let mut index = 0usize;
        while nodes.len() < target {
            let id = format!("node-{index:03}");
            if !nodes.iter().any(|n| n.id == id) {
                let node = ComputeNode {
                    id,
                    pool_id: pool_id.to_string(),
                    state: NodeState::Idle,
                    ip_address: Some(format!("10.0.{}.{}", index / 250, index % 250 + 4)),
                    updated_at: now,
                };
                self.put_node(&node)?;
                nodes.push(node);
            }
            index += 1;
        }

        pool.current_dedicated_nodes = pool.target_dedicated_nodes;
        pool.allocation_state = AllocationState::Steady;
        pool.resize_error = None;
        pool.updated_at = now;
        self.put_pool(&pool)?;
        Ok(pool)
    }

    /// Mark the last allocation of a pool as failed.
    pub fn fail_pool(&self, pool_id: &str, reason: &str) -> StateResult<Pool> {
        let mut pool = self
            .pool(pool_id)?
            .ok_or_else(|| StateError::NotFound(format!("pool {pool_id}")))?;
        pool.allocation_state = AllocationState::Steady;
        pool.resize_error = Some(reason.to_string());
        pool.updated_at = epoch_secs();
        self.put_pool(&pool)?;
        Ok(pool)
    }

    fn check_quota(&self, pool_id: &str, requested: u32) -> StateResult<()> {
        let Some(quota) = self.node_quota else {
            return Ok(());
        };
        let others: u32 = self
            .pools()?
            .iter()
            .filter(|p| p.id != pool_id)
            .map(|p| p.target_dedicated_nodes)
            .sum();
        if others + requested > quota {
            return Err(StateError::Rejected(format!(
                "dedicated node quota exceeded: {} requested, {} of {quota} in use",
                requested, others
            )));
        }
        Ok(())
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a compute node.
    pub fn put_node(&self, node: &ComputeNode) -> StateResult<()> {
        self.put_json(NODES, &node.table_key(), node)
    }

    pub fn node(&self, pool_id: &str, node_id: &str) -> StateResult<Option<ComputeNode>> {
        self.get_json(NODES, &format!("{pool_id}:{node_id}"))
    }

    /// Nodes of a pool, ordered by node id.
    ///
    /// Pool ids may themselves contain `:`, so the key prefix only narrows
    /// the scan and the stored `pool_id` decides membership.
    pub fn nodes(&self, pool_id: &str) -> StateResult<Vec<ComputeNode>> {
        let mut nodes: Vec<ComputeNode> = self.scan_json(NODES, &format!("{pool_id}:"))?;
        nodes.retain(|n| n.pool_id == pool_id);
        Ok(nodes)
    }

    // ── Jobs ───────────────────────────────────────────────────────

    pub fn put_job(&self, job: &Job) -> StateResult<()> {
        self.put_json(JOBS, &job.id, job)
    }

    pub fn job(&self, job_id: &str) -> StateResult<Option<Job>> {
        self.get_json(JOBS, job_id)
    }

    /// Delete a job and all of its tasks. Returns true if the job existed.
    pub fn remove_job(&self, job_id: &str) -> StateResult<bool> {
        let task_keys: Vec<String> = self.tasks(job_id)?.iter().map(Task::table_key).collect();

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut jobs = txn.open_table(JOBS).map_err(map_err!(Table))?;
            existed = jobs.remove(job_id).map_err(map_err!(Write))?.is_some();

            let mut tasks = txn.open_table(TASKS).map_err(map_err!(Table))?;
            for key in &task_keys {
                tasks.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%job_id, existed, tasks_removed = task_keys.len(), "job deleted");
        Ok(existed)
    }

    // ── Tasks ──────────────────────────────────────────────────────

    /// Insert or update a task.
    pub fn put_task(&self, task: &Task) -> StateResult<()> {
        self.put_json(TASKS, &task.table_key(), task)
    }

    /// Tasks of a job, ordered by task id. Membership is the stored `job_id`.
    pub fn tasks(&self, job_id: &str) -> StateResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self.scan_json(TASKS, &format!("{job_id}:"))?;
        tasks.retain(|t| t.job_id == job_id);
        Ok(tasks)
    }

    /// Mark a task completed with the given exit code.
    pub fn complete_task(&self, job_id: &str, task_id: &str, exit_code: i32) -> StateResult<Task> {
        let key = format!("{job_id}:{task_id}");
        let mut task: Task = self
            .get_json(TASKS, &key)?
            .ok_or_else(|| StateError::NotFound(format!("task {key}")))?;
        task.state = TaskState::Completed;
        task.exit_code = Some(exit_code);
        task.updated_at = epoch_secs();
        self.put_task(&task)?;
        Ok(task)
    }

    // ── Generic JSON table access ──────────────────────────────────

    fn put_json<T: Serialize>(&self, table: JsonTable, key: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// All values whose key starts with `prefix`, in key order.
    fn scan_json<T: DeserializeOwned>(&self, table: JsonTable, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let item = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(item);
            }
        }
        Ok(results)
    }

    fn remove_key(&self, table: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

#[async_trait]
impl BatchBackend for StateStore {
    async fn list_pools(&self) -> StateResult<Vec<Pool>> {
        self.pools()
    }

    async fn get_pool(&self, pool_id: &str) -> StateResult<Option<Pool>> {
        self.pool(pool_id)
    }

    async fn create_pool(&self, spec: &PoolSpec) -> StateResult<Pool> {
        if self.pool(&spec.id)?.is_some() {
            return Err(StateError::Rejected(format!("pool {} already exists", spec.id)));
        }
        if spec.image.trim().is_empty() {
            return Err(StateError::Rejected(format!("pool {} has no image", spec.id)));
        }
        self.check_quota(&spec.id, spec.target_dedicated_nodes)?;

        let pool = Pool::requested(spec, epoch_secs());
        self.put_pool(&pool)?;
        Ok(pool)
    }

    async fn resize_pool(&self, pool_id: &str, target_dedicated_nodes: u32) -> StateResult<()> {
        let mut pool = self
            .pool(pool_id)?
            .ok_or_else(|| StateError::NotFound(format!("pool {pool_id}")))?;
        self.check_quota(pool_id, target_dedicated_nodes)?;

        pool.target_dedicated_nodes = target_dedicated_nodes;
        pool.allocation_state = AllocationState::Resizing;
        pool.resize_error = None;
        pool.updated_at = epoch_secs();
        self.put_pool(&pool)
    }

    async fn delete_pool(&self, pool_id: &str) -> StateResult<bool> {
        self.remove_pool(pool_id)
    }

    async fn list_nodes(&self, pool_id: &str) -> StateResult<Vec<ComputeNode>> {
        self.nodes(pool_id)
    }

    async fn get_node(&self, pool_id: &str, node_id: &str) -> StateResult<Option<ComputeNode>> {
        self.node(pool_id, node_id)
    }

    async fn create_job(&self, job: &Job) -> StateResult<()> {
        if self.job(&job.id)?.is_some() {
            return Err(StateError::Rejected(format!("job {} already exists", job.id)));
        }
        self.put_job(job)
    }

    async fn get_job(&self, job_id: &str) -> StateResult<Option<Job>> {
        self.job(job_id)
    }

    async fn delete_job(&self, job_id: &str) -> StateResult<bool> {
        self.remove_job(job_id)
    }

    async fn add_task(&self, task: &Task) -> StateResult<()> {
        if self.job(&task.job_id)?.is_none() {
            return Err(StateError::NotFound(format!("job {}", task.job_id)));
        }
        if self.get_json::<Task>(TASKS, &task.table_key())?.is_some() {
            return Err(StateError::Rejected(format!(
                "task {} already exists in job {}",
                task.id, task.job_id
            )));
        }
        self.put_task(task)
    }

    async fn list_tasks(&self, job_id: &str) -> StateResult<Vec<Task>> {
        self.tasks(job_id)
    }
}
