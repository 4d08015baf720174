//! Domain types observed and mutated through the batch backend.
//!
//! These types represent point-in-time snapshots of pools, compute nodes,
//! jobs and tasks. All types are serializable to/from JSON for storage in
//! redb tables.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use rendergrid_core::PoolKind;

/// Unique identifier for a pool.
pub type PoolId = String;

/// Identifier for a compute node within a pool.
pub type NodeId = String;

/// Unique identifier for a job.
pub type JobId = String;

/// Identifier for a task within a job.
pub type TaskId = String;

// ── Pool ──────────────────────────────────────────────────────────

/// Backend-observed convergence state of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationState {
    /// Nodes are being added or removed.
    Resizing,
    /// The pool has converged on its target size (or given up trying).
    Steady,
    /// A resize is being cancelled.
    Stopping,
}

/// A request to create a pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolSpec {
    pub id: PoolId,
    pub kind: PoolKind,
    pub vm_size: String,
    pub image: String,
    pub node_agent_sku: Option<String>,
    pub target_dedicated_nodes: u32,
}

/// A named group of compute nodes of one kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pool {
    pub id: PoolId,
    pub kind: PoolKind,
    pub vm_size: String,
    pub image: String,
    pub allocation_state: AllocationState,
    /// Dedicated nodes the pool is converging towards.
    pub target_dedicated_nodes: u32,
    /// Dedicated nodes currently allocated.
    pub current_dedicated_nodes: u32,
    /// Set when the backend gave up on the last allocation.
    pub resize_error: Option<String>,
    /// Unix timestamp (seconds) when the pool was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last state change.
    pub updated_at: u64,
}

/// Lifecycle phase of a pool, derived from its observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    /// Created and allocating its first nodes.
    Provisioning,
    /// Changing size after having held nodes.
    Resizing,
    Steady,
    Failed,
}

impl Pool {
    /// Build the record a backend holds right after accepting `spec`.
    pub fn requested(spec: &PoolSpec, now: u64) -> Self {
        Self {
            id: spec.id.clone(),
            kind: spec.kind,
            vm_size: spec.vm_size.clone(),
            image: spec.image.clone(),
            allocation_state: AllocationState::Resizing,
            target_dedicated_nodes: spec.target_dedicated_nodes,
            current_dedicated_nodes: 0,
            resize_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.allocation_state == AllocationState::Steady && self.resize_error.is_some()
    }

    pub fn phase(&self) -> PoolPhase {
        match self.allocation_state {
            AllocationState::Steady if self.resize_error.is_some() => PoolPhase::Failed,
            AllocationState::Steady => PoolPhase::Steady,
            AllocationState::Resizing | AllocationState::Stopping
                if self.current_dedicated_nodes == 0 =>
            {
                PoolPhase::Provisioning
            }
            AllocationState::Resizing | AllocationState::Stopping => PoolPhase::Resizing,
        }
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// Backend-observed lifecycle state of a compute node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Creating,
    Starting,
    Idle,
    Running,
    Unusable,
    LeavingPool,
}

impl NodeState {
    /// Whether the node has finished booting and can take work.
    pub fn is_ready(&self) -> bool {
        matches!(self, NodeState::Idle | NodeState::Running)
    }
}

/// A single compute node belonging to a pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputeNode {
    pub id: NodeId,
    /// Owning pool (back-reference only).
    pub pool_id: PoolId,
    pub state: NodeState,
    pub ip_address: Option<String>,
    pub updated_at: u64,
}

impl ComputeNode {
    /// Build the composite key for the nodes table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.pool_id, self.id)
    }

    /// The node's IP, once the node is far enough along to trust it.
    pub fn trusted_ip(&self) -> Option<&str> {
        if self.state.is_ready() {
            self.ip_address.as_deref()
        } else {
            None
        }
    }
}

// ── Job ───────────────────────────────────────────────────────────

/// A container for tasks run against one pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub pool_id: PoolId,
    pub created_at: u64,
}

// ── Task ──────────────────────────────────────────────────────────

/// Backend-observed state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Active,
    Running,
    Completed,
}

/// A unit of work scheduled against a node within a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub job_id: JobId,
    /// Node the task is pinned to.
    pub node_id: Option<NodeId>,
    pub command_line: String,
    pub state: TaskState,
    /// Process exit code; only meaningful once completed.
    pub exit_code: Option<i32>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Task {
    /// A freshly submitted task.
    pub fn queued(
        id: impl Into<TaskId>,
        job_id: impl Into<JobId>,
        node_id: Option<NodeId>,
        command_line: impl Into<String>,
        now: u64,
    ) -> Self {
        Self {
            id: id.into(),
            job_id: job_id.into(),
            node_id,
            command_line: command_line.into(),
            state: TaskState::Active,
            exit_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the composite key for the tasks table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.job_id, self.id)
    }

    pub fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }

    /// Completed with exit code 0. Anything else is a failure.
    pub fn succeeded(&self) -> bool {
        self.is_completed() && self.exit_code == Some(0)
    }
}

/// Current Unix epoch in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
