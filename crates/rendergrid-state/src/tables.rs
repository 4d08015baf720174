//! redb table definitions for the local batch backend.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Child records use composite `{parent_id}:{child_id}` keys so they can be
//! found with a prefix scan.

use redb::TableDefinition;

pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Pools keyed by `{pool_id}`.
pub const POOLS: JsonTable = TableDefinition::new("pools");

/// Compute nodes keyed by `{pool_id}:{node_id}`.
pub const NODES: JsonTable = TableDefinition::new("nodes");

/// Jobs keyed by `{job_id}`.
pub const JOBS: JsonTable = TableDefinition::new("jobs");

/// Tasks keyed by `{job_id}:{task_id}`.
pub const TASKS: JsonTable = TableDefinition::new("tasks");
