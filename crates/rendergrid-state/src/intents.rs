//! Ledger of in-flight allocation requests.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{PoolId, PoolKind};

/// A create or resize request that has been issued but not yet observed
/// as complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationIntent {
    pub kind: PoolKind,
    pub target_dedicated_nodes: u32,
}

/// Shared map of pool id → pending allocation intent.
///
/// Cheap to clone; all clones see the same ledger.
#[derive(Debug, Clone, Default)]
pub struct AllocationIntents {
    inner: Arc<RwLock<HashMap<PoolId, AllocationIntent>>>,
}

impl AllocationIntents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the intent for a pool.
    pub async fn record(&self, pool_id: &str, kind: PoolKind, target_dedicated_nodes: u32) {
        let mut inner = self.inner.write().await;
        inner.insert(
            pool_id.to_string(),
            AllocationIntent {
                kind,
                target_dedicated_nodes,
            },
        );
        debug!(%pool_id, %kind, target = target_dedicated_nodes, "allocation intent recorded");
    }

    /// Forget the intent for a pool. Returns the intent if one was recorded.
    pub async fn clear(&self, pool_id: &str) -> Option<AllocationIntent> {
        let mut inner = self.inner.write().await;
        inner.remove(pool_id)
    }

    pub async fn get(&self, pool_id: &str) -> Option<AllocationIntent> {
        let inner = self.inner.read().await;
        inner.get(pool_id).copied()
    }

    /// Point-in-time copy of every pending intent.
    pub async fn snapshot(&self) -> HashMap<PoolId, AllocationIntent> {
        let inner = self.inner.read().await;
        inner.clone()
    }
}
