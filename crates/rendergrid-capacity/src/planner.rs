//! CapacityPlanner — rendering slot capacity and client headroom.
//!
//! Every answer is computed from a fresh backend listing plus the current
//! allocation intents; the planner caches nothing between calls.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use rendergrid_core::{DeploymentConfig, ValidityResult};
use rendergrid_state::*;

use crate::error::CapacityResult;

/// Answers capacity questions about the rendering fleet.
#[derive(Clone)]
pub struct CapacityPlanner {
    backend: Arc<dyn BatchBackend>,
    config: Arc<DeploymentConfig>,
    intents: AllocationIntents,
}

impl CapacityPlanner {
    pub fn new(backend: Arc<dyn BatchBackend>, config: Arc<DeploymentConfig>) -> Self {
        Self {
            backend,
            config,
            intents: AllocationIntents::new(),
        }
    }

    /// Read the allocation intents a pool manager records.
    pub fn with_intents(mut self, intents: AllocationIntents) -> Self {
        self.intents = intents;
        self
    }

    /// All pools the backend knows about, including those still allocating.
    pub async fn list_pools(&self) -> CapacityResult<Vec<Pool>> {
        Ok(self.backend.list_pools().await?)
    }

    /// Total rendering slots across every rendering pool, pending ones
    /// included.
    ///
    /// Every listed rendering pool counts at the larger of its observed target
    /// and any pending intent, whether or not its last allocation failed.
    pub async fn max_rendering_slot_capacity(&self) -> CapacityResult<u64> {
        let pools = self.backend.list_pools().await?;
        let intents = self.intents.snapshot().await;
        let slots_per_node = u64::from(self.config.slots_per_node());

        let mut listed = HashSet::new();
        let mut nodes: u64 = 0;

        for pool in pools.iter().filter(|p| p.kind == PoolKind::Rendering) {
            listed.insert(pool.id.as_str());
            let pending = intents
                .get(&pool.id)
                .map(|i| i.target_dedicated_nodes)
                .unwrap_or(0);
            nodes += u64::from(pool.target_dedicated_nodes.max(pending));
        }

        // Creations requested but not yet visible in the listing.
        for (pool_id, intent) in &intents {
            if intent.kind == PoolKind::Rendering && !listed.contains(pool_id.as_str()) {
                nodes += u64::from(intent.target_dedicated_nodes);
            }
        }

        let capacity = nodes * slots_per_node;
        debug!(nodes, slots_per_node, capacity, "computed rendering slot capacity");
        Ok(capacity)
    }

    /// Whether `total_connected_clients` exceeds the configured fraction of
    /// rendering capacity.
    pub async fn is_approaching_capacity(&self, total_connected_clients: u64) -> CapacityResult<bool> {
        let capacity = self.max_rendering_slot_capacity().await?;
        let threshold = self.config.approaching_threshold();
        let approaching = exceeds_threshold(total_connected_clients, capacity, threshold);
        debug!(
            clients = total_connected_clients,
            capacity,
            threshold,
            approaching,
            "evaluated capacity headroom"
        );
        Ok(approaching)
    }

    /// First violated constraint of the deployment profile, or valid.
    pub fn validate_configuration(&self) -> ValidityResult {
        self.config.validate()
    }
}

fn exceeds_threshold(clients: u64, capacity: u64, threshold: f64) -> bool {
    clients as f64 > threshold * capacity as f64
}
