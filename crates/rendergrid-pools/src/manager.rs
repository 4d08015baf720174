//! PoolManager — drives TURN and rendering pools through their lifecycle.
//!
//! The `PoolManager`:
//! - Submits pool creation requests built from the deployment profile
//! - Validates and issues resize requests against per-kind ceilings
//! - Waits for pools and nodes to converge on a desired state
//! - Deletes pools idempotently so teardown can always run
//!
//! It holds no per-pool state of its own beyond the allocation intents it
//! records for the capacity planner; every decision is made on a fresh read
//! from the backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use rendergrid_core::DeploymentConfig;
use rendergrid_state::*;

use crate::error::{PoolError, PoolResult};
use crate::poll::{CancelSignal, PollOutcome, poll_until};

/// Creates, resizes, awaits and deletes pools through a batch backend.
#[derive(Clone)]
pub struct PoolManager {
    backend: Arc<dyn BatchBackend>,
    config: Arc<DeploymentConfig>,
    /// In-flight create/resize targets, shared with the capacity planner.
    intents: AllocationIntents,
    poll_interval: Duration,
}

impl PoolManager {
    /// Create a new pool manager. The poll interval comes from the profile.
    pub fn new(backend: Arc<dyn BatchBackend>, config: Arc<DeploymentConfig>) -> Self {
        let poll_interval = config.poll_interval();
        Self {
            backend,
            config,
            intents: AllocationIntents::new(),
            poll_interval,
        }
    }

    /// Share an allocation intent ledger (typically with a capacity planner).
    pub fn with_intents(mut self, intents: AllocationIntents) -> Self {
        self.intents = intents;
        self
    }

    pub fn intents(&self) -> &AllocationIntents {
        &self.intents
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn backend(&self) -> &Arc<dyn BatchBackend> {
        &self.backend
    }

    pub fn config(&self) -> &Arc<DeploymentConfig> {
        &self.config
    }

    // ── Create ─────────────────────────────────────────────────────

    /// Create a TURN relay pool, or return the existing one.
    pub async fn create_turn_pool(&self, pool_id: &str) -> PoolResult<Pool> {
        self.create_pool(pool_id, PoolKind::TurnRelay).await
    }

    /// Create a rendering pool, or return the existing one.
    pub async fn create_rendering_pool(&self, pool_id: &str) -> PoolResult<Pool> {
        self.create_pool(pool_id, PoolKind::Rendering).await
    }

    /// Submit a creation request for a pool of `kind`.
    ///
    /// A pool that already exists and has not failed is returned unchanged.
    /// A failed pool must be deleted before the id can be reused.
    async fn create_pool(&self, pool_id: &str, kind: PoolKind) -> PoolResult<Pool> {
        if let Some(existing) = self.backend.get_pool(pool_id).await? {
            if existing.kind != kind {
                return Err(PoolError::Creation {
                    pool_id: pool_id.to_string(),
                    reason: format!("pool already exists as a {} pool", existing.kind),
                });
            }
            if existing.is_failed() {
                return Err(PoolError::Creation {
                    pool_id: pool_id.to_string(),
                    reason: format!(
                        "pool exists in failed state ({}); delete it first",
                        existing.resize_error.as_deref().unwrap_or("unknown error")
                    ),
                });
            }
            debug!(%pool_id, %kind, phase = ?existing.phase(), "pool already exists, reusing");
            return Ok(existing);
        }

        let profile = self.config.pool_profile(kind);
        let spec = PoolSpec {
            id: pool_id.to_string(),
            kind,
            vm_size: profile.vm_size.clone(),
            image: profile.image.clone(),
            node_agent_sku: profile.node_agent_sku.clone(),
            target_dedicated_nodes: profile.dedicated_nodes,
        };

        self.intents
            .record(pool_id, kind, spec.target_dedicated_nodes)
            .await;

        match self.backend.create_pool(&spec).await {
            Ok(pool) => {
                info!(
                    %pool_id,
                    %kind,
                    vm_size = %spec.vm_size,
                    target = spec.target_dedicated_nodes,
                    "pool creation requested"
                );
                Ok(pool)
            }
            Err(e) => {
                self.intents.clear(pool_id).await;
                warn!(%pool_id, %kind, error = %e, "pool creation rejected");
                Err(PoolError::Creation {
                    pool_id: pool_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    // ── Resize ─────────────────────────────────────────────────────

    /// Request a new dedicated node count for a pool.
    ///
    /// Counts below zero or above the kind's `max_dedicated_nodes` are
    /// rejected before anything is sent to the backend.
    pub async fn resize_pool(&self, pool_id: &str, desired_dedicated_nodes: i64) -> PoolResult<()> {
        let pool = self
            .backend
            .get_pool(pool_id)
            .await?
            .ok_or_else(|| PoolError::NotFound(pool_id.to_string()))?;

        let ceiling = self.config.pool_profile(pool.kind).max_dedicated_nodes;
        let target = u32::try_from(desired_dedicated_nodes)
            .ok()
            .filter(|n| *n <= ceiling)
            .ok_or_else(|| PoolError::InvalidCapacity {
                pool_id: pool_id.to_string(),
                requested: desired_dedicated_nodes,
                ceiling,
            })?;

        if target == pool.target_dedicated_nodes && pool.phase() == PoolPhase::Steady {
            debug!(%pool_id, target, "already at target, no resize needed");
            return Ok(());
        }

        self.intents.record(pool_id, pool.kind, target).await;

        match self.backend.resize_pool(pool_id, target).await {
            Ok(()) => {
                info!(
                    %pool_id,
                    from = pool.target_dedicated_nodes,
                    to = target,
                    "pool resize requested"
                );
                Ok(())
            }
            Err(StateError::NotFound(_)) => {
                self.intents.clear(pool_id).await;
                Err(PoolError::NotFound(pool_id.to_string()))
            }
            Err(e) => {
                self.intents.clear(pool_id).await;
                warn!(%pool_id, target, error = %e, "pool resize failed");
                Err(PoolError::Backend(e))
            }
        }
    }

    // ── Await ──────────────────────────────────────────────────────

    /// Poll until the pool's allocation state equals `desired`.
    ///
    /// Returns `Ok(false)` on timeout, on cancellation, or when the backend
    /// reports the allocation as failed; none of these are errors. A pool
    /// that disappears while being polled is `PoolError::NotFound`.
    pub async fn await_desired_pool_state(
        &self,
        pool_id: &str,
        desired: AllocationState,
        timeout: Duration,
        cancel: &mut CancelSignal,
    ) -> PoolResult<bool> {
        debug!(%pool_id, ?desired, ?timeout, "waiting for pool state");

        let outcome = poll_until(self.poll_interval, timeout, cancel, move || {
            self.observe_pool(pool_id, desired)
        })
        .await;

        match outcome {
            Ok(PollOutcome::Converged) => {
                if desired == AllocationState::Steady {
                    self.intents.clear(pool_id).await;
                }
                info!(%pool_id, ?desired, "pool reached desired state");
                Ok(true)
            }
            Ok(PollOutcome::Cancelled) => {
                info!(%pool_id, ?desired, "pool wait cancelled");
                Ok(false)
            }
            Ok(PollOutcome::TimedOut) => {
                warn!(%pool_id, ?desired, ?timeout, "timed out waiting for pool state");
                Ok(false)
            }
            Err(PoolError::AllocationFailed { reason, .. }) => {
                warn!(%pool_id, ?desired, %reason, "pool allocation failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Poll until a node's state equals `desired`.
    ///
    /// Same contract as [`await_desired_pool_state`](Self::await_desired_pool_state);
    /// a node that disappears is `PoolError::NodeNotFound`.
    pub async fn await_desired_node_state(
        &self,
        pool_id: &str,
        node_id: &str,
        desired: NodeState,
        timeout: Duration,
        cancel: &mut CancelSignal,
    ) -> PoolResult<bool> {
        debug!(%pool_id, %node_id, ?desired, ?timeout, "waiting for node state");

        let outcome = poll_until(self.poll_interval, timeout, cancel, move || {
            self.observe_node(pool_id, node_id, desired)
        })
        .await?;

        match outcome {
            PollOutcome::Converged => {
                info!(%pool_id, %node_id, ?desired, "node reached desired state");
                Ok(true)
            }
            PollOutcome::Cancelled => {
                info!(%pool_id, %node_id, "node wait cancelled");
                Ok(false)
            }
            PollOutcome::TimedOut => {
                warn!(%pool_id, %node_id, ?desired, ?timeout, "timed out waiting for node state");
                Ok(false)
            }
        }
    }

    async fn observe_pool(&self, pool_id: &str, desired: AllocationState) -> PoolResult<bool> {
        let pool = self
            .backend
            .get_pool(pool_id)
            .await?
            .ok_or_else(|| PoolError::NotFound(pool_id.to_string()))?;
        debug!(
            %pool_id,
            state = ?pool.allocation_state,
            current = pool.current_dedicated_nodes,
            target = pool.target_dedicated_nodes,
            "polled pool"
        );
        // A failed allocation is terminal.
        if pool.is_failed() {
            return Err(PoolError::AllocationFailed {
                pool_id: pool_id.to_string(),
                reason: pool.resize_error.unwrap_or_default(),
            });
        }
        Ok(pool.allocation_state == desired)
    }

    async fn observe_node(
        &self,
        pool_id: &str,
        node_id: &str,
        desired: NodeState,
    ) -> PoolResult<bool> {
        let node = self
            .backend
            .get_node(pool_id, node_id)
            .await?
            .ok_or_else(|| PoolError::NodeNotFound {
                pool_id: pool_id.to_string(),
                node_id: node_id.to_string(),
            })?;
        Ok(node.state == desired)
    }

    // ── Delete ─────────────────────────────────────────────────────

    /// Delete a pool. Returns false when the pool was already gone.
    ///
    /// Jobs still bound to the pool are not touched; teardown deletes them
    /// first.
    pub async fn delete_pool(&self, pool_id: &str) -> PoolResult<bool> {
        self.intents.clear(pool_id).await;

        let existed = self.backend.delete_pool(pool_id).await?;
        if existed {
            info!(%pool_id, "pool deleted");
        } else {
            debug!(%pool_id, "pool not found, nothing to delete");
        }
        Ok(existed)
    }

    // ── Reads ──────────────────────────────────────────────────────

    pub async fn get_pool(&self, pool_id: &str) -> PoolResult<Option<Pool>> {
        Ok(self.backend.get_pool(pool_id).await?)
    }

    /// Nodes of a pool, ordered by node id.
    pub async fn list_nodes(&self, pool_id: &str) -> PoolResult<Vec<ComputeNode>> {
        Ok(self.backend.list_nodes(pool_id).await?)
    }

    /// IPs of the nodes in a pool that are ready to take work.
    pub async fn ready_node_ips(&self, pool_id: &str) -> PoolResult<Vec<String>> {
        if self.backend.get_pool(pool_id).await?.is_none() {
            return Err(PoolError::NotFound(pool_id.to_string()));
        }
        let nodes = self.backend.list_nodes(pool_id).await?;
        Ok(nodes
            .iter()
            .filter_map(|n| n.trusted_ip().map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(60);

    fn test_manager(store: &StateStore) -> PoolManager {
        let config = Arc::new(DeploymentConfig::scaffold("farm"));
        PoolManager::new(Arc::new(store.clone()), config)
    }

    fn test_store() -> StateStore {
        StateStore::open_in_memory().unwrap()
    }

    // ── Create ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_rendering_pool_uses_profile() {
        let store = test_store();
        let manager = test_manager(&store);

        let pool = manager.create_rendering_pool("r1").await.unwrap();
        assert_eq!(pool.kind, PoolKind::Rendering);
        assert_eq!(pool.target_dedicated_nodes, 2);
        assert_eq!(pool.vm_size, "standard_nv6");
        assert_eq!(pool.phase(), PoolPhase::Provisioning);

        let intent = manager.intents().get("r1").await.unwrap();
        assert_eq!(intent.target_dedicated_nodes, 2);
    }

    #[tokio::test]
    async fn create_is_idempotent_for_live_pools() {
        let store = test_store();
        let manager = test_manager(&store);

        let first = manager.create_turn_pool("t1").await.unwrap();
        let second = manager.create_turn_pool("t1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.pools().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_with_other_kind_fails() {
        let store = test_store();
        let manager = test_manager(&store);

        manager.create_turn_pool("p1").await.unwrap();
        let err = manager.create_rendering_pool("p1").await.unwrap_err();
        assert!(matches!(err, PoolError::Creation { .. }));
    }

    #[tokio::test]
    async fn create_over_failed_pool_requires_delete() {
        let store = test_store();
        let manager = test_manager(&store);

        manager.create_rendering_pool("r1").await.unwrap();
        store.fail_pool("r1", "AllocationTimedout").unwrap();

        let err = manager.create_rendering_pool("r1").await.unwrap_err();
        assert!(matches!(err, PoolError::Creation { .. }));

        assert!(manager.delete_pool("r1").await.unwrap());
        manager.create_rendering_pool("r1").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_create_leaves_no_intent() {
        let store = test_store().with_node_quota(1);
        let manager = test_manager(&store);

        let err = manager.create_rendering_pool("r1").await.unwrap_err();
        assert!(matches!(err, PoolError::Creation { .. }));
        assert!(manager.intents().snapshot().await.is_empty());
        assert!(store.pool("r1").unwrap().is_none());
    }

    // ── Resize ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn resize_rejects_negative_count_without_mutation() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_rendering_pool("r1").await.unwrap();
        store.settle_pool("r1").unwrap();
        let before = store.pool("r1").unwrap();

        let err = manager.resize_pool("r1", -1).await.unwrap_err();
        assert!(matches!(
            err,
            PoolError::InvalidCapacity { requested: -1, ceiling: 20, .. }
        ));
        assert_eq!(store.pool("r1").unwrap(), before);
    }

    #[tokio::test]
    async fn resize_rejects_count_above_ceiling() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_turn_pool("t1").await.unwrap();
        store.settle_pool("t1").unwrap();
        let before = store.pool("t1").unwrap();

        let err = manager.resize_pool("t1", 5).await.unwrap_err();
        assert!(matches!(err, PoolError::InvalidCapacity { ceiling: 4, .. }));
        assert_eq!(store.pool("t1").unwrap(), before);

        manager.resize_pool("t1", 4).await.unwrap();
    }

    #[tokio::test]
    async fn resize_unknown_pool_is_not_found() {
        let store = test_store();
        let manager = test_manager(&store);

        let err = manager.resize_pool("ghost", 2).await.unwrap_err();
        assert!(matches!(err, PoolError::NotFound(_)));
    }

    #[tokio::test]
    async fn resize_records_intent_and_enters_resizing() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_rendering_pool("r1").await.unwrap();
        store.settle_pool("r1").unwrap();
        manager.intents().clear("r1").await;

        manager.resize_pool("r1", 6).await.unwrap();

        let pool = store.pool("r1").unwrap().unwrap();
        assert_eq!(pool.target_dedicated_nodes, 6);
        assert_eq!(pool.phase(), PoolPhase::Resizing);
        assert_eq!(
            manager.intents().get("r1").await.map(|i| i.target_dedicated_nodes),
            Some(6)
        );
    }

    // ── Await ──────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn await_pool_converges_once_backend_settles() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_rendering_pool("r1").await.unwrap();

        let backend = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            backend.settle_pool("r1").unwrap();
        });

        let reached = manager
            .await_desired_pool_state(
                "r1",
                AllocationState::Steady,
                TIMEOUT,
                &mut CancelSignal::never(),
            )
            .await
            .unwrap();

        assert!(reached);
        assert!(manager.intents().get("r1").await.is_none());
        assert_eq!(store.nodes("r1").unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn await_pool_times_out_with_false() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_rendering_pool("r1").await.unwrap();

        let reached = manager
            .await_desired_pool_state(
                "r1",
                AllocationState::Steady,
                Duration::from_secs(20),
                &mut CancelSignal::never(),
            )
            .await
            .unwrap();

        assert!(!reached);
        // The intent stays until the allocation is observed.
        assert!(manager.intents().get("r1").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn await_pool_reports_failed_allocation_as_false() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_rendering_pool("r1").await.unwrap();
        store.fail_pool("r1", "quota exceeded during allocation").unwrap();

        let reached = manager
            .await_desired_pool_state(
                "r1",
                AllocationState::Steady,
                TIMEOUT,
                &mut CancelSignal::never(),
            )
            .await
            .unwrap();
        assert!(!reached);
    }

    #[tokio::test(start_paused = true)]
    async fn await_pool_stops_on_cancel() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_rendering_pool("r1").await.unwrap();
        let (tx, mut cancel) = CancelSignal::channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            let _ = tx.send(true);
        });

        let started = tokio::time::Instant::now();
        let reached = manager
            .await_desired_pool_state("r1", AllocationState::Steady, TIMEOUT, &mut cancel)
            .await
            .unwrap();

        assert!(!reached);
        assert!(started.elapsed() < TIMEOUT);
        // Cancelling never touches the backend.
        assert!(store.pool("r1").unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn await_pool_deleted_mid_wait_is_not_found() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_rendering_pool("r1").await.unwrap();

        let backend = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            backend.remove_pool("r1").unwrap();
        });

        let err = manager
            .await_desired_pool_state(
                "r1",
                AllocationState::Steady,
                TIMEOUT,
                &mut CancelSignal::never(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn await_node_reaches_idle() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_rendering_pool("r1").await.unwrap();

        let mut node = ComputeNode {
            id: "node-000".to_string(),
            pool_id: "r1".to_string(),
            state: NodeState::Starting,
            ip_address: None,
            updated_at: 1000,
        };
        store.put_node(&node).unwrap();

        let backend = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(9)).await;
            node.state = NodeState::Idle;
            node.ip_address = Some("10.0.0.4".to_string());
            backend.put_node(&node).unwrap();
        });

        let reached = manager
            .await_desired_node_state(
                "r1",
                "node-000",
                NodeState::Idle,
                TIMEOUT,
                &mut CancelSignal::never(),
            )
            .await
            .unwrap();
        assert!(reached);
        assert_eq!(manager.ready_node_ips("r1").await.unwrap(), vec!["10.0.0.4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn await_missing_node_is_an_error() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_rendering_pool("r1").await.unwrap();

        let err = manager
            .await_desired_node_state(
                "r1",
                "node-404",
                NodeState::Idle,
                TIMEOUT,
                &mut CancelSignal::never(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::NodeNotFound { .. }));
    }

    // ── Delete & reads ─────────────────────────────────────────────

    #[tokio::test]
    async fn delete_pool_is_idempotent() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_turn_pool("t1").await.unwrap();

        assert!(manager.delete_pool("t1").await.unwrap());
        assert!(!manager.delete_pool("t1").await.unwrap());
        assert!(manager.intents().get("t1").await.is_none());
    }

    #[tokio::test]
    async fn ready_node_ips_skips_untrusted_nodes() {
        let store = test_store();
        let manager = test_manager(&store);
        manager.create_turn_pool("t1").await.unwrap();
        store.settle_pool("t1").unwrap();

        store
            .put_node(&ComputeNode {
                id: "node-009".to_string(),
                pool_id: "t1".to_string(),
                state: NodeState::Creating,
                ip_address: Some("10.0.0.99".to_string()),
                updated_at: 1000,
            })
            .unwrap();

        let ips = manager.ready_node_ips("t1").await.unwrap();
        assert_eq!(ips, vec!["10.0.0.4"]);
        assert!(matches!(
            manager.ready_node_ips("ghost").await,
            Err(PoolError::NotFound(_))
        ));
    }
}
