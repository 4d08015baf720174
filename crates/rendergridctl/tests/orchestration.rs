//! End-to-end orchestration tests.
//!
//! Drives pools, jobs, capacity and dispatch together against the redb
//! backend, with a spawned task standing in for the batch service as it
//! advances pools and tasks.

use std::sync::Arc;
use std::time::Duration;

use rendergrid_capacity::CapacityPlanner;
use rendergrid_core::DeploymentConfig;
use rendergrid_dispatch::{Action, ActionBatchItem, Batch, Dispatcher, QueueChannel, build_batch};
use rendergrid_jobs::{JobOrchestrator, JobPhase};
use rendergrid_pools::{CancelSignal, PoolError, PoolManager};
use rendergrid_state::*;

const TIMEOUT: Duration = Duration::from_secs(600);

struct Controller {
    store: StateStore,
    pools: PoolManager,
    jobs: JobOrchestrator,
    planner: CapacityPlanner,
}

fn controller_on(store: StateStore) -> Controller {
    let config = Arc::new(DeploymentConfig::scaffold("farm"));
    let backend: Arc<dyn BatchBackend> = Arc::new(store.clone());
    let intents = AllocationIntents::new();

    let pools = PoolManager::new(Arc::clone(&backend), Arc::clone(&config))
        .with_intents(intents.clone());
    let planner = CapacityPlanner::new(backend, config).with_intents(intents);
    let jobs = JobOrchestrator::new(pools.clone());

    Controller {
        store,
        pools,
        jobs,
        planner,
    }
}

fn controller() -> Controller {
    controller_on(StateStore::open_in_memory().unwrap())
}

/// Settle the given pools after `delay`, as the batch service would.
fn settle_after(store: &StateStore, delay: Duration, pool_ids: &[&str]) {
    let store = store.clone();
    let pool_ids: Vec<String> = pool_ids.iter().map(|s| s.to_string()).collect();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        for pool_id in &pool_ids {
            store.settle_pool(pool_id).unwrap();
        }
    });
}

#[tokio::test(start_paused = true)]
async fn provision_configure_and_tear_down() {
    let c = controller();

    c.pools.create_turn_pool("t1").await.unwrap();
    c.pools.create_rendering_pool("r1").await.unwrap();
    // Requested nodes count before they exist.
    assert_eq!(c.planner.max_rendering_slot_capacity().await.unwrap(), 2);

    settle_after(&c.store, Duration::from_secs(30), &["t1", "r1"]);
    for pool_id in ["t1", "r1"] {
        let steady = c
            .pools
            .await_desired_pool_state(
                pool_id,
                AllocationState::Steady,
                TIMEOUT,
                &mut CancelSignal::never(),
            )
            .await
            .unwrap();
        assert!(steady, "{pool_id} did not reach steady");
    }
    assert!(c.pools.intents().snapshot().await.is_empty());

    let turn_ips = c.pools.ready_node_ips("t1").await.unwrap();
    assert_eq!(turn_ips.len(), 1);

    assert_eq!(c.jobs.create_job("j1", "r1").await.unwrap(), "j1");
    assert!(c.jobs.add_rendering_tasks(&turn_ips[0], "j1").await.unwrap());
    let tasks = c.store.tasks("j1").unwrap();
    assert_eq!(tasks.len(), 2);

    let store = c.store.clone();
    let task_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
    tokio::spawn(async move {
        for task_id in task_ids {
            tokio::time::sleep(Duration::from_secs(45)).await;
            store.complete_task("j1", &task_id, 0).unwrap();
        }
    });

    let report = c
        .jobs
        .monitor_tasks_report("j1", TIMEOUT, &mut CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(report.phase, JobPhase::Completed);
    assert_eq!(report.tasks.len(), 2);

    assert_eq!(c.planner.max_rendering_slot_capacity().await.unwrap(), 2);
    assert!(!c.planner.is_approaching_capacity(1).await.unwrap());
    assert!(c.planner.is_approaching_capacity(2).await.unwrap());

    let summary = c.jobs.teardown("j1", "r1").await.unwrap();
    assert!(summary.job_deleted && summary.pool_deleted);
    assert!(c.pools.delete_pool("t1").await.unwrap());
    assert!(c.planner.list_pools().await.unwrap().is_empty());
    assert_eq!(c.planner.max_rendering_slot_capacity().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_allocation_recovers_after_teardown() {
    let c = controller();

    c.pools.create_rendering_pool("r1").await.unwrap();
    c.store.fail_pool("r1", "AllocationTimedout").unwrap();

    let steady = c
        .pools
        .await_desired_pool_state(
            "r1",
            AllocationState::Steady,
            TIMEOUT,
            &mut CancelSignal::never(),
        )
        .await
        .unwrap();
    assert!(!steady);

    // A failed pool cannot take jobs or be silently reused.
    assert!(c.jobs.create_job("j1", "r1").await.is_err());
    assert!(matches!(
        c.pools.create_rendering_pool("r1").await,
        Err(PoolError::Creation { .. })
    ));

    // No job was ever created; teardown still completes.
    let summary = c.jobs.teardown("j1", "r1").await.unwrap();
    assert!(!summary.job_deleted);
    assert!(summary.pool_deleted);

    c.pools.create_rendering_pool("r1").await.unwrap();
    settle_after(&c.store, Duration::from_secs(10), &["r1"]);
    assert!(
        c.pools
            .await_desired_pool_state(
                "r1",
                AllocationState::Steady,
                TIMEOUT,
                &mut CancelSignal::never(),
            )
            .await
            .unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn resize_is_visible_to_the_planner_before_it_lands() {
    let c = controller();
    c.pools.create_rendering_pool("r1").await.unwrap();
    c.store.settle_pool("r1").unwrap();
    c.pools.intents().clear("r1").await;

    let before = c.store.pool("r1").unwrap();
    assert!(matches!(
        c.pools.resize_pool("r1", 21).await,
        Err(PoolError::InvalidCapacity { .. })
    ));
    assert!(matches!(
        c.pools.resize_pool("r1", -3).await,
        Err(PoolError::InvalidCapacity { .. })
    ));
    assert_eq!(c.store.pool("r1").unwrap(), before);
    assert_eq!(c.planner.max_rendering_slot_capacity().await.unwrap(), 2);

    c.pools.resize_pool("r1", 6).await.unwrap();
    assert_eq!(c.planner.max_rendering_slot_capacity().await.unwrap(), 6);

    settle_after(&c.store, Duration::from_secs(15), &["r1"]);
    assert!(
        c.pools
            .await_desired_pool_state(
                "r1",
                AllocationState::Steady,
                TIMEOUT,
                &mut CancelSignal::never(),
            )
            .await
            .unwrap()
    );
    assert_eq!(c.store.nodes("r1").unwrap().len(), 6);
    assert_eq!(c.planner.max_rendering_slot_capacity().await.unwrap(), 6);
}

#[tokio::test(start_paused = true)]
async fn failing_task_fails_the_job() {
    let c = controller();
    c.pools.create_rendering_pool("r1").await.unwrap();
    c.store.settle_pool("r1").unwrap();
    c.jobs.create_job("j1", "r1").await.unwrap();
    c.jobs.add_rendering_tasks("10.0.0.4", "j1").await.unwrap();

    let tasks = c.store.tasks("j1").unwrap();
    c.store.complete_task("j1", &tasks[0].id, 0).unwrap();
    c.store.complete_task("j1", &tasks[1].id, 2).unwrap();

    let ok = c
        .jobs
        .monitor_tasks("j1", TIMEOUT, &mut CancelSignal::never())
        .await
        .unwrap();
    assert!(!ok);
    assert_eq!(
        c.jobs.job_phase("j1").await.unwrap(),
        Some(JobPhase::PartiallyFailed)
    );
}

#[tokio::test]
async fn batch_dispatch_delivers_one_ordered_message() {
    let (channel, mut rx) = QueueChannel::new(16);
    let dispatcher = Dispatcher::new(Arc::new(channel));

    let batch = build_batch([
        ActionBatchItem::new(Action::Up, 1, [1, 2, 3, 4]),
        ActionBatchItem::new(Action::Down, 2, [1, 2, 3, 4]),
    ]);
    dispatcher.dispatch(&batch).await.unwrap();
    drop(dispatcher);

    let mut messages = Vec::new();
    while let Some(message) = rx.recv().await {
        messages.push(message);
    }
    assert_eq!(messages.len(), 1);

    let delivered = Batch::from_payload(&messages[0]).unwrap();
    assert_eq!(delivered.items()[0].action, Action::Up);
    assert_eq!(delivered.items()[0].turn_server_id, 1);
    assert_eq!(delivered.items()[1].action, Action::Down);
    assert_eq!(delivered.items()[1].turn_server_id, 2);
    assert_eq!(
        &messages[0][..],
        br#"[{"action":"up","turnServerId":1,"vmIds":[1,2,3,4]},{"action":"down","turnServerId":2,"vmIds":[1,2,3,4]}]"#
    );
}

#[tokio::test]
async fn teardown_survives_a_reopened_backend() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("rendergrid.redb");

    {
        let c = controller_on(StateStore::open(&db_path).unwrap());
        c.pools.create_rendering_pool("r1").await.unwrap();
        c.store.settle_pool("r1").unwrap();
        c.jobs.create_job("j1", "r1").await.unwrap();
    }

    let c = controller_on(StateStore::open(&db_path).unwrap());
    assert_eq!(c.jobs.job_phase("j1").await.unwrap(), Some(JobPhase::Created));
    let summary = c.jobs.teardown("j1", "r1").await.unwrap();
    assert!(summary.job_deleted && summary.pool_deleted);
    assert!(c.store.pool("r1").unwrap().is_none());
}
