//! JobOrchestrator — binds jobs to pools and runs node setup tasks.
//!
//! The orchestrator shares the pool manager's backend and deployment
//! profile. Like the pool manager it keeps no job state of its own; every
//! call starts from a fresh backend read.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use rendergrid_core::DeploymentConfig;
use rendergrid_pools::{CancelSignal, PollOutcome, PoolManager, poll_until};
use rendergrid_state::*;

use crate::error::{JobError, JobResult};
use crate::report::{JobPhase, MonitorReport, TaskOutcome};

/// What a teardown actually removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownSummary {
    pub job_deleted: bool,
    pub pool_deleted: bool,
}

/// Creates jobs, schedules rendering setup tasks and monitors them.
#[derive(Clone)]
pub struct JobOrchestrator {
    pools: PoolManager,
    backend: Arc<dyn BatchBackend>,
    config: Arc<DeploymentConfig>,
}

impl JobOrchestrator {
    pub fn new(pools: PoolManager) -> Self {
        let backend = Arc::clone(pools.backend());
        let config = Arc::clone(pools.config());
        Self {
            pools,
            backend,
            config,
        }
    }

    pub fn pools(&self) -> &PoolManager {
        &self.pools
    }

    // ── Jobs ───────────────────────────────────────────────────────

    /// Create a job bound to `pool_id`. Returns the job id.
    ///
    /// The pool must exist and be steady. Re-creating a job that already
    /// targets the same pool returns its id unchanged.
    pub async fn create_job(&self, job_id: &str, pool_id: &str) -> JobResult<String> {
        let creation_error = |reason: String| JobError::Creation {
            job_id: job_id.to_string(),
            reason,
        };

        let pool = self
            .pools
            .get_pool(pool_id)
            .await?
            .ok_or_else(|| creation_error(format!("pool {pool_id} does not exist")))?;
        let phase = pool.phase();
        if phase != PoolPhase::Steady {
            return Err(creation_error(format!(
                "pool {pool_id} is not steady (phase {phase:?})"
            )));
        }

        if let Some(existing) = self.backend.get_job(job_id).await? {
            if existing.pool_id != pool_id {
                return Err(creation_error(format!(
                    "job already exists on pool {}",
                    existing.pool_id
                )));
            }
            debug!(%job_id, %pool_id, "job already exists, reusing");
            return Ok(existing.id);
        }

        let job = Job {
            id: job_id.to_string(),
            pool_id: pool_id.to_string(),
            created_at: epoch_secs(),
        };
        self.backend
            .create_job(&job)
            .await
            .map_err(|e| creation_error(e.to_string()))?;

        info!(%job_id, %pool_id, phase = ?JobPhase::Created, "job created");
        Ok(job.id)
    }

    /// Delete a job and its tasks. Returns false when the job was already
    /// gone.
    pub async fn delete_job(&self, job_id: &str) -> JobResult<bool> {
        let existed = self.backend.delete_job(job_id).await?;
        if existed {
            info!(%job_id, "job deleted");
        } else {
            debug!(%job_id, "job not found, nothing to delete");
        }
        Ok(existed)
    }

    /// Delete the job, then the pool. Both steps tolerate absence, so a
    /// teardown after a partial failure always completes.
    pub async fn teardown(&self, job_id: &str, pool_id: &str) -> JobResult<TeardownSummary> {
        let job_deleted = self.delete_job(job_id).await?;
        let pool_deleted = self.pools.delete_pool(pool_id).await?;
        info!(%job_id, %pool_id, job_deleted, pool_deleted, "teardown finished");
        Ok(TeardownSummary {
            job_deleted,
            pool_deleted,
        })
    }

    /// Phase derived from the job's current tasks. `None` if the job does
    /// not exist.
    pub async fn job_phase(&self, job_id: &str) -> JobResult<Option<JobPhase>> {
        if self.backend.get_job(job_id).await?.is_none() {
            return Ok(None);
        }
        let tasks = self.backend.list_tasks(job_id).await?;
        Ok(Some(JobPhase::from_tasks(&tasks)))
    }

    // ── Tasks ──────────────────────────────────────────────────────

    /// Schedule one setup task per ready node in the job's pool.
    ///
    /// Each task runs the configured node setup script with the TURN
    /// server address, plus the signaling server URL when one is
    /// configured. Tasks already submitted stay in place if a later one is
    /// rejected; tear the job down to discard them.
    pub async fn add_rendering_tasks(&self, turn_server_ip: &str, job_id: &str) -> JobResult<bool> {
        let task_error = |reason: String| JobError::TaskCreation {
            job_id: job_id.to_string(),
            reason,
        };

        let turn_ip: IpAddr = turn_server_ip
            .trim()
            .parse()
            .map_err(|_| task_error(format!("invalid TURN server ip: {turn_server_ip:?}")))?;

        let job = self
            .backend
            .get_job(job_id)
            .await?
            .ok_or_else(|| task_error("job does not exist".to_string()))?;

        let script = self
            .config
            .rendering_pool
            .setup_script
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| task_error("no rendering setup script configured".to_string()))?;
        let command_line =
            setup_command_line(script, turn_ip, self.config.signaling_server_url());

        let nodes: Vec<ComputeNode> = self
            .pools
            .list_nodes(&job.pool_id)
            .await?
            .into_iter()
            .filter(|n| n.state.is_ready())
            .collect();
        if nodes.is_empty() {
            return Err(task_error(format!(
                "no ready nodes in pool {}",
                job.pool_id
            )));
        }

        let now = epoch_secs();
        for node in &nodes {
            let task = Task::queued(
                format!("setup-{}", node.id),
                job_id,
                Some(node.id.clone()),
                command_line.clone(),
                now,
            );
            self.backend.add_task(&task).await.map_err(|e| {
                warn!(%job_id, node_id = %node.id, error = %e, "task rejected");
                task_error(e.to_string())
            })?;
            debug!(%job_id, task_id = %task.id, node_id = %node.id, "task added");
        }

        info!(
            %job_id,
            pool_id = %job.pool_id,
            tasks = nodes.len(),
            %turn_ip,
            phase = ?JobPhase::TasksAdded,
            "rendering tasks added"
        );
        Ok(true)
    }

    /// Poll until every task of the job has completed, or `timeout` passes,
    /// or `cancel` fires.
    ///
    /// True iff all tasks completed with exit code 0 before the deadline.
    /// An early failure does not stop the wait; the result is decided once
    /// every task has finished. A job deleted mid-wait is `NotFound`.
    pub async fn monitor_tasks(
        &self,
        job_id: &str,
        timeout: Duration,
        cancel: &mut CancelSignal,
    ) -> JobResult<bool> {
        let report = self.monitor_tasks_report(job_id, timeout, cancel).await?;
        Ok(report.succeeded())
    }

    /// Like [`monitor_tasks`](Self::monitor_tasks), returning the final
    /// phase and the per-task outcomes seen on the last poll.
    pub async fn monitor_tasks_report(
        &self,
        job_id: &str,
        timeout: Duration,
        cancel: &mut CancelSignal,
    ) -> JobResult<MonitorReport> {
        if self.backend.get_job(job_id).await?.is_none() {
            return Err(JobError::NotFound(job_id.to_string()));
        }

        let initial = self.backend.list_tasks(job_id).await?;
        if initial.is_empty() {
            warn!(%job_id, "job has no tasks to monitor");
            return Ok(build_report(job_id, JobPhase::Created, &initial));
        }

        debug!(%job_id, tasks = initial.len(), ?timeout, "monitoring tasks");
        let latest = Mutex::new(initial);
        let seen = &latest;

        let outcome = poll_until(self.pools.poll_interval(), timeout, cancel, move || {
            self.observe_tasks(job_id, seen)
        })
        .await?;

        let tasks = latest.into_inner();
        let phase = match outcome {
            PollOutcome::Converged => JobPhase::from_tasks(&tasks),
            PollOutcome::TimedOut => JobPhase::TimedOut,
            PollOutcome::Cancelled => JobPhase::Cancelled,
        };

        let report = build_report(job_id, phase, &tasks);
        match phase {
            JobPhase::Completed => info!(%job_id, tasks = tasks.len(), "all tasks succeeded"),
            JobPhase::Cancelled => info!(%job_id, "task monitoring cancelled"),
            _ => warn!(
                %job_id,
                ?phase,
                failed = report.failed_tasks().count(),
                "tasks did not all succeed"
            ),
        }
        Ok(report)
    }

    /// One poll of the job's tasks. Monitoring only starts once tasks exist,
    /// so an empty listing means the job was deleted underneath the wait.
    async fn observe_tasks(&self, job_id: &str, latest: &Mutex<Vec<Task>>) -> JobResult<bool> {
        let tasks = self.backend.list_tasks(job_id).await?;
        if tasks.is_empty() {
            warn!(%job_id, "job disappeared while monitoring");
            return Err(JobError::NotFound(job_id.to_string()));
        }
        let completed = tasks.iter().filter(|t| t.is_completed()).count();
        debug!(%job_id, completed, total = tasks.len(), "polled tasks");
        let done = completed == tasks.len();
        *latest.lock().await = tasks;
        Ok(done)
    }
}

fn build_report(job_id: &str, phase: JobPhase, tasks: &[Task]) -> MonitorReport {
    MonitorReport {
        job_id: job_id.to_string(),
        phase,
        tasks: tasks.iter().map(TaskOutcome::from).collect(),
    }
}

/// Command line for a node setup task.
fn setup_command_line(script: &str, turn_ip: IpAddr, signaling_url: Option<&str>) -> String {
    let mut command = if script.ends_with(".ps1") {
        format!("powershell.exe -ExecutionPolicy Unrestricted -File {script}")
    } else {
        script.to_string()
    };
    command.push_str(&format!(" -turnServerIp {turn_ip}"));
    if let Some(url) = signaling_url {
        command.push_str(&format!(" -signalingServerUrl {url}"));
    }
    command
}
