//! Job phases and monitoring reports.

use serde::{Deserialize, Serialize};

use rendergrid_state::{JobId, NodeId, Task, TaskId, TaskState};

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// The job exists but holds no tasks.
    Created,
    /// Tasks were submitted and none has started.
    TasksAdded,
    /// At least one task has started and not all have completed.
    Monitoring,
    /// Every task completed with exit code 0.
    Completed,
    /// Every task completed and at least one did not exit with 0.
    PartiallyFailed,
    /// The monitoring deadline passed before every task completed.
    TimedOut,
    /// Monitoring was cancelled before every task completed.
    Cancelled,
}

impl JobPhase {
    /// Derive the phase from a task snapshot.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        if tasks.is_empty() {
            return JobPhase::Created;
        }
        if tasks.iter().all(Task::is_completed) {
            if tasks.iter().all(Task::succeeded) {
                JobPhase::Completed
            } else {
                JobPhase::PartiallyFailed
            }
        } else if tasks.iter().all(|t| t.state == TaskState::Active) {
            JobPhase::TasksAdded
        } else {
            JobPhase::Monitoring
        }
    }
}

/// Last observed state of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub node_id: Option<NodeId>,
    pub state: TaskState,
    pub exit_code: Option<i32>,
}

impl TaskOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == TaskState::Completed && self.exit_code == Some(0)
    }
}

impl From<&Task> for TaskOutcome {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            node_id: task.node_id.clone(),
            state: task.state,
            exit_code: task.exit_code,
        }
    }
}

/// Result of monitoring a job's tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub job_id: JobId,
    pub phase: JobPhase,
    /// Per-task outcomes from the last poll, ordered by task id.
    pub tasks: Vec<TaskOutcome>,
}

impl MonitorReport {
    /// True iff every task completed with exit code 0.
    pub fn succeeded(&self) -> bool {
        self.phase == JobPhase::Completed
    }

    /// Tasks that did not succeed (still pending or non-zero exit).
    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.tasks.iter().filter(|t| !t.succeeded())
    }
}
