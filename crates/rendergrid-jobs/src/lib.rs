//! rendergrid-jobs — job and task orchestration on rendering pools.
//!
//! A job binds to one steady pool. Adding rendering tasks schedules one
//! setup task per ready node, pointing the node at the TURN relay (and the
//! signaling server when one is configured). Monitoring polls until every
//! task completes and is fail-closed: the job succeeds only if every task
//! exited with code 0.
//!
//! # Job Phases
//!
//! ```text
//! Created → TasksAdded → Monitoring → Completed
//!                                   → PartiallyFailed
//!                                   → TimedOut | Cancelled
//! ```

pub mod error;
pub mod orchestrator;
pub mod report;

pub use error::{JobError, JobResult};
pub use orchestrator::{JobOrchestrator, TeardownSummary};
pub use report::{JobPhase, MonitorReport, TaskOutcome};
