//! rendergrid-pools — pool lifecycle management.
//!
//! Creates, resizes and deletes TURN relay pools and rendering pools
//! through a [`BatchBackend`](rendergrid_state::BatchBackend), and drives
//! each pool towards a desired allocation or node state by polling.
//!
//! # Architecture
//!
//! ```text
//! PoolManager
//!   ├── BatchBackend (create / resize / delete / read pools and nodes)
//!   ├── DeploymentConfig (pool profiles, resize ceilings, poll interval)
//!   ├── AllocationIntents (in-flight create/resize targets, read by the planner)
//!   └── poll_until (fixed-interval, timeout-bounded, cancellable wait)
//! ```
//!
//! Per pool: `Requested → Provisioning → Steady`, or `→ Failed` when the
//! backend gives up on the allocation. `Resizing` is re-entered on every
//! capacity change.

pub mod error;
pub mod manager;
pub mod poll;

pub use error::{PoolError, PoolResult};
pub use manager::PoolManager;
pub use poll::{CancelSignal, PollOutcome, poll_until};
