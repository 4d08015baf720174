//! rendergrid-capacity — rendering capacity planning.
//!
//! Sums the rendering slots a deployment has (or will shortly have) and
//! compares connected clients against that ceiling.
//!
//! # Capacity
//!
//! ```text
//! slots(pool) = max(observed target, pending intent) * slots_per_node
//! capacity    = Σ slots(pool) for every rendering pool, listed or pending
//!
//! approaching = clients > approaching_threshold * capacity
//! ```
//!
//! Pools that are still allocating count at their target size, so a
//! caller that just requested more nodes sees the extra headroom right
//! away. Deleted pools drop out on the next read.

pub mod error;
pub mod planner;

pub use error::{CapacityError, CapacityResult};
pub use planner::CapacityPlanner;
