//! rendergrid-state — domain model and batch backend contract for RenderGrid.
//!
//! The controller never talks to the cloud batch service directly; every
//! pool, node, job and task operation goes through the [`BatchBackend`]
//! trait. Resources are addressed by opaque string ids, never by live
//! references, so a backend may delete a resource while a caller is still
//! polling it.
//!
//! [`StateStore`] is a [redb](https://docs.rs/redb)-backed implementation
//! of the contract, used for local development and tests. It stores every
//! record as JSON and exposes a few helpers (`settle_pool`, `fail_pool`,
//! `complete_task`) that play the part of the remote service advancing
//! resource state.
//!
//! [`AllocationIntents`] is the in-process ledger of create/resize requests
//! that have been issued but not yet observed as complete. The pool manager
//! writes it; the capacity planner reads it.

pub mod backend;
pub mod error;
pub mod intents;
pub mod store;
pub mod tables;
pub mod types;

pub use backend::BatchBackend;
pub use error::{StateError, StateResult};
pub use intents::{AllocationIntent, AllocationIntents};
pub use store::StateStore;
pub use types::*;
