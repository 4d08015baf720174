//! rendergrid-dispatch — action batch delivery.
//!
//! An action batch tells the orchestration side which rendering VMs to bring
//! up or down behind which TURN server. A batch is serialized once and handed
//! to a [`MessageChannel`] as a single message:
//!
//! ```json
//! [{"action":"up","turnServerId":1,"vmIds":[1,2,3,4]},
//!  {"action":"down","turnServerId":2,"vmIds":[1,2,3,4]}]
//! ```
//!
//! Dispatch is fire-and-forget: there is no acknowledgement wait and no
//! retry, and nothing here reads pool or job state.

pub mod batch;
pub mod channel;
pub mod dispatcher;
pub mod error;

pub use batch::{Action, ActionBatchItem, Batch, build_batch};
pub use channel::{HttpChannel, MessageChannel, QueueChannel};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
