//! Dispatcher — sends an action batch as exactly one message.

use std::sync::Arc;

use tracing::{info, warn};

use crate::batch::Batch;
use crate::channel::MessageChannel;
use crate::error::DispatchResult;

/// Delivers action batches over a message channel.
#[derive(Clone)]
pub struct Dispatcher {
    channel: Arc<dyn MessageChannel>,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self { channel }
    }

    /// Encode `batch` and hand it to the channel in a single send.
    ///
    /// An empty batch is still sent (as `[]`). Failures are returned to the
    /// caller untouched; nothing is retried.
    pub async fn dispatch(&self, batch: &Batch) -> DispatchResult<()> {
        let payload = batch.to_payload()?;
        let bytes = payload.len();

        match self.channel.send(payload).await {
            Ok(()) => {
                info!(
                    channel = %self.channel.describe(),
                    items = batch.len(),
                    bytes,
                    "action batch dispatched"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    channel = %self.channel.describe(),
                    items = batch.len(),
                    error = %e,
                    "action batch dispatch failed"
                );
                Err(e)
            }
        }
    }
}
