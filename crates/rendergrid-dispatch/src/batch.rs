//! Action batch types and wire encoding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::DispatchResult;

/// Scale direction for a group of rendering VMs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Up,
    Down,
}

/// One instruction within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBatchItem {
    pub action: Action,
    pub turn_server_id: u32,
    /// VM ids in the order given; duplicates are kept.
    pub vm_ids: Vec<u32>,
}

impl ActionBatchItem {
    pub fn new(action: Action, turn_server_id: u32, vm_ids: impl Into<Vec<u32>>) -> Self {
        Self {
            action,
            turn_server_id,
            vm_ids: vm_ids.into(),
        }
    }
}

/// An ordered sequence of items delivered as one message.
///
/// Serializes as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    items: Vec<ActionBatchItem>,
}

impl Batch {
    pub fn items(&self) -> &[ActionBatchItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Wire payload for this batch.
    pub fn to_payload(&self) -> DispatchResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Parse a batch from its wire payload.
    pub fn from_payload(payload: &[u8]) -> DispatchResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Collect items into a batch, preserving their order.
pub fn build_batch(items: impl IntoIterator<Item = ActionBatchItem>) -> Batch {
    Batch {
        items: items.into_iter().collect(),
    }
}
