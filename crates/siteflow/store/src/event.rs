//! Realtime change events

use crate::StorePath;
use serde_json::Value;

/// One change delivered to subscribers.
///
/// `seq` is the server-assigned commit sequence: every path written in
/// the same commit shares one sequence number, and subscribers observe
/// commits in sequence order.
#[derive(Clone, Debug)]
pub struct StoreEvent {
    pub seq: u64,
    pub path: StorePath,
    /// The new value, or None when the path was removed
    pub value: Option<Value>,
}
