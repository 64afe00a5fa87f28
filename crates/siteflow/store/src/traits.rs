//! The entity store boundary trait

use crate::{StoreEvent, StorePath, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::broadcast;

/// Path-addressed key-value persistence with realtime push.
///
/// `update` is an atomic multi-path merge: every path lands or none
/// does. `update_guarded` additionally pins one guard document to its
/// expected value, failing the whole merge with
/// [`StoreError::Conflict`](crate::StoreError::Conflict) if another
/// writer got there first: a single conditional write instead of the
/// read-then-recheck dance.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Read the value at a path: the document stored there, or the
    /// assembled subtree of documents below it. None when neither
    /// exists.
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>>;

    /// Write a document, replacing anything at or below the path
    async fn write(&self, path: &StorePath, value: Value) -> StoreResult<()>;

    /// Atomic multi-path merge. `Some(value)` writes, `None` deletes
    /// the subtree.
    async fn update(&self, changes: BTreeMap<StorePath, Option<Value>>) -> StoreResult<()>;

    /// Atomic multi-path merge, applied only if the guard path still
    /// holds `expected` (None = absent)
    async fn update_guarded(
        &self,
        guard: &StorePath,
        expected: Option<&Value>,
        changes: BTreeMap<StorePath, Option<Value>>,
    ) -> StoreResult<()>;

    /// Write under a generated child key and return its path. Keys
    /// sort in creation order.
    async fn push(&self, path: &StorePath, value: Value) -> StoreResult<StorePath>;

    /// Delete the path and everything below it
    async fn remove(&self, path: &StorePath) -> StoreResult<()>;

    /// Subscribe to changes at or below a prefix. Events arrive in
    /// commit order.
    fn subscribe(&self, prefix: &StorePath) -> broadcast::Receiver<StoreEvent>;

    /// Conditionally replace a single document
    async fn compare_and_swap(
        &self,
        path: &StorePath,
        expected: Option<&Value>,
        new: Value,
    ) -> StoreResult<()> {
        let mut changes = BTreeMap::new();
        changes.insert(path.clone(), Some(new));
        self.update_guarded(path, expected, changes).await
    }
}
