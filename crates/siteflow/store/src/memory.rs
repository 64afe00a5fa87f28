//! In-memory store for development, testing and single-process use
//!
//! Documents live in a concurrent flat map keyed by exact path; commits
//! serialize through one mutex that also assigns sequence numbers, so
//! multi-path updates are atomic and subscribers observe commits in
//! order.

use crate::{EntityStore, StoreError, StoreEvent, StorePath, StoreResult};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Broadcast channel capacity per subscribed prefix
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// In-memory [`EntityStore`] implementation
pub struct InMemoryStore {
    /// Documents by exact path
    tree: DashMap<StorePath, Value>,
    /// Subscribers by prefix, created on demand
    subscribers: DashMap<StorePath, broadcast::Sender<StoreEvent>>,
    /// Commit lock doubling as the sequence counter
    commit: Mutex<u64>,
    capacity: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tree: DashMap::new(),
            subscribers: DashMap::new(),
            commit: Mutex::new(0),
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Number of documents currently stored
    pub fn document_count(&self) -> usize {
        self.tree.len()
    }

    /// Apply a change set under the commit lock, emitting events
    fn commit_changes(
        &self,
        guard: Option<(&StorePath, Option<&Value>)>,
        changes: BTreeMap<StorePath, Option<Value>>,
    ) -> StoreResult<()> {
        let mut seq = self.commit.lock().expect("commit lock poisoned");

        if let Some((guard_path, expected)) = guard {
            let current = self.tree.get(guard_path).map(|entry| entry.value().clone());
            if current.as_ref() != expected {
                tracing::debug!(path = %guard_path, "guarded update rejected");
                return Err(StoreError::Conflict(guard_path.clone()));
            }
        }

        *seq += 1;
        let seq_no = *seq;

        for (path, value) in changes {
            // A write at a path replaces the whole subtree below it
            self.remove_descendants(&path);
            match value {
                Some(value) => {
                    self.tree.insert(path.clone(), value.clone());
                    self.notify(seq_no, &path, Some(value));
                }
                None => {
                    self.tree.remove(&path);
                    self.notify(seq_no, &path, None);
                }
            }
        }
        Ok(())
    }

    fn remove_descendants(&self, path: &StorePath) {
        let descendants: Vec<StorePath> = self
            .tree
            .iter()
            .filter(|entry| entry.key() != path && entry.key().starts_with(path))
            .map(|entry| entry.key().clone())
            .collect();
        for descendant in descendants {
            self.tree.remove(&descendant);
        }
    }

    fn notify(&self, seq: u64, path: &StorePath, value: Option<Value>) {
        for entry in self.subscribers.iter() {
            let prefix = entry.key();
            if path.starts_with(prefix) || prefix.starts_with(path) {
                // Ignore lagging or dropped receivers
                let _ = entry.value().send(StoreEvent {
                    seq,
                    path: path.clone(),
                    value: value.clone(),
                });
            }
        }
    }

    /// Assemble the subtree below a prefix into a nested object
    fn assemble(&self, prefix: &StorePath) -> Option<Value> {
        let mut root = serde_json::Map::new();
        let mut found = false;
        for entry in self.tree.iter() {
            if entry.key() == prefix || !entry.key().starts_with(prefix) {
                continue;
            }
            if let Some(relative) = entry.key().relative_to(prefix) {
                found = true;
                insert_nested(&mut root, &relative, entry.value().clone());
            }
        }
        found.then_some(Value::Object(root))
    }
}

fn insert_nested(map: &mut serde_json::Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            map.insert((*leaf).to_string(), value);
        }
        [first, rest @ ..] => {
            let entry = map
                .entry((*first).to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Value::Object(inner) = entry {
                insert_nested(inner, rest, value);
            }
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        // Readers serialize on the commit lock so a multi-path update
        // is never observed half-applied
        let _commit = self.commit.lock().expect("commit lock poisoned");
        if let Some(entry) = self.tree.get(path) {
            return Ok(Some(entry.value().clone()));
        }
        Ok(self.assemble(path))
    }

    async fn write(&self, path: &StorePath, value: Value) -> StoreResult<()> {
        let mut changes = BTreeMap::new();
        changes.insert(path.clone(), Some(value));
        self.commit_changes(None, changes)
    }

    async fn update(&self, changes: BTreeMap<StorePath, Option<Value>>) -> StoreResult<()> {
        self.commit_changes(None, changes)
    }

    async fn update_guarded(
        &self,
        guard: &StorePath,
        expected: Option<&Value>,
        changes: BTreeMap<StorePath, Option<Value>>,
    ) -> StoreResult<()> {
        self.commit_changes(Some((guard, expected)), changes)
    }

    async fn push(&self, path: &StorePath, value: Value) -> StoreResult<StorePath> {
        let child = path.child(crate::push_key(chrono::Utc::now()));
        self.write(&child, value).await?;
        Ok(child)
    }

    async fn remove(&self, path: &StorePath) -> StoreResult<()> {
        let mut changes = BTreeMap::new();
        changes.insert(path.clone(), None);
        self.commit_changes(None, changes)
    }

    fn subscribe(&self, prefix: &StorePath) -> broadcast::Receiver<StoreEvent> {
        self.subscribers
            .entry(prefix.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}
