//! The durable outbox
//!
//! Entries live in the entity store under `outbox/<push-key>`, so
//! pending notifications survive restarts and the dispatcher can drain
//! them from any process with store access.

use crate::{NotifyError, NotifyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siteflow_store::{EntityStore, StorePath};
use siteflow_types::EngineEvent;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Store path the outbox lives under
pub const OUTBOX_ROOT: &str = "outbox";

/// Delivery state of one outbox entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Sent { at: DateTime<Utc> },
    /// Exhausted its attempts; kept for inspection, never retried
    Dead,
}

/// One enqueued engine event with its delivery bookkeeping
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub event: EngineEvent,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
}

impl OutboxEntry {
    pub fn new(event: EngineEvent, now: DateTime<Utc>) -> Self {
        Self {
            event,
            status: DeliveryStatus::Pending,
            attempts: 0,
            enqueued_at: now,
            next_attempt_at: now,
        }
    }

    /// Whether this entry should be attempted now
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        self.status == DeliveryStatus::Pending && self.next_attempt_at <= now
    }
}

/// Store-backed notification queue
pub struct Outbox<S> {
    store: Arc<S>,
    root: StorePath,
}

impl<S> Clone for Outbox<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            root: self.root.clone(),
        }
    }
}

impl<S: EntityStore> Outbox<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            root: StorePath::new(OUTBOX_ROOT),
        }
    }

    /// Enqueue one event; returns the entry's store path
    pub async fn enqueue(&self, event: EngineEvent) -> NotifyResult<StorePath> {
        let entry = OutboxEntry::new(event, Utc::now());
        let value = serde_json::to_value(&entry)?;
        let path = self.store.push(&self.root, value).await?;
        tracing::debug!(path = %path, "notification enqueued");
        Ok(path)
    }

    /// Enqueue every event in order
    pub async fn enqueue_all(&self, events: &[EngineEvent]) -> NotifyResult<()> {
        for event in events {
            self.enqueue(event.clone()).await?;
        }
        Ok(())
    }

    /// All entries in enqueue order (push keys sort by creation time)
    pub async fn entries(&self) -> NotifyResult<BTreeMap<StorePath, OutboxEntry>> {
        let mut entries = BTreeMap::new();
        let Some(value) = self.store.read(&self.root).await? else {
            return Ok(entries);
        };
        let Some(children) = value.as_object() else {
            return Ok(entries);
        };
        for (key, child) in children {
            match serde_json::from_value::<OutboxEntry>(child.clone()) {
                Ok(entry) => {
                    entries.insert(self.root.child(key), entry);
                }
                Err(error) => {
                    // A malformed entry must not wedge the queue
                    tracing::warn!(key = %key, %error, "skipping malformed outbox entry");
                }
            }
        }
        Ok(entries)
    }

    /// Persist updated bookkeeping for one entry
    pub async fn save(&self, path: &StorePath, entry: &OutboxEntry) -> NotifyResult<()> {
        let value = serde_json::to_value(entry)?;
        self.store.write(path, value).await.map_err(NotifyError::from)
    }

    /// Count of entries still pending
    pub async fn pending_count(&self) -> NotifyResult<usize> {
        Ok(self
            .entries()
            .await?
            .values()
            .filter(|entry| entry.status == DeliveryStatus::Pending)
            .count())
    }
}
