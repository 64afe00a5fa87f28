//! The user directory boundary: actor id → contact details

use async_trait::async_trait;
use siteflow_types::ActorId;
use std::collections::HashMap;

/// One directory record
#[derive(Clone, Debug)]
pub struct DirectoryEntry {
    pub id: ActorId,
    pub display_name: String,
    pub email: String,
}

impl DirectoryEntry {
    pub fn new(
        id: ActorId,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            email: email.into(),
        }
    }
}

/// Contact resolution for notification recipients
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up an actor's contact record. None when unknown; the
    /// dispatcher skips unknown recipients rather than failing the
    /// whole notification.
    async fn lookup(&self, id: &ActorId) -> Option<DirectoryEntry>;
}

/// Fixed in-memory directory for tests and single-process deployments
#[derive(Clone, Debug, Default)]
pub struct InMemoryDirectory {
    entries: HashMap<ActorId, DirectoryEntry>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, entry: DirectoryEntry) -> Self {
        self.entries.insert(entry.id.clone(), entry);
        self
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn lookup(&self, id: &ActorId) -> Option<DirectoryEntry> {
        self.entries.get(id).cloned()
    }
}
