//! Comments and the per-entity activity log
//!
//! The log is append-only and insertion-ordered; it IS the activity
//! timeline. Read state (`viewed_by`) is a separate per-actor boolean
//! map, mutated independently of comment content and ordering.

use crate::{ActorId, CommentId, EntityId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── Comment ──────────────────────────────────────────────────────────

/// A single comment on a workflow entity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier
    pub id: CommentId,
    /// Who wrote it
    pub author: ActorId,
    /// The comment body
    pub text: String,
    /// Creation timestamp, immutable
    pub created_at: DateTime<Utc>,
    /// Back-reference to the owning entity; the entity owns the
    /// sequence, this is navigation only
    pub entity_id: EntityId,
}

impl Comment {
    pub fn new(entity_id: EntityId, author: ActorId, text: impl Into<String>) -> Self {
        Self {
            id: CommentId::generate(),
            author,
            text: text.into(),
            created_at: Utc::now(),
            entity_id,
        }
    }
}

// ── Activity Log ─────────────────────────────────────────────────────

/// Append-only comment timeline plus per-actor viewed flags
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    /// Insertion-ordered comment sequence
    pub comments: Vec<Comment>,
    /// Per-actor read state; absent means never viewed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub viewed_by: BTreeMap<ActorId, bool>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a comment. Never reorders, never replaces.
    pub fn append(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Mark the log as viewed by an actor. Idempotent.
    ///
    /// Returns true if the flag actually changed.
    pub fn mark_viewed(&mut self, actor: &ActorId) -> bool {
        match self.viewed_by.insert(actor.clone(), true) {
            Some(true) => false,
            _ => true,
        }
    }

    /// Reset every participant's viewed flag except the acting actor's,
    /// whose flag is set. Called on every comment append and status
    /// change.
    pub fn reset_peers(&mut self, acting: &ActorId, participants: &BTreeSet<ActorId>) {
        for participant in participants {
            if participant != acting {
                self.viewed_by.insert(participant.clone(), false);
            }
        }
        self.viewed_by.insert(acting.clone(), true);
    }

    /// Whether an actor has viewed the log since the last activity
    pub fn viewed(&self, actor: &ActorId) -> bool {
        self.viewed_by.get(actor).copied().unwrap_or(false)
    }

    /// All distinct comment authors, in no particular order
    pub fn authors(&self) -> BTreeSet<ActorId> {
        self.comments.iter().map(|c| c.author.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// The most recent comment, if any
    pub fn latest(&self) -> Option<&Comment> {
        self.comments.last()
    }
}
