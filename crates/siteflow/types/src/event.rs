//! Engine events: the side effects a transition produces
//!
//! The engine never performs side effects itself: it emits these and
//! the service/dispatcher layers carry them out after the commit.

use crate::{ActorId, CommentId, EntityId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A PPE issuance history record, appended to the employee's history
/// on every issuance (reissues append a second record, never replace)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub item_code: String,
    pub description: String,
    pub quantity: u32,
    pub issue_date: DateTime<Utc>,
    pub issued_by: ActorId,
}

/// A side effect emitted by the workflow engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// The entity's status changed; `notify` lists the actors to mail
    StatusChanged {
        entity_id: EntityId,
        /// Variant label for notification wording ("PPE Request")
        entity_label: String,
        from: String,
        to: String,
        actor: ActorId,
        notify: Vec<ActorId>,
    },

    /// A comment was appended without a status change
    CommentAdded {
        entity_id: EntityId,
        comment_id: CommentId,
        author: ActorId,
        notify: Vec<ActorId>,
    },

    /// Stock for an item must decrease by `quantity`, clamped at zero
    StockDecremented { item_code: String, quantity: u32 },

    /// An issuance record must be appended to the employee's history
    HistoryAppended { employee: ActorId, record: IssueRecord },

    /// A terminal entity was reopened as a fresh linked entity
    Reopened {
        original: EntityId,
        successor: EntityId,
        actor: ActorId,
        notify: Vec<ActorId>,
    },
}

impl EngineEvent {
    /// Actors this event wants notified, empty for internal effects
    pub fn recipients(&self) -> &[ActorId] {
        match self {
            EngineEvent::StatusChanged { notify, .. } => notify,
            EngineEvent::CommentAdded { notify, .. } => notify,
            EngineEvent::Reopened { notify, .. } => notify,
            EngineEvent::StockDecremented { .. } | EngineEvent::HistoryAppended { .. } => &[],
        }
    }
}
