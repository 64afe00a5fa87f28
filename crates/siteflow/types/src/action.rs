//! Actions: what an actor is trying to do to an entity

use crate::{ActorId, SubtaskStatus};
use serde::{Deserialize, Serialize};

/// The kind of action being attempted.
///
/// One kind may appear in several variants' edge tables (Approve is an
/// edge for requests, tasks and nothing else); resolution happens per
/// variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    // Generic request machine
    Approve,
    Reject,
    Issue,
    Dispute,
    Resolve,

    // Task machine
    Submit,
    Return,
    UpdateSubtask,

    // Timesheet machine
    Acknowledge,
    SendToOffice,
    OfficeAcknowledge,
    Reply,

    // Cross-variant operations
    Comment,
    MarkViewed,
    AcknowledgeRejection,
    Reopen,
    Purge,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ActionKind::Approve => "approve",
            ActionKind::Reject => "reject",
            ActionKind::Issue => "issue",
            ActionKind::Dispute => "dispute",
            ActionKind::Resolve => "resolve",
            ActionKind::Submit => "submit",
            ActionKind::Return => "return",
            ActionKind::UpdateSubtask => "update-subtask",
            ActionKind::Acknowledge => "acknowledge",
            ActionKind::SendToOffice => "send-to-office",
            ActionKind::OfficeAcknowledge => "office-acknowledge",
            ActionKind::Reply => "reply",
            ActionKind::Comment => "comment",
            ActionKind::MarkViewed => "mark-viewed",
            ActionKind::AcknowledgeRejection => "acknowledge-rejection",
            ActionKind::Reopen => "reopen",
            ActionKind::Purge => "purge",
        };
        write!(f, "{}", label)
    }
}

/// How a disputed issuance is resolved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveDisposition {
    /// Loop back to Issued via a fresh issuance
    Reissue,
    /// Treat as a terminal rejection
    Reverse,
}

/// Action-specific data beyond the comment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActionPayload {
    /// New status for the acting assignee's subtask
    Subtask { status: SubtaskStatus },
    /// Disposition of a dispute resolution
    Resolution(ResolveDisposition),
    /// Attachment URL accompanying a task submission
    Attachment(String),
}

/// An action attempt: kind, actor, optional justification, optional
/// payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub actor: ActorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ActionPayload>,
}

impl Action {
    pub fn new(kind: ActionKind, actor: ActorId) -> Self {
        Self {
            kind,
            actor,
            comment: None,
            payload: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_payload(mut self, payload: ActionPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// The trimmed comment, if present and non-empty
    pub fn comment_text(&self) -> Option<&str> {
        self.comment
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_text_trims_and_rejects_blank() {
        let actor = ActorId::new("a");
        let action = Action::new(ActionKind::Reject, actor.clone()).with_comment("  too worn  ");
        assert_eq!(action.comment_text(), Some("too worn"));

        let blank = Action::new(ActionKind::Reject, actor.clone()).with_comment("   ");
        assert_eq!(blank.comment_text(), None);

        let missing = Action::new(ActionKind::Reject, actor);
        assert_eq!(missing.comment_text(), None);
    }
}
