//! The timesheet machine: a linear chain with one rejection branch
//!
//! Pending → Acknowledged → Sent To Office → Office Acknowledged, with
//! Rejected branching off Sent To Office and `reply` re-entering
//! Acknowledged. Forward edges are gated by who the actor is (the
//! recipient) versus what they hold (the office capability).

use crate::edge::{find_edge, CommentRule, Edge, Guard};
use chrono::{DateTime, Utc};
use siteflow_types::{
    Action, ActionKind, Actor, Capability, Comment, EngineError, EngineEvent, EngineResult,
    TimesheetEntity, TimesheetStatus, WorkflowEntity,
};

/// The allowed-edge table for timesheets
pub static TIMESHEET_EDGES: &[Edge<TimesheetStatus>] = &[
    Edge {
        action: ActionKind::Acknowledge,
        from: TimesheetStatus::Pending,
        to: TimesheetStatus::Acknowledged,
        guard: Guard::Requester,
        comment: CommentRule::Optional,
    },
    Edge {
        action: ActionKind::SendToOffice,
        from: TimesheetStatus::Acknowledged,
        to: TimesheetStatus::SentToOffice,
        guard: Guard::Requester,
        comment: CommentRule::Optional,
    },
    Edge {
        action: ActionKind::OfficeAcknowledge,
        from: TimesheetStatus::SentToOffice,
        to: TimesheetStatus::OfficeAcknowledged,
        guard: Guard::Capability(Capability::OfficeAcknowledge),
        comment: CommentRule::Optional,
    },
    Edge {
        action: ActionKind::Reject,
        from: TimesheetStatus::SentToOffice,
        to: TimesheetStatus::Rejected,
        guard: Guard::Capability(Capability::OfficeAcknowledge),
        comment: CommentRule::Required,
    },
    Edge {
        action: ActionKind::Reply,
        from: TimesheetStatus::Rejected,
        to: TimesheetStatus::Acknowledged,
        guard: Guard::Requester,
        comment: CommentRule::Required,
    },
];

pub(crate) fn apply_timesheet(
    timesheet: &TimesheetEntity,
    action: &Action,
    actor: &Actor,
    now: DateTime<Utc>,
) -> EngineResult<(TimesheetEntity, Vec<EngineEvent>)> {
    let status = timesheet.status;
    let edge =
        find_edge(TIMESHEET_EDGES, status, action.kind).ok_or(EngineError::InvalidTransition {
            action: action.kind,
            status: status.to_string(),
        })?;

    let entity_view = WorkflowEntity::Timesheet(timesheet.clone());
    if !edge.guard.check(&entity_view, actor) {
        return Err(EngineError::Unauthorized {
            actor: actor.id.clone(),
            action: action.kind,
            status: status.to_string(),
        });
    }
    if edge.comment == CommentRule::Required && action.comment_text().is_none() {
        return Err(EngineError::CommentRequired(action.kind));
    }

    let mut next = timesheet.clone();
    next.status = edge.to;
    if let Some(text) = action.comment_text() {
        next.log
            .append(Comment::new(next.id.clone(), actor.id.clone(), text));
    }
    next.revision += 1;
    next.updated_at = now;

    let participants = WorkflowEntity::Timesheet(next.clone()).participants();
    let notify: Vec<_> = participants
        .iter()
        .filter(|p| **p != actor.id)
        .cloned()
        .collect();
    next.log.reset_peers(&actor.id, &participants);

    let events = vec![EngineEvent::StatusChanged {
        entity_id: next.id.clone(),
        entity_label: "Timesheet".to_string(),
        from: status.to_string(),
        to: edge.to.to_string(),
        actor: actor.id.clone(),
        notify,
    }];
    Ok((next, events))
}
