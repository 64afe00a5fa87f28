//! The task approval sub-machine
//!
//! A task's overall status is computed from its per-assignee subtasks
//! (AND-join for Done, OR for In Progress) and an open status request
//! dominates as Pending Approval. Submit is only reachable once every
//! subtask is Done; the edge table expresses that by keying Submit on
//! the computed Done status.

use crate::edge::{find_edge, CommentRule, Edge, Guard};
use chrono::{DateTime, Utc};
use siteflow_types::{
    Action, ActionKind, ActionPayload, Actor, ApprovalState, Comment, EngineError, EngineEvent,
    EngineResult, StatusRequest, StatusRequestState, SubtaskStatus, TaskEntity, TaskStatus,
    WorkflowEntity,
};

/// The allowed-edge table for the task approval sub-machine.
///
/// `Submit`'s `from` is the computed aggregate: all subtasks Done with
/// no open request aggregates to Done, so a submission with any peer
/// still in progress finds no edge and fails as an invalid transition.
pub static TASK_EDGES: &[Edge<TaskStatus>] = &[
    Edge {
        action: ActionKind::Submit,
        from: TaskStatus::Done,
        to: TaskStatus::PendingApproval,
        guard: Guard::Assignee,
        comment: CommentRule::Optional,
    },
    Edge {
        action: ActionKind::Approve,
        from: TaskStatus::PendingApproval,
        to: TaskStatus::Done,
        guard: Guard::CreatorOrApprover,
        comment: CommentRule::Optional,
    },
    Edge {
        action: ActionKind::Return,
        from: TaskStatus::PendingApproval,
        to: TaskStatus::InProgress,
        guard: Guard::CreatorOrApprover,
        comment: CommentRule::Required,
    },
];

pub(crate) fn apply_task(
    task: &TaskEntity,
    action: &Action,
    actor: &Actor,
    now: DateTime<Utc>,
) -> EngineResult<(TaskEntity, Vec<EngineEvent>)> {
    if action.kind == ActionKind::UpdateSubtask {
        return update_subtask(task, action, actor, now);
    }

    let status = task.status();
    let edge =
        find_edge(TASK_EDGES, status, action.kind).ok_or(EngineError::InvalidTransition {
            action: action.kind,
            status: status.to_string(),
        })?;

    let entity_view = WorkflowEntity::Task(task.clone());
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

    let mut next = task.clone();
    match action.kind {
        ActionKind::Submit => {
            let attachment = match &action.payload {
                Some(ActionPayload::Attachment(url)) => Some(url.clone()),
                _ => None,
            };
            next.status_request = Some(StatusRequest {
                requested_by: actor.id.clone(),
                new_status: TaskStatus::Done,
                comment: action.comment_text().unwrap_or_default().to_string(),
                attachment,
                date: now,
                state: StatusRequestState::Pending,
            });
            next.approval_state = ApprovalState::StatusPending;
        }
        ActionKind::Approve => {
            next.status_request = None;
            next.approval_state = ApprovalState::Approved;
            next.completion_date = Some(now);
        }
        ActionKind::Return => {
            let Some(request) = next.status_request.take() else {
                return Err(EngineError::InvalidTransition {
                    action: action.kind,
                    status: status.to_string(),
                });
            };
            // The submitting assignee goes back to work
            next.subtasks
                .insert(request.requested_by, SubtaskStatus::InProgress);
            next.approval_state = ApprovalState::Returned;
        }
        _ => unreachable!("edge table only contains submit/approve/return"),
    }

    if let Some(text) = action.comment_text() {
        next.log
            .append(Comment::new(next.id.clone(), actor.id.clone(), text));
    }
    next.revision += 1;
    next.updated_at = now;

    let participants = WorkflowEntity::Task(next.clone()).participants();
    let notify: Vec<_> = participants
        .iter()
        .filter(|p| **p != actor.id)
        .cloned()
        .collect();
    next.log.reset_peers(&actor.id, &participants);

    let events = vec![EngineEvent::StatusChanged {
        entity_id: next.id.clone(),
        entity_label: "Task".to_string(),
        from: status.to_string(),
        to: next.status().to_string(),
        actor: actor.id.clone(),
        notify,
    }];
    Ok((next, events))
}

/// Mutate the acting assignee's own subtask and recompute the
/// aggregate. Blocked while a status request is open or after
/// approval.
fn update_subtask(
    task: &TaskEntity,
    action: &Action,
    actor: &Actor,
    now: DateTime<Utc>,
) -> EngineResult<(TaskEntity, Vec<EngineEvent>)> {
    let status = task.status();
    if status == TaskStatus::PendingApproval || task.approval_state == ApprovalState::Approved {
        return Err(EngineError::InvalidTransition {
            action: action.kind,
            status: status.to_string(),
        });
    }
    if !task.is_assignee(&actor.id) {
        return Err(EngineError::Unauthorized {
            actor: actor.id.clone(),
            action: action.kind,
            status: status.to_string(),
        });
    }
    let new_status = match &action.payload {
        Some(ActionPayload::Subtask { status }) => *status,
        _ => return Err(EngineError::MissingPayload(action.kind)),
    };

    let mut next = task.clone();
    next.subtasks.insert(actor.id.clone(), new_status);
    if let Some(text) = action.comment_text() {
        next.log
            .append(Comment::new(next.id.clone(), actor.id.clone(), text));
    }
    next.revision += 1;
    next.updated_at = now;

    let mut events = Vec::new();
    let new_overall = next.status();
    if new_overall != status || action.comment_text().is_some() {
        let participants = WorkflowEntity::Task(next.clone()).participants();
        let notify: Vec<_> = participants
            .iter()
            .filter(|p| **p != actor.id)
            .cloned()
            .collect();
        next.log.reset_peers(&actor.id, &participants);
        if new_overall != status {
            events.push(EngineEvent::StatusChanged {
                entity_id: next.id.clone(),
                entity_label: "Task".to_string(),
                from: status.to_string(),
                to: new_overall.to_string(),
                actor: actor.id.clone(),
                notify,
            });
        }
    }
    Ok((next, events))
}
