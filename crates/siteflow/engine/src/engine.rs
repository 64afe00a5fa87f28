//! The engine facade: dispatch, comments, read-state and reopen
//!
//! `apply` resolves status transitions through the variant tables;
//! comment appends, viewed flags and rejection acknowledgements are
//! field-level operations that never move status.

use crate::request::apply_request;
use crate::task::apply_task;
use crate::timesheet::apply_timesheet;
use chrono::Utc;
use siteflow_types::{
    Action, ActionKind, Actor, Capability, Comment, EngineError, EngineEvent, EngineResult,
    RequestEntity, RequestStatus, SubtaskStatus, TaskEntity, TimesheetEntity, TimesheetStatus,
    WorkflowEntity,
};

/// A successful transition: the next entity state plus the side
/// effects to carry out after commit
#[derive(Clone, Debug)]
pub struct Transition {
    pub entity: WorkflowEntity,
    pub events: Vec<EngineEvent>,
}

/// The workflow engine: pure, synchronous, variant-agnostic
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkflowEngine;

impl WorkflowEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply an action to an entity.
    ///
    /// Status transitions go through the variant's edge table; comment
    /// appends are handled uniformly across variants. Reopen and purge
    /// are entity-creating/destroying operations with their own entry
    /// points ([`WorkflowEngine::reopen`],
    /// [`WorkflowEngine::authorize_purge`]) and are rejected here.
    pub fn apply(
        &self,
        entity: &WorkflowEntity,
        action: &Action,
        actor: &Actor,
    ) -> EngineResult<Transition> {
        if action.actor != actor.id {
            return Err(EngineError::Unauthorized {
                actor: actor.id.clone(),
                action: action.kind,
                status: entity.status_label(),
            });
        }

        let transition = match action.kind {
            ActionKind::Comment => self.append_comment(entity, action, actor)?,
            ActionKind::MarkViewed => {
                let (entity, _) = self.mark_viewed(entity, actor)?;
                Transition {
                    entity,
                    events: Vec::new(),
                }
            }
            ActionKind::AcknowledgeRejection => {
                let (entity, _) = self.acknowledge_rejection(entity, actor)?;
                Transition {
                    entity,
                    events: Vec::new(),
                }
            }
            ActionKind::Reopen | ActionKind::Purge => {
                return Err(EngineError::InvalidTransition {
                    action: action.kind,
                    status: entity.status_label(),
                })
            }
            _ => self.apply_transition(entity, action, actor)?,
        };

        tracing::debug!(
            entity_id = %transition.entity.id(),
            action = %action.kind,
            actor = %actor.id,
            status = %transition.entity.status_label(),
            "action applied"
        );
        Ok(transition)
    }

    fn apply_transition(
        &self,
        entity: &WorkflowEntity,
        action: &Action,
        actor: &Actor,
    ) -> EngineResult<Transition> {
        let now = Utc::now();
        let (entity, events) = match entity {
            WorkflowEntity::Request(request) => {
                let (next, events) = apply_request(request, action, actor, now)?;
                (WorkflowEntity::Request(next), events)
            }
            WorkflowEntity::Task(task) => {
                let (next, events) = apply_task(task, action, actor, now)?;
                (WorkflowEntity::Task(next), events)
            }
            WorkflowEntity::Timesheet(timesheet) => {
                let (next, events) = apply_timesheet(timesheet, action, actor, now)?;
                (WorkflowEntity::Timesheet(next), events)
            }
        };
        Ok(Transition { entity, events })
    }

    /// Append a comment without changing status. Peers' viewed flags
    /// reset; the revision is NOT bumped, so racing comments merge
    /// rather than conflict.
    fn append_comment(
        &self,
        entity: &WorkflowEntity,
        action: &Action,
        actor: &Actor,
    ) -> EngineResult<Transition> {
        let Some(text) = action.comment_text() else {
            return Err(EngineError::CommentRequired(ActionKind::Comment));
        };
        self.require_participant(entity, actor, ActionKind::Comment)?;

        let mut next = entity.clone();
        let comment = Comment::new(next.id().clone(), actor.id.clone(), text);
        let comment_id = comment.id.clone();
        next.log_mut().append(comment);
        let participants = next.participants();
        next.log_mut().reset_peers(&actor.id, &participants);
        next.touch(Utc::now());

        let notify: Vec<_> = participants
            .into_iter()
            .filter(|p| p != &actor.id)
            .collect();
        let events = vec![EngineEvent::CommentAdded {
            entity_id: next.id().clone(),
            comment_id,
            author: actor.id.clone(),
            notify,
        }];
        Ok(Transition {
            entity: next,
            events,
        })
    }

    /// Mark the entity viewed by the actor. Idempotent: the returned
    /// bool is false when nothing changed, so callers can skip the
    /// write entirely.
    pub fn mark_viewed(
        &self,
        entity: &WorkflowEntity,
        actor: &Actor,
    ) -> EngineResult<(WorkflowEntity, bool)> {
        self.require_participant(entity, actor, ActionKind::MarkViewed)?;
        let mut next = entity.clone();
        let changed = next.log_mut().mark_viewed(&actor.id);
        Ok((next, changed))
    }

    /// The requester acknowledges a terminal rejection. Idempotent,
    /// requester-only, never moves status.
    pub fn acknowledge_rejection(
        &self,
        entity: &WorkflowEntity,
        actor: &Actor,
    ) -> EngineResult<(WorkflowEntity, bool)> {
        if entity.owner() != &actor.id {
            return Err(EngineError::Unauthorized {
                actor: actor.id.clone(),
                action: ActionKind::AcknowledgeRejection,
                status: entity.status_label(),
            });
        }
        let rejected = match entity {
            WorkflowEntity::Request(r) => r.status == RequestStatus::Rejected,
            WorkflowEntity::Timesheet(t) => t.status == TimesheetStatus::Rejected,
            WorkflowEntity::Task(_) => false,
        };
        if !rejected {
            return Err(EngineError::InvalidTransition {
                action: ActionKind::AcknowledgeRejection,
                status: entity.status_label(),
            });
        }
        if entity.acknowledged_by_requester() {
            return Ok((entity.clone(), false));
        }
        let mut next = entity.clone();
        next.set_acknowledged_by_requester(true);
        Ok((next, true))
    }

    /// Reopen a terminal entity as a fresh linked entity.
    ///
    /// The original is never mutated: the successor starts at the
    /// variant's initial status with the payload carried over and
    /// `reopened_from` pointing back.
    pub fn reopen(&self, entity: &WorkflowEntity, actor: &Actor) -> EngineResult<Transition> {
        if !entity.is_terminal() {
            return Err(EngineError::InvalidTransition {
                action: ActionKind::Reopen,
                status: entity.status_label(),
            });
        }
        if entity.owner() != &actor.id && !actor.has_capability(Capability::Administer) {
            return Err(EngineError::Unauthorized {
                actor: actor.id.clone(),
                action: ActionKind::Reopen,
                status: entity.status_label(),
            });
        }

        let successor = match entity {
            WorkflowEntity::Request(original) => {
                let mut fresh = RequestEntity::new(original.kind, original.requester.clone());
                fresh.items = original.items.clone();
                fresh.attachments = original.attachments.clone();
                fresh.reopened_from = Some(original.id.clone());
                WorkflowEntity::Request(fresh)
            }
            WorkflowEntity::Task(original) => {
                let mut fresh = TaskEntity::new(original.title.clone(), original.creator.clone());
                for assignee in &original.assignees {
                    fresh.subtasks.insert(assignee.clone(), SubtaskStatus::ToDo);
                    fresh.assignees.push(assignee.clone());
                }
                fresh.approver = original.approver.clone();
                fresh.reopened_from = Some(original.id.clone());
                WorkflowEntity::Task(fresh)
            }
            WorkflowEntity::Timesheet(original) => {
                let mut fresh =
                    TimesheetEntity::new(original.recipient.clone(), original.period.clone());
                fresh.lines = original.lines.clone();
                fresh.reopened_from = Some(original.id.clone());
                WorkflowEntity::Timesheet(fresh)
            }
        };

        let notify: Vec<_> = entity
            .participants()
            .into_iter()
            .filter(|p| p != &actor.id)
            .collect();
        let events = vec![EngineEvent::Reopened {
            original: entity.id().clone(),
            successor: successor.id().clone(),
            actor: actor.id.clone(),
            notify,
        }];

        tracing::info!(
            original = %entity.id(),
            successor = %successor.id(),
            actor = %actor.id,
            "entity reopened"
        );
        Ok(Transition {
            entity: successor,
            events,
        })
    }

    /// Only administrators may purge; the purge itself (entity subtree,
    /// comments, attachment references) is carried out by the service.
    pub fn authorize_purge(&self, entity: &WorkflowEntity, actor: &Actor) -> EngineResult<()> {
        if !actor.has_capability(Capability::Administer) {
            return Err(EngineError::Unauthorized {
                actor: actor.id.clone(),
                action: ActionKind::Purge,
                status: entity.status_label(),
            });
        }
        Ok(())
    }

    /// Comment appends and read-state flips are open to anyone already
    /// attached to the entity, plus capability holders who act on it.
    fn require_participant(
        &self,
        entity: &WorkflowEntity,
        actor: &Actor,
        action: ActionKind,
    ) -> EngineResult<()> {
        if entity.participants().contains(&actor.id) || actor.has_any_capability() {
            return Ok(());
        }
        Err(EngineError::Unauthorized {
            actor: actor.id.clone(),
            action,
            status: entity.status_label(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteflow_types::{ActorId, RequestItem, RequestKind};

    fn make_request_entity() -> WorkflowEntity {
        WorkflowEntity::Request(
            RequestEntity::new(RequestKind::Ppe, ActorId::new("requester"))
                .with_item(RequestItem::new("HELMET", "Safety helmet", 1)),
        )
    }

    fn requester() -> Actor {
        Actor::new(ActorId::new("requester"), "Requester")
    }

    #[test]
    fn test_actor_mismatch_is_unauthorized() {
        let engine = WorkflowEngine::new();
        let entity = make_request_entity();
        let actor = requester();
        let action = Action::new(ActionKind::Comment, ActorId::new("someone-else"));

        let err = engine.apply(&entity, &action, &actor).unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));
    }

    #[test]
    fn test_comment_appends_without_status_change() {
        let engine = WorkflowEngine::new();
        let entity = make_request_entity();
        let actor = requester();
        let action =
            Action::new(ActionKind::Comment, actor.id.clone()).with_comment("any update?");

        let transition = engine.apply(&entity, &action, &actor).unwrap();
        assert_eq!(transition.entity.status_label(), entity.status_label());
        assert_eq!(transition.entity.log().len(), 1);
        // comments never bump the revision
        assert_eq!(transition.entity.revision(), entity.revision());
        assert!(matches!(
            &transition.events[0],
            EngineEvent::CommentAdded { .. }
        ));
    }

    #[test]
    fn test_comment_by_outsider_is_unauthorized() {
        let engine = WorkflowEngine::new();
        let entity = make_request_entity();
        let outsider = Actor::new(ActorId::new("stranger"), "Stranger");
        let action =
            Action::new(ActionKind::Comment, outsider.id.clone()).with_comment("let me in");

        let err = engine.apply(&entity, &action, &outsider).unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));
    }

    #[test]
    fn test_empty_comment_is_rejected() {
        let engine = WorkflowEngine::new();
        let entity = make_request_entity();
        let actor = requester();
        let action = Action::new(ActionKind::Comment, actor.id.clone()).with_comment("   ");

        let err = engine.apply(&entity, &action, &actor).unwrap_err();
        assert!(matches!(err, EngineError::CommentRequired(_)));
    }

    #[test]
    fn test_mark_viewed_idempotent() {
        let engine = WorkflowEngine::new();
        let entity = make_request_entity();
        let actor = requester();

        let (first, changed) = engine.mark_viewed(&entity, &actor).unwrap();
        assert!(changed);
        let (second, changed) = engine.mark_viewed(&first, &actor).unwrap();
        assert!(!changed);
        assert_eq!(second, first);
    }

    #[test]
    fn test_acknowledge_rejection() {
        let engine = WorkflowEngine::new();
        let actor = requester();

        // not rejected yet
        let entity = make_request_entity();
        let err = engine.acknowledge_rejection(&entity, &actor).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));

        let WorkflowEntity::Request(mut request) = entity else {
            unreachable!()
        };
        request.status = RequestStatus::Rejected;
        let entity = WorkflowEntity::Request(request);

        let (next, changed) = engine.acknowledge_rejection(&entity, &actor).unwrap();
        assert!(changed);
        assert!(next.acknowledged_by_requester());

        let (_, changed) = engine.acknowledge_rejection(&next, &actor).unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_reopen_links_successor_and_leaves_original() {
        let engine = WorkflowEngine::new();
        let actor = requester();
        let WorkflowEntity::Request(mut request) = make_request_entity() else {
            unreachable!()
        };
        request.status = RequestStatus::Rejected;
        let entity = WorkflowEntity::Request(request);

        let transition = engine.reopen(&entity, &actor).unwrap();
        let WorkflowEntity::Request(successor) = &transition.entity else {
            panic!("expected a request successor");
        };
        assert_eq!(successor.status, RequestStatus::Pending);
        assert_eq!(successor.reopened_from.as_ref(), Some(entity.id()));
        assert_ne!(&successor.id, entity.id());
        assert_eq!(successor.items.len(), 1);
        assert!(matches!(
            &transition.events[0],
            EngineEvent::Reopened { .. }
        ));
    }

    #[test]
    fn test_reopen_requires_terminal_status() {
        let engine = WorkflowEngine::new();
        let actor = requester();
        let entity = make_request_entity();

        let err = engine.reopen(&entity, &actor).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_purge_requires_administer() {
        let engine = WorkflowEngine::new();
        let entity = make_request_entity();

        let worker = requester();
        assert!(engine.authorize_purge(&entity, &worker).is_err());

        let admin =
            Actor::new(ActorId::new("admin"), "Admin").with_capability(Capability::Administer);
        assert!(engine.authorize_purge(&entity, &admin).is_ok());
    }

    #[test]
    fn test_reopen_and_purge_not_valid_through_apply() {
        let engine = WorkflowEngine::new();
        let entity = make_request_entity();
        let actor = requester();

        for kind in [ActionKind::Reopen, ActionKind::Purge] {
            let action = Action::new(kind, actor.id.clone());
            let err = engine.apply(&entity, &action, &actor).unwrap_err();
            assert!(matches!(err, EngineError::InvalidTransition { .. }));
        }
    }
}
