//! The generic request machine: PPE, internal and logbook requests
//!
//! All three kinds share one status machine; issuance side effects
//! (stock decrement, history record) are emitted as events and carried
//! out by the service layer after the commit.

use crate::edge::{find_edge, find_edges, CommentRule, Edge, Guard};
use chrono::{DateTime, Utc};
use siteflow_types::{
    Action, ActionKind, ActionPayload, Actor, Capability, Comment, EngineError, EngineEvent,
    EngineResult, IssueRecord, RequestEntity, RequestStatus, ResolveDisposition, WorkflowEntity,
};

/// The allowed-edge table for generic requests
pub static REQUEST_EDGES: &[Edge<RequestStatus>] = &[
    Edge {
        action: ActionKind::Approve,
        from: RequestStatus::Pending,
        to: RequestStatus::Approved,
        guard: Guard::Capability(Capability::Approve),
        comment: CommentRule::Optional,
    },
    Edge {
        action: ActionKind::Reject,
        from: RequestStatus::Pending,
        to: RequestStatus::Rejected,
        guard: Guard::Capability(Capability::Approve),
        comment: CommentRule::Required,
    },
    Edge {
        action: ActionKind::Issue,
        from: RequestStatus::Approved,
        to: RequestStatus::Issued,
        guard: Guard::Capability(Capability::Issue),
        comment: CommentRule::Optional,
    },
    Edge {
        action: ActionKind::Dispute,
        from: RequestStatus::Issued,
        to: RequestStatus::Disputed,
        guard: Guard::Requester,
        comment: CommentRule::Required,
    },
    // Resolution fans out by disposition: reissue loops back to Issued
    // via a fresh issuance, reverse is a terminal rejection.
    Edge {
        action: ActionKind::Resolve,
        from: RequestStatus::Disputed,
        to: RequestStatus::Issued,
        guard: Guard::Capability(Capability::Issue),
        comment: CommentRule::Required,
    },
    Edge {
        action: ActionKind::Resolve,
        from: RequestStatus::Disputed,
        to: RequestStatus::Rejected,
        guard: Guard::Capability(Capability::Issue),
        comment: CommentRule::Required,
    },
];

pub(crate) fn apply_request(
    request: &RequestEntity,
    action: &Action,
    actor: &Actor,
    now: DateTime<Utc>,
) -> EngineResult<(RequestEntity, Vec<EngineEvent>)> {
    let status = request.status;
    let edge = resolve_edge(request, action)?;

    let entity_view = WorkflowEntity::Request(request.clone());
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

    let mut next = request.clone();
    next.status = edge.to;
    if matches!(action.kind, ActionKind::Approve | ActionKind::Reject) {
        // Record the decision maker as the responsible actor
        next.approver = Some(actor.id.clone());
    }
    if let Some(text) = action.comment_text() {
        next.log
            .append(Comment::new(next.id.clone(), actor.id.clone(), text));
    }
    next.revision += 1;
    next.updated_at = now;

    let participants = WorkflowEntity::Request(next.clone()).participants();
    let notify: Vec<_> = participants
        .iter()
        .filter(|p| **p != actor.id)
        .cloned()
        .collect();
    next.log.reset_peers(&actor.id, &participants);

    let mut events = vec![EngineEvent::StatusChanged {
        entity_id: next.id.clone(),
        entity_label: next.kind.to_string(),
        from: status.to_string(),
        to: edge.to.to_string(),
        actor: actor.id.clone(),
        notify,
    }];
    if matches!(edge.to, RequestStatus::Issued) {
        // Fresh issuance: one stock decrement and one history record
        // per line item. A reissue appends a second record and never
        // replaces the first.
        for item in &next.items {
            events.push(EngineEvent::StockDecremented {
                item_code: item.item_code.clone(),
                quantity: item.quantity,
            });
            events.push(EngineEvent::HistoryAppended {
                employee: next.requester.clone(),
                record: IssueRecord {
                    item_code: item.item_code.clone(),
                    description: item.description.clone(),
                    quantity: item.quantity,
                    issue_date: now,
                    issued_by: actor.id.clone(),
                },
            });
        }
    }

    Ok((next, events))
}

/// Resolve the edge for (status, action), honoring the resolution
/// disposition when the action is `Resolve`.
fn resolve_edge(
    request: &RequestEntity,
    action: &Action,
) -> EngineResult<&'static Edge<RequestStatus>> {
    if action.kind == ActionKind::Resolve {
        let disposition = match &action.payload {
            Some(ActionPayload::Resolution(disposition)) => *disposition,
            _ => return Err(EngineError::MissingPayload(action.kind)),
        };
        let target = match disposition {
            ResolveDisposition::Reissue => RequestStatus::Issued,
            ResolveDisposition::Reverse => RequestStatus::Rejected,
        };
        return find_edges(REQUEST_EDGES, request.status, action.kind)
            .find(|edge| edge.to == target)
            .ok_or(EngineError::InvalidTransition {
                action: action.kind,
                status: request.status.to_string(),
            });
    }
    find_edge(REQUEST_EDGES, request.status, action.kind).ok_or(EngineError::InvalidTransition {
        action: action.kind,
        status: request.status.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteflow_types::{ActorId, RequestItem, RequestKind};

    fn make_request() -> RequestEntity {
        RequestEntity::new(RequestKind::Ppe, ActorId::new("requester"))
            .with_item(RequestItem::new("HELMET", "Safety helmet", 2))
    }

    fn approver() -> Actor {
        Actor::new(ActorId::new("supervisor"), "Supervisor").with_capability(Capability::Approve)
    }

    fn issuer() -> Actor {
        Actor::new(ActorId::new("storekeeper"), "Storekeeper").with_capability(Capability::Issue)
    }

    fn requester() -> Actor {
        Actor::new(ActorId::new("requester"), "Requester")
    }

    #[test]
    fn test_approve_from_pending() {
        let request = make_request();
        let actor = approver();
        let action = Action::new(ActionKind::Approve, actor.id.clone());

        let (next, events) = apply_request(&request, &action, &actor, Utc::now()).unwrap();
        assert_eq!(next.status, RequestStatus::Approved);
        assert!(next.log.is_empty());
        assert_eq!(next.revision, request.revision + 1);
        assert!(matches!(&events[0], EngineEvent::StatusChanged { .. }));
    }

    #[test]
    fn test_approve_resets_requester_viewed_flag() {
        let mut request = make_request();
        request.log.mark_viewed(&ActorId::new("requester"));

        let actor = approver();
        let action = Action::new(ActionKind::Approve, actor.id.clone());
        let (next, _) = apply_request(&request, &action, &actor, Utc::now()).unwrap();

        assert!(!next.log.viewed(&ActorId::new("requester")));
        assert!(next.log.viewed(&actor.id));
    }

    #[test]
    fn test_reject_requires_comment() {
        let request = make_request();
        let actor = approver();
        let action = Action::new(ActionKind::Reject, actor.id.clone());

        let err = apply_request(&request, &action, &actor, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::CommentRequired(ActionKind::Reject)));
    }

    #[test]
    fn test_reject_with_comment_appends_it() {
        let request = make_request();
        let actor = approver();
        let action =
            Action::new(ActionKind::Reject, actor.id.clone()).with_comment("out of budget");

        let (next, _) = apply_request(&request, &action, &actor, Utc::now()).unwrap();
        assert_eq!(next.status, RequestStatus::Rejected);
        assert_eq!(next.log.len(), 1);
        assert_eq!(next.log.latest().unwrap().text, "out of budget");
    }

    #[test]
    fn test_approve_without_capability_is_unauthorized() {
        let request = make_request();
        let actor = requester();
        let action = Action::new(ActionKind::Approve, actor.id.clone());

        let err = apply_request(&request, &action, &actor, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));
    }

    #[test]
    fn test_issue_requires_distinct_capability() {
        let mut request = make_request();
        request.status = RequestStatus::Approved;

        // Approval capability is not issuance capability
        let actor = approver();
        let action = Action::new(ActionKind::Issue, actor.id.clone());
        let err = apply_request(&request, &action, &actor, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));
    }

    #[test]
    fn test_issue_emits_stock_and_history() {
        let mut request = make_request();
        request.status = RequestStatus::Approved;

        let actor = issuer();
        let action = Action::new(ActionKind::Issue, actor.id.clone());
        let (next, events) = apply_request(&request, &action, &actor, Utc::now()).unwrap();

        assert_eq!(next.status, RequestStatus::Issued);
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::StockDecremented { item_code, quantity: 2 } if item_code == "HELMET"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::HistoryAppended { employee, .. } if employee == &next.requester
        )));
    }

    #[test]
    fn test_dispute_only_by_requester_with_comment() {
        let mut request = make_request();
        request.status = RequestStatus::Issued;

        let outsider = issuer();
        let action = Action::new(ActionKind::Dispute, outsider.id.clone()).with_comment("missing");
        let err = apply_request(&request, &action, &outsider, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));

        let actor = requester();
        let bare = Action::new(ActionKind::Dispute, actor.id.clone());
        let err = apply_request(&request, &bare, &actor, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::CommentRequired(_)));

        let action =
            Action::new(ActionKind::Dispute, actor.id.clone()).with_comment("item missing");
        let (next, _) = apply_request(&request, &action, &actor, Utc::now()).unwrap();
        assert_eq!(next.status, RequestStatus::Disputed);
    }

    #[test]
    fn test_resolve_reissue_appends_second_history_record() {
        let mut request = make_request();
        request.status = RequestStatus::Disputed;

        let actor = issuer();
        let action = Action::new(ActionKind::Resolve, actor.id.clone())
            .with_comment("confirmed missing")
            .with_payload(ActionPayload::Resolution(ResolveDisposition::Reissue));

        let (next, events) = apply_request(&request, &action, &actor, Utc::now()).unwrap();
        assert_eq!(next.status, RequestStatus::Issued);
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::HistoryAppended { .. })));
    }

    #[test]
    fn test_resolve_reverse_is_terminal_rejection() {
        let mut request = make_request();
        request.status = RequestStatus::Disputed;

        let actor = issuer();
        let action = Action::new(ActionKind::Resolve, actor.id.clone())
            .with_comment("not missing")
            .with_payload(ActionPayload::Resolution(ResolveDisposition::Reverse));

        let (next, events) = apply_request(&request, &action, &actor, Utc::now()).unwrap();
        assert_eq!(next.status, RequestStatus::Rejected);
        assert!(!events
            .iter()
            .any(|e| matches!(e, EngineEvent::HistoryAppended { .. })));
    }

    #[test]
    fn test_resolve_without_payload_is_rejected() {
        let mut request = make_request();
        request.status = RequestStatus::Disputed;

        let actor = issuer();
        let action = Action::new(ActionKind::Resolve, actor.id.clone()).with_comment("done");
        let err = apply_request(&request, &action, &actor, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::MissingPayload(ActionKind::Resolve)));
    }

    #[test]
    fn test_no_edge_from_terminal_rejected() {
        let mut request = make_request();
        request.status = RequestStatus::Rejected;

        let actor = approver();
        let action = Action::new(ActionKind::Approve, actor.id.clone());
        let err = apply_request(&request, &action, &actor, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }
}
