//! Edges: the declarative transition table entries
//!
//! An edge is one allowed (status, action) pair: where it leads, who
//! may traverse it, and whether a justification is mandatory. Every
//! variant's machine is a static table of these.

use siteflow_types::{ActionKind, Actor, Capability, WorkflowEntity};

/// Who may traverse an edge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Guard {
    /// The owning actor (requester, task creator, timesheet recipient)
    Requester,
    /// Any assignee of the task
    Assignee,
    /// The task creator or the delegated approver
    CreatorOrApprover,
    /// Any actor holding the named capability
    Capability(Capability),
}

impl Guard {
    /// Evaluate this guard for an actor against an entity
    pub fn check(&self, entity: &WorkflowEntity, actor: &Actor) -> bool {
        match self {
            Guard::Requester => entity.owner() == &actor.id,
            Guard::Assignee => match entity {
                WorkflowEntity::Task(task) => task.is_assignee(&actor.id),
                _ => false,
            },
            Guard::CreatorOrApprover => {
                entity.owner() == &actor.id || entity.approver() == Some(&actor.id)
            }
            Guard::Capability(capability) => actor.has_capability(*capability),
        }
    }
}

/// Whether an edge demands a non-empty comment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommentRule {
    Optional,
    Required,
}

/// One allowed transition in a variant's machine
#[derive(Clone, Copy, Debug)]
pub struct Edge<S: 'static> {
    pub action: ActionKind,
    pub from: S,
    pub to: S,
    pub guard: Guard,
    pub comment: CommentRule,
}

/// Find the first edge matching (current status, action)
pub fn find_edge<S: PartialEq + Copy>(
    edges: &'static [Edge<S>],
    from: S,
    action: ActionKind,
) -> Option<&'static Edge<S>> {
    edges
        .iter()
        .find(|edge| edge.from == from && edge.action == action)
}

/// All edges matching (current status, action), needed where one
/// action fans out to several targets (dispute resolution)
pub fn find_edges<S: PartialEq + Copy>(
    edges: &'static [Edge<S>],
    from: S,
    action: ActionKind,
) -> impl Iterator<Item = &'static Edge<S>> {
    edges
        .iter()
        .filter(move |edge| edge.from == from && edge.action == action)
}
