//! Workflow Engine for Siteflow
//!
//! The engine is a **pure state-transition function**: given an entity,
//! an action and the acting actor, it either returns the next entity
//! state plus the side effects to carry out, or a typed error. It never
//! touches the store, never sends a notification, never suspends.
//!
//! Each variant's machine is a declarative edge table
//! ([`Edge`]): allowed (status, action) pairs with a [`Guard`] and a
//! [`CommentRule`] per edge. The engine resolves the edge, checks the
//! guard against the actor, enforces the comment rule and produces the
//! transition. One engine, five machines: the table is the variant.
//!
//! # Invariants enforced here (not in the UI)
//!
//! - Transitions follow the variant's edge table only.
//! - Rejecting or disputing requires a non-empty comment.
//! - Viewed flags reset for every peer on comment append and status
//!   change, never for the acting actor.
//! - Terminal entities only change through reopen, which creates a
//!   fresh linked entity and never mutates history.

#![deny(unsafe_code)]

mod edge;
mod engine;
mod request;
mod task;
mod timesheet;

pub use edge::*;
pub use engine::*;
pub use request::REQUEST_EDGES;
pub use task::TASK_EDGES;
pub use timesheet::TIMESHEET_EDGES;
