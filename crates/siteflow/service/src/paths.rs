//! Store path layout
//!
//! Every entity is owned by exactly one path:
//!
//! - `requests/<kind>/<id>`
//! - `tasks/<id>`
//! - `timesheets/<id>`
//! - `stock/<item_code>`: plain counters
//! - `history/<employee>/<push-key>`: issuance records

use siteflow_store::StorePath;
use siteflow_types::{ActorId, EntityId, RequestKind, WorkflowEntity};

pub fn request_path(kind: RequestKind, id: &EntityId) -> StorePath {
    StorePath::new("requests")
        .child(kind.segment())
        .child(id.to_string())
}

pub fn task_path(id: &EntityId) -> StorePath {
    StorePath::new("tasks").child(id.to_string())
}

pub fn timesheet_path(id: &EntityId) -> StorePath {
    StorePath::new("timesheets").child(id.to_string())
}

/// The path an entity is owned by
pub fn entity_path(entity: &WorkflowEntity) -> StorePath {
    match entity {
        WorkflowEntity::Request(r) => request_path(r.kind, &r.id),
        WorkflowEntity::Task(t) => task_path(&t.id),
        WorkflowEntity::Timesheet(t) => timesheet_path(&t.id),
    }
}

pub fn stock_path(item_code: &str) -> StorePath {
    StorePath::new("stock").child(item_code)
}

pub fn history_path(employee: &ActorId) -> StorePath {
    StorePath::new("history").child(employee.to_string())
}
