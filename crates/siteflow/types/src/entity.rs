//! Workflow entities: the five request/task shapes behind one enum
//!
//! Variant payloads (items, periods, attachments) are opaque to the
//! transition engine: it only inspects status, relationships and
//! existence (e.g. "at least one item to issue").

use crate::{
    ActivityLog, ActorId, ApprovalState, EntityId, RequestStatus, SubtaskStatus, TaskStatus,
    TimesheetStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── Generic Request ──────────────────────────────────────────────────

/// Which concrete request shape a `RequestEntity` carries.
///
/// All three share the same status machine; the kind selects the store
/// path and the notification wording.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    Ppe,
    Internal,
    Logbook,
}

impl RequestKind {
    /// Store path segment for this kind
    pub fn segment(self) -> &'static str {
        match self {
            RequestKind::Ppe => "ppe",
            RequestKind::Internal => "internal",
            RequestKind::Logbook => "logbook",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RequestKind::Ppe => "PPE Request",
            RequestKind::Internal => "Internal Request",
            RequestKind::Logbook => "Logbook Request",
        };
        write!(f, "{}", label)
    }
}

/// One requested line item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestItem {
    /// Stock code the item decrements on issuance
    pub item_code: String,
    pub description: String,
    pub quantity: u32,
}

impl RequestItem {
    pub fn new(item_code: impl Into<String>, description: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_code: item_code.into(),
            description: description.into(),
            quantity,
        }
    }
}

/// A generic request: PPE, internal or logbook
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestEntity {
    pub id: EntityId,
    pub kind: RequestKind,
    pub status: RequestStatus,
    /// Owning actor, immutable after creation
    pub requester: ActorId,
    /// Actor currently responsible for the next transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<ActorId>,
    pub items: Vec<RequestItem>,
    /// Attachment URLs. Storage mechanics are out of scope, only the
    /// references live here
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    pub log: ActivityLog,
    /// Set by the requester after a terminal rejection
    #[serde(default)]
    pub acknowledged_by_requester: bool,
    /// Optimistic-concurrency token, bumped on every status transition
    #[serde(default)]
    pub revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopened_from: Option<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestEntity {
    pub fn new(kind: RequestKind, requester: ActorId) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::generate(),
            kind,
            status: RequestStatus::Pending,
            requester,
            approver: None,
            items: Vec::new(),
            attachments: Vec::new(),
            log: ActivityLog::new(),
            acknowledged_by_requester: false,
            revision: 0,
            reopened_from: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_approver(mut self, approver: ActorId) -> Self {
        self.approver = Some(approver);
        self
    }

    pub fn with_item(mut self, item: RequestItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_attachment(mut self, url: impl Into<String>) -> Self {
        self.attachments.push(url.into());
        self
    }
}

// ── Task ─────────────────────────────────────────────────────────────

/// State of an open status request on a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusRequestState {
    Pending,
    Approved,
    Returned,
}

/// A submission asking the task creator to confirm completion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusRequest {
    pub requested_by: ActorId,
    pub new_status: TaskStatus,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    pub date: DateTime<Utc>,
    pub state: StatusRequestState,
}

/// A multi-assignee task with per-assignee subtasks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskEntity {
    pub id: EntityId,
    pub title: String,
    /// Owning actor, immutable after creation
    pub creator: ActorId,
    /// Delegated approver; the creator always retains approval rights
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<ActorId>,
    pub assignees: Vec<ActorId>,
    /// Per-assignee status. The overall status is computed from this
    /// set, never stored
    pub subtasks: BTreeMap<ActorId, SubtaskStatus>,
    #[serde(default)]
    pub approval_state: ApprovalState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_request: Option<StatusRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<DateTime<Utc>>,
    pub log: ActivityLog,
    #[serde(default)]
    pub acknowledged_by_requester: bool,
    #[serde(default)]
    pub revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopened_from: Option<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskEntity {
    pub fn new(title: impl Into<String>, creator: ActorId) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::generate(),
            title: title.into(),
            creator,
            approver: None,
            assignees: Vec::new(),
            subtasks: BTreeMap::new(),
            approval_state: ApprovalState::None,
            status_request: None,
            completion_date: None,
            log: ActivityLog::new(),
            acknowledged_by_requester: false,
            revision: 0,
            reopened_from: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add an assignee with a fresh To Do subtask
    pub fn with_assignee(mut self, assignee: ActorId) -> Self {
        self.subtasks.insert(assignee.clone(), SubtaskStatus::ToDo);
        self.assignees.push(assignee);
        self
    }

    pub fn with_approver(mut self, approver: ActorId) -> Self {
        self.approver = Some(approver);
        self
    }

    pub fn is_assignee(&self, actor: &ActorId) -> bool {
        self.assignees.contains(actor)
    }

    /// Whether every subtask is Done (AND-join). False for an empty set.
    pub fn all_subtasks_done(&self) -> bool {
        !self.subtasks.is_empty()
            && self.subtasks.values().all(|s| *s == SubtaskStatus::Done)
    }

    /// The computed overall status.
    ///
    /// An open status request dominates; otherwise the subtask set
    /// aggregates: Done only when ALL subtasks are Done, In Progress
    /// when ANY is, To Do otherwise.
    pub fn status(&self) -> TaskStatus {
        if self.status_request.is_some() {
            return TaskStatus::PendingApproval;
        }
        aggregate_subtasks(self.subtasks.values().copied())
    }
}

/// Pure aggregation of a subtask set into an overall task status.
///
/// Recomputed on every subtask mutation; an empty set is To Do.
pub fn aggregate_subtasks(subtasks: impl Iterator<Item = SubtaskStatus>) -> TaskStatus {
    let mut any = false;
    let mut all_done = true;
    let mut any_in_progress = false;
    for status in subtasks {
        any = true;
        match status {
            SubtaskStatus::Done => {}
            SubtaskStatus::InProgress => {
                all_done = false;
                any_in_progress = true;
            }
            SubtaskStatus::ToDo => all_done = false,
        }
    }
    if any && all_done {
        TaskStatus::Done
    } else if any_in_progress {
        TaskStatus::InProgress
    } else {
        TaskStatus::ToDo
    }
}

// ── Timesheet ────────────────────────────────────────────────────────

/// One worked line on a timesheet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimesheetLine {
    pub date: DateTime<Utc>,
    pub hours: f64,
    pub description: String,
}

/// A timesheet routed recipient → office
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimesheetEntity {
    pub id: EntityId,
    /// The actor the timesheet belongs to (the requester-equivalent)
    pub recipient: ActorId,
    pub status: TimesheetStatus,
    /// Period label, e.g. "2026-07"
    pub period: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<TimesheetLine>,
    pub log: ActivityLog,
    #[serde(default)]
    pub acknowledged_by_requester: bool,
    #[serde(default)]
    pub revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopened_from: Option<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimesheetEntity {
    pub fn new(recipient: ActorId, period: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::generate(),
            recipient,
            status: TimesheetStatus::Pending,
            period: period.into(),
            lines: Vec::new(),
            log: ActivityLog::new(),
            acknowledged_by_requester: false,
            revision: 0,
            reopened_from: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_line(mut self, line: TimesheetLine) -> Self {
        self.lines.push(line);
        self
    }
}

// ── Workflow Entity ──────────────────────────────────────────────────

/// Any workflow entity, behind one enum for the engine and the store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WorkflowEntity {
    Request(RequestEntity),
    Task(TaskEntity),
    Timesheet(TimesheetEntity),
}

impl WorkflowEntity {
    pub fn id(&self) -> &EntityId {
        match self {
            WorkflowEntity::Request(r) => &r.id,
            WorkflowEntity::Task(t) => &t.id,
            WorkflowEntity::Timesheet(t) => &t.id,
        }
    }

    /// The owning actor (requester, creator or recipient)
    pub fn owner(&self) -> &ActorId {
        match self {
            WorkflowEntity::Request(r) => &r.requester,
            WorkflowEntity::Task(t) => &t.creator,
            WorkflowEntity::Timesheet(t) => &t.recipient,
        }
    }

    pub fn approver(&self) -> Option<&ActorId> {
        match self {
            WorkflowEntity::Request(r) => r.approver.as_ref(),
            WorkflowEntity::Task(t) => t.approver.as_ref(),
            WorkflowEntity::Timesheet(_) => None,
        }
    }

    pub fn log(&self) -> &ActivityLog {
        match self {
            WorkflowEntity::Request(r) => &r.log,
            WorkflowEntity::Task(t) => &t.log,
            WorkflowEntity::Timesheet(t) => &t.log,
        }
    }

    pub fn log_mut(&mut self) -> &mut ActivityLog {
        match self {
            WorkflowEntity::Request(r) => &mut r.log,
            WorkflowEntity::Task(t) => &mut t.log,
            WorkflowEntity::Timesheet(t) => &mut t.log,
        }
    }

    pub fn revision(&self) -> u64 {
        match self {
            WorkflowEntity::Request(r) => r.revision,
            WorkflowEntity::Task(t) => t.revision,
            WorkflowEntity::Timesheet(t) => t.revision,
        }
    }

    pub fn bump_revision(&mut self) {
        match self {
            WorkflowEntity::Request(r) => r.revision += 1,
            WorkflowEntity::Task(t) => t.revision += 1,
            WorkflowEntity::Timesheet(t) => t.revision += 1,
        }
    }

    pub fn acknowledged_by_requester(&self) -> bool {
        match self {
            WorkflowEntity::Request(r) => r.acknowledged_by_requester,
            WorkflowEntity::Task(t) => t.acknowledged_by_requester,
            WorkflowEntity::Timesheet(t) => t.acknowledged_by_requester,
        }
    }

    pub fn set_acknowledged_by_requester(&mut self, value: bool) {
        match self {
            WorkflowEntity::Request(r) => r.acknowledged_by_requester = value,
            WorkflowEntity::Task(t) => t.acknowledged_by_requester = value,
            WorkflowEntity::Timesheet(t) => t.acknowledged_by_requester = value,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        match self {
            WorkflowEntity::Request(r) => r.updated_at = now,
            WorkflowEntity::Task(t) => t.updated_at = now,
            WorkflowEntity::Timesheet(t) => t.updated_at = now,
        }
    }

    /// Human label of the current status
    pub fn status_label(&self) -> String {
        match self {
            WorkflowEntity::Request(r) => r.status.to_string(),
            WorkflowEntity::Task(t) => t.status().to_string(),
            WorkflowEntity::Timesheet(t) => t.status.to_string(),
        }
    }

    /// Human label of the variant ("PPE Request", "Task", ...)
    pub fn variant_label(&self) -> String {
        match self {
            WorkflowEntity::Request(r) => r.kind.to_string(),
            WorkflowEntity::Task(_) => "Task".to_string(),
            WorkflowEntity::Timesheet(_) => "Timesheet".to_string(),
        }
    }

    /// Whether the entity has reached the end of its lifecycle and is
    /// eligible for reopen
    pub fn is_terminal(&self) -> bool {
        match self {
            WorkflowEntity::Request(r) => r.status.is_terminal(),
            WorkflowEntity::Task(t) => t.status().is_terminal(),
            WorkflowEntity::Timesheet(t) => t.status.is_terminal(),
        }
    }

    /// Everyone attached to this entity: owner, approver, assignees and
    /// prior comment authors. Used for viewed-flag resets and
    /// notification fan-out.
    pub fn participants(&self) -> BTreeSet<ActorId> {
        let mut participants = BTreeSet::new();
        participants.insert(self.owner().clone());
        if let Some(approver) = self.approver() {
            participants.insert(approver.clone());
        }
        if let WorkflowEntity::Task(t) = self {
            participants.extend(t.assignees.iter().cloned());
        }
        participants.extend(self.log().authors());
        participants
    }
}

impl From<RequestEntity> for WorkflowEntity {
    fn from(entity: RequestEntity) -> Self {
        WorkflowEntity::Request(entity)
    }
}

impl From<TaskEntity> for WorkflowEntity {
    fn from(entity: TaskEntity) -> Self {
        WorkflowEntity::Task(entity)
    }
}

impl From<TimesheetEntity> for WorkflowEntity {
    fn from(entity: TimesheetEntity) -> Self {
        WorkflowEntity::Timesheet(entity)
    }
}
