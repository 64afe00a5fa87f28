//! Status enums: one closed set per workflow variant
//!
//! Display renders the labels the presentation layer shows and the
//! notification templates embed ("Pending Approval", "Sent To Office").

use serde::{Deserialize, Serialize};

// ── Generic Request ──────────────────────────────────────────────────

/// Status of a generic request (PPE, internal, logbook)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Awaiting an approval decision
    Pending,
    /// Approved, awaiting issuance
    Approved,
    /// Rejected by an approver (terminal once acknowledged)
    Rejected,
    /// Issued to the requester
    Issued,
    /// Requester disputes the issuance
    Disputed,
}

impl RequestStatus {
    /// End-of-lifecycle statuses, eligible for reopen. The edge table
    /// remains the authority for transitions: dispute may still leave
    /// Issued even though Issued is terminal for reopen purposes.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Issued)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Issued => "Issued",
            RequestStatus::Disputed => "Disputed",
        };
        write!(f, "{}", label)
    }
}

// ── Task ─────────────────────────────────────────────────────────────

/// Overall status of a task, computed from the subtask set and never
/// stored independently of its inputs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    ToDo,
    InProgress,
    PendingApproval,
    Done,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::PendingApproval => "Pending Approval",
            TaskStatus::Done => "Done",
        };
        write!(f, "{}", label)
    }
}

/// Per-assignee subtask status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubtaskStatus {
    ToDo,
    InProgress,
    Done,
}

impl std::fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SubtaskStatus::ToDo => "To Do",
            SubtaskStatus::InProgress => "In Progress",
            SubtaskStatus::Done => "Done",
        };
        write!(f, "{}", label)
    }
}

/// Orthogonal approval state of a task, tracked alongside the computed
/// overall status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalState {
    #[default]
    None,
    /// A status request is open and awaiting the creator's decision
    StatusPending,
    Approved,
    Returned,
}

// ── Timesheet ────────────────────────────────────────────────────────

/// Status of a timesheet: a linear chain with one rejection branch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimesheetStatus {
    Pending,
    Acknowledged,
    SentToOffice,
    OfficeAcknowledged,
    Rejected,
}

impl TimesheetStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TimesheetStatus::OfficeAcknowledged)
    }
}

impl std::fmt::Display for TimesheetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TimesheetStatus::Pending => "Pending",
            TimesheetStatus::Acknowledged => "Acknowledged",
            TimesheetStatus::SentToOffice => "Sent To Office",
            TimesheetStatus::OfficeAcknowledged => "Office Acknowledged",
            TimesheetStatus::Rejected => "Rejected",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_labels() {
        assert_eq!(TaskStatus::PendingApproval.to_string(), "Pending Approval");
        assert_eq!(TimesheetStatus::SentToOffice.to_string(), "Sent To Office");
        assert_eq!(RequestStatus::Disputed.to_string(), "Disputed");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::Issued.is_terminal());
        assert!(!RequestStatus::Disputed.is_terminal());
        assert!(TaskStatus::Done.is_terminal());
        assert!(TimesheetStatus::OfficeAcknowledged.is_terminal());
        assert!(!TimesheetStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&RequestStatus::Pending).unwrap();
        let back: RequestStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RequestStatus::Pending);
    }
}
