//! Actors, roles and capabilities
//!
//! A capability is a named permission used as a transition guard
//! ("can approve", "can issue"). It is deliberately distinct from a
//! role name: roles describe who someone is in the organisation,
//! capabilities describe which workflow edges they may traverse.

use crate::ActorId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Role ─────────────────────────────────────────────────────────────

/// A role name (references the deployment's role registry)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Capability ───────────────────────────────────────────────────────

/// A named permission used as a workflow transition guard
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// May approve or reject pending requests and task submissions
    Approve,
    /// May issue approved requests and resolve disputes
    Issue,
    /// May acknowledge or reject timesheets on behalf of the office
    OfficeAcknowledge,
    /// May purge entities and reopen terminal ones
    Administer,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Capability::Approve => "approve",
            Capability::Issue => "issue",
            Capability::OfficeAcknowledge => "office-acknowledge",
            Capability::Administer => "administer",
        };
        write!(f, "{}", label)
    }
}

// ── Actor ────────────────────────────────────────────────────────────

/// The engine-side view of a user: identity plus resolved permissions.
///
/// Contact details live in the user directory; the engine only needs
/// the id and the capability set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Actor {
    /// Unique identifier
    pub id: ActorId,
    /// Display name for logs and notifications
    pub display_name: String,
    /// Roles held in the organisation
    pub roles: BTreeSet<RoleId>,
    /// Capabilities resolved from the actor's roles
    pub capabilities: BTreeSet<Capability>,
}

impl Actor {
    /// Create an actor with no roles or capabilities
    pub fn new(id: ActorId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            roles: BTreeSet::new(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: RoleId) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Check whether this actor holds a capability
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Check whether this actor holds any capability at all
    pub fn has_any_capability(&self) -> bool {
        !self.capabilities.is_empty()
    }
}
