//! Outbound email messages

use serde::{Deserialize, Serialize};
use siteflow_types::{ActorId, EntityId};

/// A rendered notification, ready for the mailer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Resolved recipient addresses
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    /// The entity this notification concerns, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    /// The actor whose action triggered the notification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub involved_user: Option<ActorId>,
    /// The entity's owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_user: Option<ActorId>,
}

impl EmailMessage {
    pub fn new(subject: impl Into<String>, html_body: impl Into<String>) -> Self {
        Self {
            to: Vec::new(),
            subject: subject.into(),
            html_body: html_body.into(),
            entity_id: None,
            involved_user: None,
            creator_user: None,
        }
    }

    pub fn with_recipient(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    pub fn with_entity(mut self, entity_id: EntityId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_involved_user(mut self, actor: ActorId) -> Self {
        self.involved_user = Some(actor);
        self
    }
}
