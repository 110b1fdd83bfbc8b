//! Inbound message and the ticket built from it.

use serde::{Deserialize, Serialize};

/// Content used when the email carried no body.
pub const NO_CONTENT: &str = "No content";

/// Canonical email produced by the normalizer: one per webhook call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub content: Option<String>,
}

/// Provenance and routing data attached to a ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Set once by the project resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// Work item to be filed in the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub title: String,
    pub content: String,
    pub attributes: TicketAttributes,
}

impl Ticket {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            attributes: TicketAttributes::default(),
        }
    }

    /// Build a ticket from a validated message; missing body becomes "No content".
    pub fn from_message(message: &InboundMessage) -> Self {
        Self {
            title: message.subject.clone(),
            content: message
                .content
                .clone()
                .unwrap_or_else(|| NO_CONTENT.to_string()),
            attributes: TicketAttributes {
                sender: Some(message.from.clone()),
                recipient: Some(message.to.clone()),
                project: None,
            },
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.attributes.recipient = Some(recipient.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.attributes.sender = Some(sender.into());
        self
    }
}
