//! Message types exchanged between channel adapters, workflows and memory.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

/// Channel name used when a message is not tagged with one.
pub const DEFAULT_CHANNEL: &str = "cli";

/// A message received from a chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub channel: String,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Group / chat identity. `None` for one-to-one conversations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: DEFAULT_CHANNEL.into(),
            sender_id: sender_id.into(),
            sender_name: None,
            group_id: None,
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    #[must_use]
    pub fn on_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    #[must_use]
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Parse a `sender[@group]: text` line as typed into the CLI.
    pub fn parse_line(line: &str) -> Result<Self> {
        let (who, text) = line
            .split_once(':')
            .ok_or_else(|| Error::malformed_line(line))?;
        let text = text.trim();
        let (sender, group) = match who.trim().split_once('@') {
            Some((sender, group)) => (sender.trim(), Some(group.trim())),
            None => (who.trim(), None),
        };
        if sender.is_empty() || text.is_empty() || group.is_some_and(str::is_empty) {
            return Err(Error::malformed_line(line));
        }
        let msg = Self::new(sender, text);
        Ok(match group {
            Some(group) => msg.in_group(group),
            None => msg,
        })
    }

    pub fn identity(&self) -> MessageIdentity {
        MessageIdentity {
            sender_id: self.sender_id.clone(),
            group_id: self.group_id.clone(),
        }
    }

    /// Name shown in rendered history: the display name if known, else the id.
    pub fn display_name(&self) -> &str {
        self.sender_name.as_deref().unwrap_or(&self.sender_id)
    }

    pub fn is_direct(&self) -> bool {
        self.group_id.is_none()
    }
}

/// The identity fields memory partitioning is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageIdentity {
    pub sender_id: String,
    pub group_id: Option<String>,
}

impl MessageIdentity {
    pub fn direct(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            group_id: None,
        }
    }

    pub fn group(sender_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            group_id: Some(group_id.into()),
        }
    }
}

/// Text produced by a model backend in reply to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GeneratedResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}
