use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Who produced a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One stored turn. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub scope_key: String,
    pub role: Role,
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A composed entry that hasn't been assigned a scope key or timestamp yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub role: Role,
    pub sender_id: String,
    pub content: String,
}

impl EntryDraft {
    pub fn user(sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            sender_id: sender_id.into(),
            content: content.into(),
        }
    }

    pub fn assistant(sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            sender_id: sender_id.into(),
            content: content.into(),
        }
    }

    pub(crate) fn seal(self, scope_key: String, timestamp: DateTime<Utc>) -> MemoryEntry {
        MemoryEntry {
            scope_key,
            role: self.role,
            sender_id: self.sender_id,
            content: self.content,
            timestamp,
        }
    }
}
