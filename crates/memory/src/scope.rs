//! Partition key derivation for conversational memory.

use std::{str::FromStr, sync::Arc};

use switchyard_common::MessageIdentity;

use crate::Error;

/// Key shared by every message under [`GlobalScope`].
pub const GLOBAL_SCOPE_KEY: &str = "global";

/// Maps a message identity to the key its memory is stored under.
///
/// Implementations must be pure: the same identity always yields the same key.
pub trait MemoryScope: Send + Sync {
    fn name(&self) -> &str;
    fn scope_key(&self, identity: &MessageIdentity) -> String;
}

/// One partition per sender, across every conversation they take part in.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberScope;

impl MemoryScope for MemberScope {
    fn name(&self) -> &str {
        "member"
    }

    fn scope_key(&self, identity: &MessageIdentity) -> String {
        format!("member:{}", identity.sender_id)
    }
}

/// One partition per group chat; one-to-one chats are keyed by the sender.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationScope;

impl MemoryScope for ConversationScope {
    fn name(&self) -> &str {
        "conversation"
    }

    fn scope_key(&self, identity: &MessageIdentity) -> String {
        match &identity.group_id {
            Some(group) => format!("group:{group}"),
            None => format!("direct:{}", identity.sender_id),
        }
    }
}

/// A single partition shared by everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalScope;

impl MemoryScope for GlobalScope {
    fn name(&self) -> &str {
        "global"
    }

    fn scope_key(&self, _identity: &MessageIdentity) -> String {
        GLOBAL_SCOPE_KEY.to_string()
    }
}

/// The built-in scope types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScopeKind {
    #[default]
    Member,
    Conversation,
    Global,
}

impl ScopeKind {
    pub const ALL: &'static [ScopeKind] = &[Self::Member, Self::Conversation, Self::Global];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Conversation => "conversation",
            Self::Global => "global",
        }
    }

    pub fn scope(self) -> Arc<dyn MemoryScope> {
        match self {
            Self::Member => Arc::new(MemberScope),
            Self::Conversation => Arc::new(ConversationScope),
            Self::Global => Arc::new(GlobalScope),
        }
    }
}

impl FromStr for ScopeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "member" => Ok(Self::Member),
            "conversation" => Ok(Self::Conversation),
            "global" => Ok(Self::Global),
            _ => Err(Error::unknown_scope(s)),
        }
    }
}
