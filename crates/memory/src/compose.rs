//! Conversions between domain messages and memory entries.

use switchyard_common::{GeneratedResponse, InboundMessage};

use crate::entry::{EntryDraft, MemoryEntry, Role};

/// Sender id recorded for replies whose model is unknown.
pub const ASSISTANT_SENDER: &str = "assistant";

/// Something that can be written to memory.
#[derive(Debug, Clone, Copy)]
pub enum Composable<'a> {
    Inbound(&'a InboundMessage),
    Generated(&'a GeneratedResponse),
}

impl<'a> From<&'a InboundMessage> for Composable<'a> {
    fn from(msg: &'a InboundMessage) -> Self {
        Self::Inbound(msg)
    }
}

impl<'a> From<&'a GeneratedResponse> for Composable<'a> {
    fn from(resp: &'a GeneratedResponse) -> Self {
        Self::Generated(resp)
    }
}

/// Normalizes a message or reply into an entry draft.
pub trait MemoryComposer: Send + Sync {
    fn compose(&self, item: Composable<'_>) -> EntryDraft;
}

/// Renders an ordered entry sequence as context text.
pub trait MemoryDecomposer: Send + Sync {
    fn decompose(&self, entries: &[MemoryEntry]) -> String;
}

/// Inbound messages become `user` entries, replies become `assistant` entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComposer;

impl MemoryComposer for DefaultComposer {
    fn compose(&self, item: Composable<'_>) -> EntryDraft {
        match item {
            Composable::Inbound(msg) => EntryDraft::user(&msg.sender_id, &msg.text),
            Composable::Generated(resp) => EntryDraft::assistant(
                resp.model.as_deref().unwrap_or(ASSISTANT_SENDER),
                &resp.content,
            ),
        }
    }
}

/// `[role] sender: content`, one line per entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecomposer;

impl MemoryDecomposer for DefaultDecomposer {
    fn decompose(&self, entries: &[MemoryEntry]) -> String {
        entries
            .iter()
            .map(|e| format!("[{}] {}: {}", e.role, e.sender_id, single_line(&e.content)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Like [`DefaultDecomposer`] with a UTC timestamp prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampedDecomposer;

impl MemoryDecomposer for TimestampedDecomposer {
    fn decompose(&self, entries: &[MemoryEntry]) -> String {
        entries
            .iter()
            .map(|e| {
                format!(
                    "{} [{}] {}: {}",
                    e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    e.role,
                    e.sender_id,
                    single_line(&e.content)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Role-only transcript (`User: …` / `Assistant: …`), the shape most chat
/// prompts expect.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptDecomposer;

impl MemoryDecomposer for TranscriptDecomposer {
    fn decompose(&self, entries: &[MemoryEntry]) -> String {
        entries
            .iter()
            .map(|e| {
                let speaker = match e.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{speaker}: {}", single_line(&e.content))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Collapse line breaks so every entry renders on exactly one line.
fn single_line(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
