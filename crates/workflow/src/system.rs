//! Workflows registered at startup.

use std::sync::Arc;

use {switchyard_memory::MemoryManager, tracing::info};

use crate::{
    blocks::{
        ChatCompletion, ChatMemoryQuery, ChatMemoryStore, DiceRoll, GachaDraw, PromptBuilder,
        StaticText,
    },
    error::{PipelineError, WorkflowError},
    llm::ChatBackend,
    pipeline::{Pipeline, PipelineBuilder},
    port::{Port, PortType},
    registry::WorkflowRegistry,
};

/// Entry input every system workflow takes: the inbound message.
pub const MESSAGE_ENTRY: &str = "msg";
/// Exposed output holding the text sent back to the user.
pub const REPLY_OUTPUT: &str = "reply";

#[derive(Debug, Clone, Copy)]
enum Builder {
    Dice,
    Gacha,
    Help,
    Chat,
}

/// `(category, name, builder)`. admin/status/settings are placeholders served
/// by the help builder; creative/roleplay reuse the normal chat builder.
const SYSTEM_WORKFLOWS: [(&str, &str, Builder); 9] = [
    ("game", "dice", Builder::Dice),
    ("game", "gacha", Builder::Gacha),
    ("system", "help", Builder::Help),
    ("system", "admin", Builder::Help),
    ("system", "status", Builder::Help),
    ("system", "settings", Builder::Help),
    ("chat", "normal", Builder::Chat),
    ("chat", "creative", Builder::Chat),
    ("chat", "roleplay", Builder::Chat),
];

/// Collaborators the system workflows are built from.
#[derive(Clone)]
pub struct SystemDeps {
    pub memory: Arc<MemoryManager>,
    pub backend: Arc<dyn ChatBackend>,
    pub system_prompt: Option<String>,
    /// Memory scope for chat history; `None` uses the manager default.
    pub memory_scope: Option<String>,
}

pub fn register_system_workflows(
    registry: &mut WorkflowRegistry,
    deps: SystemDeps,
) -> Result<(), WorkflowError> {
    let help = help_text();
    for (category, name, builder) in SYSTEM_WORKFLOWS {
        let label = format!("{category}/{name}");
        match builder {
            Builder::Dice => registry.register(category, name, move || dice_pipeline(&label))?,
            Builder::Gacha => registry.register(category, name, move || gacha_pipeline(&label))?,
            Builder::Help => {
                let text = help.clone();
                registry.register(category, name, move || help_pipeline(&label, &text))?;
            },
            Builder::Chat => {
                let deps = deps.clone();
                registry.register(category, name, move || chat_pipeline(&label, &deps))?;
            },
        }
    }
    info!(count = SYSTEM_WORKFLOWS.len(), "system workflows registered");
    Ok(())
}

fn message_entry() -> Port {
    Port::required(MESSAGE_ENTRY, PortType::Message, "inbound message")
}

fn help_text() -> String {
    let mut text = String::from("Hi {sender}! Available workflows:");
    for (category, name, _) in SYSTEM_WORKFLOWS {
        text.push_str(&format!("\n  {category}/{name}"));
    }
    text.push_str("\nStart a message with /help for this list or /roll NdM to roll dice.");
    text.push_str("\nUse /gacha N for up to 10 pulls.");
    text
}

/// memory_query → prompt → completion → memory_store; replies with the
/// completion.
pub fn chat_pipeline(name: &str, deps: &SystemDeps) -> Result<Pipeline, PipelineError> {
    let scope = deps.memory_scope.as_deref();
    let query = ChatMemoryQuery::new(Arc::clone(&deps.memory), scope)
        .map_err(|e| PipelineError::setup("memory_query", e))?;
    let store = ChatMemoryStore::new(Arc::clone(&deps.memory), scope)
        .map_err(|e| PipelineError::setup("memory_store", e))?;
    let completion = ChatCompletion::new(Arc::clone(&deps.backend), deps.system_prompt.clone());

    PipelineBuilder::new(name)
        .entry(message_entry())
        .block("memory_query", query)
        .block("prompt", PromptBuilder::new())
        .block("completion", completion)
        .block("memory_store", store)
        .wire_entry(MESSAGE_ENTRY, "memory_query", "msg")
        .wire_entry(MESSAGE_ENTRY, "prompt", "msg")
        .connect("memory_query", "memory_content", "prompt", "memory_content")
        .connect("prompt", "prompt", "completion", "prompt")
        .wire_entry(MESSAGE_ENTRY, "memory_store", "user_msg")
        .connect("completion", "llm_resp", "memory_store", "llm_resp")
        .expose(REPLY_OUTPUT, "completion", "llm_resp")
        .build()
}

pub fn help_pipeline(name: &str, text: &str) -> Result<Pipeline, PipelineError> {
    PipelineBuilder::new(name)
        .entry(message_entry())
        .block("help", StaticText::new(text))
        .wire_entry(MESSAGE_ENTRY, "help", "msg")
        .expose(REPLY_OUTPUT, "help", "reply")
        .build()
}

pub fn dice_pipeline(name: &str) -> Result<Pipeline, PipelineError> {
    let dice = DiceRoll::new().map_err(|e| PipelineError::setup("dice", e))?;
    PipelineBuilder::new(name)
        .entry(message_entry())
        .block("dice", dice)
        .wire_entry(MESSAGE_ENTRY, "dice", "msg")
        .expose(REPLY_OUTPUT, "dice", "reply")
        .expose("total", "dice", "total")
        .build()
}

pub fn gacha_pipeline(name: &str) -> Result<Pipeline, PipelineError> {
    let gacha = GachaDraw::new().map_err(|e| PipelineError::setup("gacha", e))?;
    PipelineBuilder::new(name)
        .entry(message_entry())
        .block("gacha", gacha)
        .wire_entry(MESSAGE_ENTRY, "gacha", "msg")
        .expose(REPLY_OUTPUT, "gacha", "reply")
        .expose("best", "gacha", "best")
        .build()
}
