/// Config schema types (dispatch, memory, llm).
use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Scope names known to the memory subsystem out of the box.
pub const BUILTIN_SCOPES: &[&str] = &["member", "conversation", "global"];

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchyardConfig {
    pub dispatch: DispatchConfig,
    pub memory: MemoryConfig,
    pub llm: LlmConfig,
}

/// Rule loading and fallback behavior of the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Directory scanned for `*.yaml` rule files.
    pub rules_dir: PathBuf,
    /// Workflow used when no rule matches, as `category/name`.
    pub default_workflow: String,
    /// Per-message pipeline deadline. `0` disables it.
    pub timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rules_dir: PathBuf::from("data/dispatch_rules"),
            default_workflow: "chat/normal".into(),
            timeout_secs: 60,
        }
    }
}

/// Conversational memory section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub persistence: PersistenceConfig,
    /// Entries kept per scope key before the oldest are evicted.
    pub max_entries: usize,
    /// Scope used by memory blocks that don't name one.
    pub default_scope: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            persistence: PersistenceConfig::default(),
            max_entries: 100,
            default_scope: "member".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistenceKind {
    #[default]
    #[serde(rename = "file")]
    File,
    #[serde(rename = "key-value-store", alias = "kv", alias = "sqlite")]
    KeyValueStore,
}

impl std::fmt::Display for PersistenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::KeyValueStore => write!(f, "key-value-store"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    #[serde(rename = "type")]
    pub kind: PersistenceKind,
    pub file: FilePersistenceConfig,
    pub kv: KvPersistenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePersistenceConfig {
    pub storage_dir: PathBuf,
}

impl Default for FilePersistenceConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("data/memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KvPersistenceConfig {
    /// sqlx connection string, e.g. `sqlite://data/memory.db?mode=rwc`.
    pub database_url: String,
}

impl Default for KvPersistenceConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/memory.db?mode=rwc".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackendKind {
    /// Replies with the prompt's last line. Useful offline.
    #[default]
    Echo,
    /// Any OpenAI-compatible `/chat/completions` endpoint.
    #[serde(alias = "openai-compatible")]
    OpenAi,
}

/// Model backend used by the chat workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: LlmBackendKind,
    pub base_url: String,
    pub model: String,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub system_prompt: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackendKind::default(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            system_prompt: None,
            timeout_secs: 30,
        }
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SwitchyardConfig::default();
        assert_eq!(cfg.memory.max_entries, 100);
        assert_eq!(cfg.memory.default_scope, "member");
        assert_eq!(cfg.memory.persistence.kind, PersistenceKind::File);
        assert_eq!(cfg.dispatch.default_workflow, "chat/normal");
        assert_eq!(cfg.llm.backend, LlmBackendKind::Echo);
    }

    #[test]
    fn persistence_type_accepts_aliases() {
        let cfg: SwitchyardConfig = toml::from_str(
            r#"
            [memory.persistence]
            type = "kv"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.memory.persistence.kind, PersistenceKind::KeyValueStore);

        let cfg: SwitchyardConfig = toml::from_str(
            r#"
            [memory.persistence]
            type = "key-value-store"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.memory.persistence.kind, PersistenceKind::KeyValueStore);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg: SwitchyardConfig = toml::from_str(
            r#"
            [memory]
            max_entries = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.memory.max_entries, 3);
        assert_eq!(cfg.memory.default_scope, "member");
        assert_eq!(cfg.dispatch.timeout_secs, 60);
    }

    #[test]
    fn api_key_round_trips_through_serialization() {
        let cfg: SwitchyardConfig = toml::from_str(
            r#"
            [llm]
            backend = "openai"
            api_key = "sk-test"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.llm.backend, LlmBackendKind::OpenAi);
        let rendered = toml::to_string(&cfg).unwrap();
        assert!(rendered.contains("sk-test"));
    }
}
