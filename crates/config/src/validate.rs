//! Configuration validation.
//!
//! Detects unknown/misspelled fields in any supported format, reports type
//! errors, and flags semantic problems in an otherwise parseable config.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    loader::{find_config_file, parse_config_value},
    schema::{BUILTIN_SCOPES, LlmBackendKind, PersistenceKind, SwitchyardConfig},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "semantic", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "memory.max_entries"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    let persistence = Struct(HashMap::from([
        ("type", Leaf),
        ("file", Struct(HashMap::from([("storage_dir", Leaf)]))),
        ("kv", Struct(HashMap::from([("database_url", Leaf)]))),
    ]));

    Struct(HashMap::from([
        (
            "dispatch",
            Struct(HashMap::from([
                ("rules_dir", Leaf),
                ("default_workflow", Leaf),
                ("timeout_secs", Leaf),
            ])),
        ),
        (
            "memory",
            Struct(HashMap::from([
                ("persistence", persistence),
                ("max_entries", Leaf),
                ("default_scope", Leaf),
            ])),
        ),
        (
            "llm",
            Struct(HashMap::from([
                ("backend", Leaf),
                ("base_url", Leaf),
                ("model", Leaf),
                ("api_key", Leaf),
                ("system_prompt", Leaf),
                ("timeout_secs", Leaf),
            ])),
        ),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered one if `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) => validate_str(&content, &actual_path),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate raw config text. The format is taken from `path`'s extension.
#[must_use]
pub fn validate_str(raw: &str, path: &Path) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value = match parse_config_value(raw, path) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    match serde_json::from_value::<SwitchyardConfig>(value) {
        Ok(config) => diagnostics.extend(check_semantics(&config)),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (serde_json::Value::Object(map), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known: Vec<&str> = fields.keys().copied().collect();
    for (key, child) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match fields.get(key.as_str()) {
            Some(child_schema) => check_unknown_fields(child, child_schema, &path, diagnostics),
            None => {
                let message = match suggest(key, &known, 3) {
                    Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                    None => "unknown field".to_string(),
                };
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "unknown-field",
                    path,
                    message,
                ));
            },
        }
    }
}

/// Semantic checks on a parsed config.
#[must_use]
pub fn check_semantics(config: &SwitchyardConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let memory = &config.memory;

    if memory.max_entries == 0 {
        out.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "memory.max_entries",
            "must be a positive integer",
        ));
    }

    if !BUILTIN_SCOPES.contains(&memory.default_scope.as_str()) {
        let hint = suggest(&memory.default_scope, BUILTIN_SCOPES, 3)
            .map(|s| format!(" (did you mean \"{s}\"?)"))
            .unwrap_or_default();
        out.push(Diagnostic::new(
            Severity::Warning,
            "semantic",
            "memory.default_scope",
            format!(
                "\"{}\" is not a built-in scope{hint}; it must be registered before use",
                memory.default_scope
            ),
        ));
    }

    match memory.persistence.kind {
        PersistenceKind::File if memory.persistence.file.storage_dir.as_os_str().is_empty() => {
            out.push(Diagnostic::new(
                Severity::Error,
                "semantic",
                "memory.persistence.file.storage_dir",
                "file persistence needs a storage directory",
            ));
        },
        PersistenceKind::KeyValueStore if memory.persistence.kv.database_url.trim().is_empty() => {
            out.push(Diagnostic::new(
                Severity::Error,
                "semantic",
                "memory.persistence.kv.database_url",
                "key-value-store persistence needs a database URL",
            ));
        },
        _ => {},
    }

    if !config.dispatch.default_workflow.contains('/') {
        out.push(Diagnostic::new(
            Severity::Info,
            "semantic",
            "dispatch.default_workflow",
            "bare workflow name; the first registered workflow with this name is used",
        ));
    }

    if config.dispatch.timeout_secs == 0 {
        out.push(Diagnostic::new(
            Severity::Info,
            "semantic",
            "dispatch.timeout_secs",
            "pipeline deadline disabled",
        ));
    }

    if config.llm.backend == LlmBackendKind::OpenAi && config.llm.api_key.is_none() {
        out.push(Diagnostic::new(
            Severity::Warning,
            "semantic",
            "llm.api_key",
            "openai backend configured without an API key",
        ));
    }

    out
}
