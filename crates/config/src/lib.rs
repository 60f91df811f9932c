//! Configuration loading, validation and env substitution.
//!
//! Config files: `switchyard.toml`, `switchyard.yaml` or `switchyard.json`.
//! Searched in `./` then `~/.config/switchyard/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        DispatchConfig, LlmBackendKind, LlmConfig, MemoryConfig, PersistenceConfig,
        PersistenceKind, SwitchyardConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
