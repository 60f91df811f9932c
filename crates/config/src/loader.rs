use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    Error, Result,
    env_subst::substitute_env,
    error::Context,
    schema::SwitchyardConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "switchyard.toml",
    "switchyard.yaml",
    "switchyard.yml",
    "switchyard.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SwitchyardConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./switchyard.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/switchyard/switchyard.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SwitchyardConfig::default()` if no config file is found or the
/// file fails to load.
pub fn discover_and_load() -> SwitchyardConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SwitchyardConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .chain(
            config_dir()
                .into_iter()
                .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name))),
        )
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/switchyard/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "switchyard").map(|d| d.config_dir().to_path_buf())
}

pub(crate) fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}

fn parse_config(raw: &str, path: &Path) -> Result<SwitchyardConfig> {
    match extension_of(path) {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        ext => Err(Error::unsupported_format(ext)),
    }
}

/// Parse raw text into a format-neutral JSON tree, used by validation.
pub(crate) fn parse_config_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    match extension_of(path) {
        "toml" => {
            let v: toml::Value = toml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "json" => Ok(serde_json::from_str(raw)?),
        ext => Err(Error::unsupported_format(ext)),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::schema::PersistenceKind,
        tempfile::TempDir,
    };

    #[test]
    fn loads_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("switchyard.toml");
        std::fs::write(
            &path,
            r#"
            [dispatch]
            default_workflow = "chat/creative"

            [memory]
            max_entries = 10
            default_scope = "conversation"
            "#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.dispatch.default_workflow, "chat/creative");
        assert_eq!(cfg.memory.max_entries, 10);
        assert_eq!(cfg.memory.default_scope, "conversation");
    }

    #[test]
    fn loads_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("switchyard.yaml");
        std::fs::write(
            &path,
            "memory:\n  persistence:\n    type: key-value-store\n    kv:\n      database_url: \"sqlite::memory:\"\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.memory.persistence.kind, PersistenceKind::KeyValueStore);
        assert_eq!(cfg.memory.persistence.kv.database_url, "sqlite::memory:");
    }

    #[test]
    fn loads_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("switchyard.json");
        std::fs::write(&path, r#"{"dispatch": {"timeout_secs": 5}}"#).unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.dispatch.timeout_secs, 5);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("switchyard.ini");
        std::fs::write(&path, "x = 1").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/switchyard.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/switchyard.toml"));
    }
}
