//! Builds the runtime from configuration: memory, workflows, rules.

use std::{path::Path, sync::Arc};

use {
    anyhow::Context,
    switchyard_config::SwitchyardConfig,
    switchyard_memory::MemoryManager,
    switchyard_routing::{Dispatcher, LoadReport, RuleRegistry},
    switchyard_workflow::{
        WorkflowRegistry,
        system::{SystemDeps, register_system_workflows},
    },
    tracing::info,
};

use crate::backend::build_backend;

/// `--config` when given, otherwise the discovered file or defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SwitchyardConfig> {
    match path {
        Some(path) => switchyard_config::load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(switchyard_config::discover_and_load()),
    }
}

pub async fn open_memory(config: &SwitchyardConfig) -> anyhow::Result<Arc<MemoryManager>> {
    let memory = MemoryManager::from_config(&config.memory)
        .await
        .context("failed to initialize memory")?;
    Ok(Arc::new(memory))
}

/// Everything a dispatcher needs, wired once at startup.
pub struct App {
    pub config: SwitchyardConfig,
    pub memory: Arc<MemoryManager>,
    pub workflows: Arc<WorkflowRegistry>,
    pub rules: Arc<RuleRegistry>,
    pub rules_report: LoadReport,
}

impl App {
    pub async fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = load_config(config_path)?;
        let memory = open_memory(&config).await?;
        let backend = build_backend(&config.llm)?;

        let mut workflows = WorkflowRegistry::new();
        register_system_workflows(&mut workflows, SystemDeps {
            memory: Arc::clone(&memory),
            backend,
            system_prompt: config.llm.system_prompt.clone(),
            memory_scope: None,
        })?;

        let mut rules = RuleRegistry::new();
        let rules_report = rules
            .load_dir(&config.dispatch.rules_dir, &workflows)
            .context("failed to load dispatch rules")?;

        info!(
            workflows = workflows.len(),
            rules = rules.len(),
            backend = ?config.llm.backend,
            "switchyard ready"
        );

        Ok(Self {
            config,
            memory,
            workflows: Arc::new(workflows),
            rules: Arc::new(rules),
            rules_report,
        })
    }

    pub fn dispatcher(&self) -> anyhow::Result<Dispatcher> {
        Ok(Dispatcher::from_config(
            Arc::clone(&self.rules),
            Arc::clone(&self.workflows),
            &self.config.dispatch,
        )?)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, switchyard_common::InboundMessage};

    #[tokio::test]
    async fn loads_from_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let rules_dir = dir.path().join("rules");
        let memory_dir = dir.path().join("memory");
        std::fs::create_dir_all(&rules_dir).unwrap();
        std::fs::write(
            rules_dir.join("help.yaml"),
            "- {type: prefix, prefix: /help, workflow: system/help}\n",
        )
        .unwrap();
        let config_path = dir.path().join("switchyard.toml");
        std::fs::write(
            &config_path,
            format!(
                "[dispatch]\nrules_dir = {:?}\n\n[memory]\nmax_entries = 4\n\n[memory.persistence]\ntype = \"file\"\n\n[memory.persistence.file]\nstorage_dir = {:?}\n",
                rules_dir.display().to_string(),
                memory_dir.display().to_string()
            ),
        )
        .unwrap();

        let app = App::load(Some(&config_path)).await.unwrap();
        assert_eq!(app.rules_report.loaded, 1);
        assert_eq!(app.memory.max_entries(), 4);

        let dispatcher = app.dispatcher().unwrap();
        let outcome = dispatcher
            .dispatch(InboundMessage::new("zoe", "hi"))
            .await
            .unwrap();
        assert_eq!(outcome.reply().as_deref(), Some("echo: zoe: hi"));
        app.memory.shutdown().await.unwrap();
        assert!(memory_dir.is_dir());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/switchyard.toml"))).is_err());
    }
}
