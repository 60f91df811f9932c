//! Ordered rule list and its loaders.

use std::{
    ops::AddAssign,
    path::{Path, PathBuf},
};

use {
    switchyard_workflow::{PipelineRef, WorkflowRegistry},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use switchyard_metrics::{counter, dispatch as dispatch_metrics, gauge};

use crate::{
    error::{Error, Result},
    rule::{Rule, RuleSpec},
};

/// How many definitions a load accepted and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub rejected: usize,
}

impl AddAssign for LoadReport {
    fn add_assign(&mut self, other: Self) {
        self.loaded += other.loaded;
        self.rejected += other.rejected;
    }
}

/// Rules in registration order. Earlier rules shadow later ones.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, rule: Rule) {
        debug!(rule = %rule, "registered dispatch rule");
        self.rules.push(rule);
        #[cfg(feature = "metrics")]
        gauge!(dispatch_metrics::RULES_LOADED).set(self.rules.len() as f64);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Target of the first rule matching `text`.
    pub fn resolve(&self, text: &str) -> Option<&PipelineRef> {
        self.rules
            .iter()
            .find(|rule| rule.matches(text))
            .map(Rule::target)
    }

    /// Compile and append each definition. A bad definition is logged and
    /// skipped; the rest still load.
    pub fn load<I>(&mut self, source: &str, items: I, workflows: &WorkflowRegistry) -> LoadReport
    where
        I: IntoIterator<Item = serde_yaml::Value>,
    {
        let mut report = LoadReport::default();
        for (index, item) in items.into_iter().enumerate() {
            let compiled = serde_yaml::from_value::<RuleSpec>(item)
                .map_err(Error::malformed)
                .and_then(|spec| Rule::compile(spec, workflows));
            match compiled {
                Ok(rule) => {
                    self.register(rule);
                    report.loaded += 1;
                },
                Err(e) => {
                    warn!(source, index, error = %e, "skipping dispatch rule");
                    #[cfg(feature = "metrics")]
                    counter!(dispatch_metrics::RULES_REJECTED_TOTAL).increment(1);
                    report.rejected += 1;
                },
            }
        }
        report
    }

    /// Load one YAML document whose top level is a list of definitions.
    pub fn load_str(
        &mut self,
        source: &str,
        yaml: &str,
        workflows: &WorkflowRegistry,
    ) -> Result<LoadReport> {
        match serde_yaml::from_str::<serde_yaml::Value>(yaml)? {
            serde_yaml::Value::Sequence(items) => Ok(self.load(source, items, workflows)),
            // An empty file.
            serde_yaml::Value::Null => Ok(LoadReport::default()),
            _ => Err(Error::NotAList {
                source_name: source.to_string(),
            }),
        }
    }

    /// Load every `*.yaml` / `*.yml` file in `dir`, sorted by file name.
    /// The directory is created when missing. Files that cannot be read or
    /// parsed are logged and skipped.
    pub fn load_dir(&mut self, dir: &Path, workflows: &WorkflowRegistry) -> Result<LoadReport> {
        std::fs::create_dir_all(dir).map_err(|source| Error::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|source| Error::Read {
                path: dir.to_path_buf(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|e| e.to_str()),
                        Some("yaml" | "yml")
                    )
            })
            .collect();
        files.sort();

        let mut report = LoadReport::default();
        for path in &files {
            let source = path.display().to_string();
            let loaded = std::fs::read_to_string(path)
                .map_err(|e| Error::Read {
                    path: path.clone(),
                    source: e,
                })
                .and_then(|raw| self.load_str(&source, &raw, workflows));
            match loaded {
                Ok(file_report) => {
                    debug!(file = %source, loaded = file_report.loaded, rejected = file_report.rejected, "loaded rules file");
                    report += file_report;
                },
                Err(e) => warn!(file = %source, error = %e, "skipping rules file"),
            }
        }

        info!(
            dir = %dir.display(),
            files = files.len(),
            loaded = report.loaded,
            rejected = report.rejected,
            "dispatch rules loaded"
        );
        Ok(report)
    }
}
