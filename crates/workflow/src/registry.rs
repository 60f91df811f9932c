//! Named pipeline builders.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use tracing::debug;

use crate::{
    error::{PipelineError, WorkflowError},
    pipeline::Pipeline,
};

/// Produces a fresh pipeline per invocation.
pub type WorkflowBuilder = Arc<dyn Fn() -> Result<Pipeline, PipelineError> + Send + Sync>;

/// `category/name` key of a registered workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineRef {
    pub category: String,
    pub name: String,
}

impl PipelineRef {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PipelineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

impl FromStr for PipelineRef {
    type Err = WorkflowError;

    /// Parses a qualified `category/name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((category, name)) if !category.is_empty() && !name.is_empty() => {
                Ok(Self::new(category, name))
            },
            _ => Err(WorkflowError::NotFound {
                workflow: s.to_string(),
            }),
        }
    }
}

/// Registry of workflow builders keyed by `(category, name)`.
///
/// Registration order is kept: a bare-name lookup returns the first workflow
/// registered under that name, whatever its category.
#[derive(Default)]
pub struct WorkflowRegistry {
    order: Vec<PipelineRef>,
    builders: HashMap<PipelineRef, WorkflowBuilder>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if `(category, name)` is already taken.
    pub fn register<F>(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        builder: F,
    ) -> Result<(), WorkflowError>
    where
        F: Fn() -> Result<Pipeline, PipelineError> + Send + Sync + 'static,
    {
        let key = PipelineRef::new(category, name);
        if self.builders.contains_key(&key) {
            return Err(WorkflowError::Duplicate {
                workflow: key.to_string(),
            });
        }
        debug!(workflow = %key, "registered workflow");
        self.order.push(key.clone());
        self.builders.insert(key, Arc::new(builder));
        Ok(())
    }

    /// Resolve `category/name` exactly, or a bare `name` to its first
    /// registration.
    pub fn resolve(&self, name: &str) -> Option<&PipelineRef> {
        match name.split_once('/') {
            Some((category, bare)) => self
                .order
                .iter()
                .find(|r| r.category == category && r.name == bare),
            None => self.order.iter().find(|r| r.name == name),
        }
    }

    pub fn get(&self, name: &str) -> Option<WorkflowBuilder> {
        self.resolve(name)
            .and_then(|key| self.builders.get(key))
            .map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Registered workflows in registration order.
    pub fn list(&self) -> &[PipelineRef] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up `name` and build a fresh pipeline from it.
    pub fn build(&self, name: &str) -> Result<Pipeline, WorkflowError> {
        let key = self.resolve(name).ok_or_else(|| WorkflowError::NotFound {
            workflow: name.to_string(),
        })?;
        let builder = self
            .builders
            .get(key)
            .ok_or_else(|| WorkflowError::NotFound {
                workflow: key.to_string(),
            })?;
        builder().map_err(|source| WorkflowError::Build {
            workflow: key.to_string(),
            source,
        })
    }
}

impl fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflows", &self.order)
            .finish()
    }
}
