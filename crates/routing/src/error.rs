use std::path::PathBuf;

use switchyard_workflow::{RunFailure, WorkflowError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed rule: {reason}")]
    Malformed { reason: String },

    #[error("rule targets unknown workflow `{workflow}`")]
    UnknownWorkflow { workflow: String },

    #[error("{kind} rule has an empty {field}")]
    Empty {
        kind: &'static str,
        field: &'static str,
    },

    #[error("invalid regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rules source `{source_name}` is not a list")]
    NotAList { source_name: String },

    #[error("failed to read rules from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Run(#[from] Box<RunFailure>),
}

impl Error {
    #[must_use]
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::Malformed {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_workflow(workflow: impl Into<String>) -> Self {
        Self::UnknownWorkflow {
            workflow: workflow.into(),
        }
    }

    /// The run failure, when the error came from executing a pipeline.
    pub fn run_failure(&self) -> Option<&RunFailure> {
        match self {
            Self::Run(failure) => Some(failure),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
