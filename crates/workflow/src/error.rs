use std::{collections::BTreeMap, fmt};

use thiserror::Error;

use crate::port::{PortType, PortValues};

/// Why a pipeline could not be constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("duplicate block id `{block}`")]
    DuplicateBlock { block: String },

    #[error("duplicate entry input `{name}`")]
    DuplicateEntry { name: String },

    #[error("block `{block}` declares port `{port}` twice")]
    DuplicatePort { block: String, port: String },

    #[error("unknown block `{block}`")]
    UnknownBlock { block: String },

    #[error("block `{block}` has no {direction} port `{port}`")]
    UnknownPort {
        block: String,
        port: String,
        direction: &'static str,
    },

    #[error("unknown entry input `{name}`")]
    UnknownEntry { name: String },

    #[error("input `{port}` of block `{block}` is wired from more than one source")]
    MultipleSources { block: String, port: String },

    #[error("required input `{port}` of block `{block}` is not wired")]
    UnsatisfiedInput { block: String, port: String },

    #[error("optional entry input `{entry}` cannot feed required input `{port}` of block `{block}`")]
    OptionalEntryFeedsRequired {
        entry: String,
        block: String,
        port: String,
    },

    #[error("type mismatch wiring {from} → {to}: expected {expected}, found {found}")]
    TypeMismatch {
        from: String,
        to: String,
        expected: PortType,
        found: PortType,
    },

    #[error("wiring cycle through blocks: {}", blocks.join(" → "))]
    Cycle { blocks: Vec<String> },

    #[error("block `{block}` could not be set up: {message}")]
    Setup { block: String, message: String },
}

impl PipelineError {
    /// The block the error is attributed to, when there is one.
    pub fn block(&self) -> Option<&str> {
        match self {
            Self::DuplicateBlock { block }
            | Self::DuplicatePort { block, .. }
            | Self::UnknownBlock { block }
            | Self::UnknownPort { block, .. }
            | Self::MultipleSources { block, .. }
            | Self::UnsatisfiedInput { block, .. }
            | Self::OptionalEntryFeedsRequired { block, .. }
            | Self::Setup { block, .. } => Some(block),
            Self::Cycle { blocks } => blocks.first().map(String::as_str),
            Self::DuplicateEntry { .. } | Self::UnknownEntry { .. } | Self::TypeMismatch { .. } => {
                None
            },
        }
    }

    #[must_use]
    pub fn setup(block: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Setup {
            block: block.into(),
            message: message.to_string(),
        }
    }
}

/// What went wrong during a run.
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("entry input `{name}` was not supplied")]
    MissingEntry { name: String },

    #[error("entry input `{name}` expected {expected}, got {found}")]
    EntryType {
        name: String,
        expected: PortType,
        found: PortType,
    },

    #[error("{message}")]
    Execution { message: String },

    #[error("declared output `{port}` was not produced")]
    MissingOutput { port: String },

    #[error("output `{port}` expected {expected}, got {found}")]
    OutputType {
        port: String,
        expected: PortType,
        found: PortType,
    },

    #[error("run cancelled")]
    Cancelled,
}

/// A run that stopped early. Carries every output produced before the stop.
#[derive(Debug)]
pub struct RunFailure {
    pub pipeline: String,
    /// Block that failed, or the next block to run when cancelled. `None`
    /// when the caller's entry inputs were rejected.
    pub block: Option<String>,
    pub reason: FailureReason,
    /// Outputs of the blocks that completed, by block id.
    pub produced: BTreeMap<String, PortValues>,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.block {
            Some(block) => write!(
                f,
                "pipeline `{}` failed at block `{block}`: {}",
                self.pipeline, self.reason
            ),
            None => write!(f, "pipeline `{}` failed: {}", self.pipeline, self.reason),
        }
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

impl RunFailure {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.reason, FailureReason::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow `{workflow}` is already registered")]
    Duplicate { workflow: String },

    #[error("workflow `{workflow}` not found")]
    NotFound { workflow: String },

    #[error("workflow `{workflow}` failed to build: {source}")]
    Build {
        workflow: String,
        #[source]
        source: PipelineError,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
