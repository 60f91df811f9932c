//! Typed block pipelines.
//!
//! A [`Pipeline`] is a set of [`Block`]s wired output → input through typed
//! [`Port`]s. All wiring is checked when the pipeline is built (every required
//! input has exactly one source, port types agree, the graph is acyclic), so
//! execution only has to move values along the precomputed order.
//!
//! Pipelines are produced fresh per message by builders kept in the
//! [`WorkflowRegistry`] under a `(category, name)` key.

pub mod block;
pub mod blocks;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod port;
pub mod registry;
pub mod system;

pub use {
    block::{Block, BlockInputs},
    error::{FailureReason, PipelineError, RunFailure, WorkflowError},
    llm::{ChatBackend, ChatRequest},
    pipeline::{Pipeline, PipelineBuilder, PipelineOutput, Source},
    port::{Port, PortType, PortValue, PortValues},
    registry::{PipelineRef, WorkflowBuilder, WorkflowRegistry},
};
