//! Metrics definitions and recorder setup for switchyard.
//!
//! Crates record through the `metrics` facade macros re-exported here; the
//! binary decides whether a recorder is installed. With no recorder every
//! macro call is a no-op.
//!
//! ```rust,ignore
//! use switchyard_metrics::{counter, dispatch, histogram};
//!
//! counter!(dispatch::MESSAGES_TOTAL).increment(1);
//! histogram!(workflow::BLOCK_DURATION_SECONDS, "block" => "llm").record(0.42);
//! ```
//!
//! # Features
//!
//! - `prometheus`: install a Prometheus recorder and render the text format

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
