//! Shared types and error definitions used across all switchyard crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{GeneratedResponse, InboundMessage, MessageIdentity},
};
