//! Classify inbound messages into workflows and run them.
//!
//! Rules are checked in registration order and the first match wins:
//! 1. `prefix`: the text starts with a literal, case-sensitive prefix
//! 2. `keyword`: the lowercased text contains any of the lowercased keywords
//! 3. `regex`: an unanchored search with a pattern compiled at load time
//!
//! A message no rule claims goes to the configured default workflow.

pub mod dispatch;
pub mod error;
pub mod registry;
pub mod rule;

pub use {
    dispatch::{DispatchOutcome, Dispatcher, Route},
    error::{Error, Result},
    registry::{LoadReport, RuleRegistry},
    rule::{Rule, RuleSpec},
};
