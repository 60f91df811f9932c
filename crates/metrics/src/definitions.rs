//! Metric name and label definitions.
//!
//! Every metric recorded anywhere in the workspace is named here so the
//! exported set is documented in one place.

/// Dispatch (rule matching) metrics
pub mod dispatch {
    /// Total inbound messages dispatched
    pub const MESSAGES_TOTAL: &str = "switchyard_dispatch_messages_total";
    /// Messages resolved by a rule, labelled by `workflow`
    pub const RULE_HITS_TOTAL: &str = "switchyard_dispatch_rule_hits_total";
    /// Messages that fell back to the default workflow
    pub const FALLBACKS_TOTAL: &str = "switchyard_dispatch_fallbacks_total";
    /// Rule definitions rejected while loading
    pub const RULES_REJECTED_TOTAL: &str = "switchyard_dispatch_rules_rejected_total";
    /// Number of loaded rules
    pub const RULES_LOADED: &str = "switchyard_dispatch_rules_loaded";
}

/// Pipeline execution metrics
pub mod workflow {
    /// Pipeline runs started, labelled by `workflow`
    pub const RUNS_TOTAL: &str = "switchyard_workflow_runs_total";
    /// Pipeline runs that ended in a block failure or cancellation
    pub const RUN_FAILURES_TOTAL: &str = "switchyard_workflow_run_failures_total";
    /// Whole-pipeline duration in seconds
    pub const RUN_DURATION_SECONDS: &str = "switchyard_workflow_run_duration_seconds";
    /// Single block duration in seconds, labelled by `block`
    pub const BLOCK_DURATION_SECONDS: &str = "switchyard_workflow_block_duration_seconds";
}

/// Conversational memory metrics
pub mod memory {
    /// Entries appended
    pub const STORES_TOTAL: &str = "switchyard_memory_stores_total";
    /// Entries evicted by the per-scope bound
    pub const EVICTIONS_TOTAL: &str = "switchyard_memory_evictions_total";
    /// Queries served
    pub const QUERIES_TOTAL: &str = "switchyard_memory_queries_total";
    /// Persistence load/save failures, labelled by `op`
    pub const PERSISTENCE_ERRORS_TOTAL: &str = "switchyard_memory_persistence_errors_total";
    /// Number of scope keys held in memory
    pub const SCOPES_LOADED: &str = "switchyard_memory_scopes_loaded";
}

/// Common label keys
pub mod labels {
    pub const WORKFLOW: &str = "workflow";
    pub const BLOCK: &str = "block";
    pub const OP: &str = "op";
}

/// Standard histogram buckets
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Block / pipeline durations (in seconds).
    /// Covers 1ms to 5 minutes; model calls dominate the tail.
    pub static STEP_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
            300.0,
        ]
    });
}
