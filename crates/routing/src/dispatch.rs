use std::{fmt, sync::Arc, time::Duration};

use {
    switchyard_common::InboundMessage,
    switchyard_config::DispatchConfig,
    switchyard_workflow::{
        PipelineOutput, PipelineRef, PortValues, WorkflowRegistry, system::MESSAGE_ENTRY,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use switchyard_metrics::{counter, dispatch as dispatch_metrics, labels};

use crate::{
    error::{Error, Result},
    registry::RuleRegistry,
};

/// Where a message was sent and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub workflow: PipelineRef,
    /// `false` when no rule matched and the default workflow was used.
    pub matched: bool,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matched {
            write!(f, "{}", self.workflow)
        } else {
            write!(f, "{} (default)", self.workflow)
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub route: Route,
    pub output: PipelineOutput,
}

impl DispatchOutcome {
    pub fn reply(&self) -> Option<String> {
        self.output.reply()
    }
}

/// Routes messages with the rule registry and runs the selected workflow.
///
/// Holds the registries behind `Arc` so one dispatcher can serve many
/// concurrent messages.
pub struct Dispatcher {
    rules: Arc<RuleRegistry>,
    workflows: Arc<WorkflowRegistry>,
    default_workflow: PipelineRef,
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// Fails when `default_workflow` is not registered.
    pub fn new(
        rules: Arc<RuleRegistry>,
        workflows: Arc<WorkflowRegistry>,
        default_workflow: &str,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let default_workflow = workflows
            .resolve(default_workflow)
            .cloned()
            .ok_or_else(|| Error::unknown_workflow(default_workflow))?;
        Ok(Self {
            rules,
            workflows,
            default_workflow,
            timeout,
        })
    }

    /// `timeout_secs = 0` disables the deadline.
    pub fn from_config(
        rules: Arc<RuleRegistry>,
        workflows: Arc<WorkflowRegistry>,
        config: &DispatchConfig,
    ) -> Result<Self> {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        Self::new(rules, workflows, &config.default_workflow, timeout)
    }

    pub fn default_workflow(&self) -> &PipelineRef {
        &self.default_workflow
    }

    pub fn route(&self, text: &str) -> Route {
        match self.rules.resolve(text) {
            Some(workflow) => Route {
                workflow: workflow.clone(),
                matched: true,
            },
            None => Route {
                workflow: self.default_workflow.clone(),
                matched: false,
            },
        }
    }

    pub async fn dispatch(&self, msg: InboundMessage) -> Result<DispatchOutcome> {
        self.dispatch_with_cancel(msg, &CancellationToken::new())
            .await
    }

    /// Like [`dispatch`](Self::dispatch); cancelling `parent` stops the run at
    /// the next block boundary.
    pub async fn dispatch_with_cancel(
        &self,
        msg: InboundMessage,
        parent: &CancellationToken,
    ) -> Result<DispatchOutcome> {
        let route = self.route(&msg.text);

        #[cfg(feature = "metrics")]
        {
            counter!(dispatch_metrics::MESSAGES_TOTAL).increment(1);
            if route.matched {
                counter!(dispatch_metrics::RULE_HITS_TOTAL, labels::WORKFLOW => route.workflow.to_string())
                    .increment(1);
            } else {
                counter!(dispatch_metrics::FALLBACKS_TOTAL).increment(1);
            }
        }

        info!(
            msg_id = %msg.id,
            sender = %msg.sender_id,
            group = msg.group_id.as_deref().unwrap_or("-"),
            route = %route,
            "dispatching message"
        );

        let pipeline = self.workflows.build(&route.workflow.to_string())?;

        let cancel = parent.child_token();
        if let Some(limit) = self.timeout {
            let timer = cancel.clone();
            let workflow = route.workflow.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = tokio::time::sleep(limit) => {
                        warn!(%workflow, timeout_secs = limit.as_secs_f64(), "workflow deadline reached, cancelling");
                        timer.cancel();
                    },
                    () = timer.cancelled() => {},
                }
            });
        }
        // Stops the deadline task once the run is over.
        let _stop_timer = cancel.clone().drop_guard();

        let entries = PortValues::from([(MESSAGE_ENTRY.to_string(), msg.into())]);
        let output = pipeline
            .run(entries, &cancel)
            .await
            .map_err(|failure| Error::Run(Box::new(failure)))?;

        debug!(route = %route, elapsed_ms = output.elapsed.as_millis() as u64, "workflow finished");
        Ok(DispatchOutcome { route, output })
    }
}
