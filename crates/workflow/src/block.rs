use {
    anyhow::{Context, anyhow, bail},
    async_trait::async_trait,
    switchyard_common::{GeneratedResponse, InboundMessage},
};

use crate::port::{Port, PortValue, PortValues};

/// A unit of work inside a pipeline.
///
/// Port lists must be stable for the lifetime of the block: they are read once
/// when the pipeline is built and used to validate wiring.
#[async_trait]
pub trait Block: Send + Sync {
    /// Short type name used in logs, e.g. `chat_completion`.
    fn kind(&self) -> &str;

    fn inputs(&self) -> &[Port];

    fn outputs(&self) -> &[Port];

    /// Run once with the values bound to this block's inputs. Must return every
    /// declared output or fail.
    async fn execute(&self, inputs: BlockInputs) -> anyhow::Result<PortValues>;
}

/// Values delivered to a block for one execution.
#[derive(Debug, Clone, Default)]
pub struct BlockInputs {
    values: PortValues,
}

impl BlockInputs {
    pub fn new(values: PortValues) -> Self {
        Self { values }
    }

    pub fn get(&self, port: &str) -> Option<&PortValue> {
        self.values.get(port)
    }

    pub fn message(&self, port: &str) -> anyhow::Result<&InboundMessage> {
        match self.require(port)? {
            PortValue::Message(msg) => Ok(msg),
            other => bail!("input `{port}` is {}, expected message", other.port_type()),
        }
    }

    pub fn response(&self, port: &str) -> anyhow::Result<&GeneratedResponse> {
        match self.require(port)? {
            PortValue::Response(resp) => Ok(resp),
            other => bail!("input `{port}` is {}, expected response", other.port_type()),
        }
    }

    pub fn text(&self, port: &str) -> anyhow::Result<&str> {
        self.require(port)?
            .as_text()
            .with_context(|| format!("input `{port}` is not text"))
    }

    /// Text of an optional input, `None` when it was not wired.
    pub fn optional_text(&self, port: &str) -> Option<&str> {
        self.values.get(port).and_then(PortValue::as_text)
    }

    fn require(&self, port: &str) -> anyhow::Result<&PortValue> {
        self.values
            .get(port)
            .ok_or_else(|| anyhow!("input `{port}` was not delivered"))
    }
}
