use {async_trait::async_trait, std::borrow::Cow};

use crate::{
    block::{Block, BlockInputs},
    port::{Port, PortType, PortValue, PortValues},
};

/// Emits a fixed text as `reply`. `{sender}` in the text is replaced by the
/// display name of the optional `msg` input.
pub struct StaticText {
    text: String,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl StaticText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            inputs: vec![Port::optional("msg", PortType::Message, "message being answered")],
            outputs: vec![Port::required("reply", PortType::Text, "reply text")],
        }
    }
}

#[async_trait]
impl Block for StaticText {
    fn kind(&self) -> &str {
        "static_text"
    }

    fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    async fn execute(&self, inputs: BlockInputs) -> anyhow::Result<PortValues> {
        let text = match inputs.get("msg") {
            Some(PortValue::Message(msg)) => {
                Cow::Owned(self.text.replace("{sender}", msg.display_name()))
            },
            _ => Cow::Borrowed(self.text.as_str()),
        };
        Ok(PortValues::from([(
            "reply".to_string(),
            PortValue::Text(text.into_owned()),
        )]))
    }
}
