use std::sync::Arc;

use {anyhow::Context, async_trait::async_trait, tracing::debug};

use crate::{
    block::{Block, BlockInputs},
    llm::{ChatBackend, ChatRequest},
    port::{Port, PortType, PortValue, PortValues},
};

/// Joins the rendered history and the new message into one prompt.
///
/// Inputs `msg` and optional `memory_content`, output `prompt`.
pub struct PromptBuilder {
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            inputs: vec![
                Port::required("msg", PortType::Message, "message being answered"),
                Port::optional("memory_content", PortType::Text, "conversation history"),
            ],
            outputs: vec![Port::required("prompt", PortType::Text, "model prompt")],
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Block for PromptBuilder {
    fn kind(&self) -> &str {
        "prompt_builder"
    }

    fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    async fn execute(&self, inputs: BlockInputs) -> anyhow::Result<PortValues> {
        let msg = inputs.message("msg")?;
        let line = format!("{}: {}", msg.display_name(), msg.text);
        let prompt = match inputs.optional_text("memory_content") {
            Some(history) if !history.trim().is_empty() => {
                format!("Conversation so far:\n{history}\n\n{line}")
            },
            _ => line,
        };
        Ok(PortValues::from([("prompt".to_string(), PortValue::Text(prompt))]))
    }
}

/// Sends `prompt` to a [`ChatBackend`], output `llm_resp`.
pub struct ChatCompletion {
    backend: Arc<dyn ChatBackend>,
    system_prompt: Option<String>,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl ChatCompletion {
    pub fn new(backend: Arc<dyn ChatBackend>, system_prompt: Option<String>) -> Self {
        Self {
            backend,
            system_prompt,
            inputs: vec![Port::required("prompt", PortType::Text, "model prompt")],
            outputs: vec![Port::required("llm_resp", PortType::Response, "generated reply")],
        }
    }
}

#[async_trait]
impl Block for ChatCompletion {
    fn kind(&self) -> &str {
        "chat_completion"
    }

    fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    async fn execute(&self, inputs: BlockInputs) -> anyhow::Result<PortValues> {
        let request =
            ChatRequest::new(inputs.text("prompt")?).with_system(self.system_prompt.clone());
        let model = self.backend.model();
        debug!(model, prompt_len = request.prompt.len(), "requesting completion");
        let resp = self
            .backend
            .complete(&request)
            .await
            .with_context(|| format!("chat backend `{model}` failed"))?;
        Ok(PortValues::from([(
            "llm_resp".to_string(),
            PortValue::Response(resp),
        )]))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        anyhow::bail,
        switchyard_common::{GeneratedResponse, InboundMessage},
    };

    struct Down;

    #[async_trait]
    impl ChatBackend for Down {
        fn model(&self) -> &str {
            "down"
        }

        async fn complete(&self, _: &ChatRequest) -> anyhow::Result<GeneratedResponse> {
            bail!("connection refused")
        }
    }

    fn with_msg(extra: Option<&str>) -> BlockInputs {
        let mut values = PortValues::from([(
            "msg".to_string(),
            InboundMessage::new("alice", "what now?").into(),
        )]);
        if let Some(history) = extra {
            values.insert("memory_content".into(), history.into());
        }
        BlockInputs::new(values)
    }

    #[tokio::test]
    async fn prompt_includes_history_when_present() {
        let out = PromptBuilder::new()
            .execute(with_msg(Some("[user] alice: hi")))
            .await
            .unwrap();
        assert_eq!(
            out["prompt"],
            PortValue::from("Conversation so far:\n[user] alice: hi\n\nalice: what now?")
        );

        let out = PromptBuilder::new().execute(with_msg(Some(""))).await.unwrap();
        assert_eq!(out["prompt"], PortValue::from("alice: what now?"));
    }

    #[tokio::test]
    async fn backend_error_carries_model_name() {
        let block = ChatCompletion::new(Arc::new(Down), None);
        let inputs = BlockInputs::new(PortValues::from([("prompt".to_string(), "hi".into())]));
        let err = block.execute(inputs).await.unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("`down`"), "{text}");
        assert!(text.contains("connection refused"), "{text}");
    }
}
