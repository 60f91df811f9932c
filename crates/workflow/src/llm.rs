//! Seam between pipelines and whatever generates replies.

use {async_trait::async_trait, switchyard_common::GeneratedResponse};

/// One completion request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub prompt: String,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model identifier recorded on replies.
    fn model(&self) -> &str;

    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<GeneratedResponse>;
}

/// Replies with the last line of the prompt. Used when no model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoBackend;

#[async_trait]
impl ChatBackend for EchoBackend {
    fn model(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<GeneratedResponse> {
        let last = request.prompt.lines().last().unwrap_or_default();
        Ok(GeneratedResponse::new(format!("echo: {last}")).with_model(self.model()))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_repeats_last_line() {
        let request = ChatRequest::new("context\nalice: hello");
        let reply = EchoBackend.complete(&request).await.unwrap();
        assert_eq!(reply.content, "echo: alice: hello");
        assert_eq!(reply.model.as_deref(), Some("echo"));
    }
}
