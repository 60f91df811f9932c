//! Chat backends selected by `[llm] backend`.

use std::{sync::Arc, time::Duration};

use {
    anyhow::{Context, bail},
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    switchyard_common::GeneratedResponse,
    switchyard_config::{LlmBackendKind, LlmConfig},
    switchyard_workflow::{ChatBackend, ChatRequest, llm::EchoBackend},
    tracing::{debug, trace, warn},
};

pub fn build_backend(config: &LlmConfig) -> anyhow::Result<Arc<dyn ChatBackend>> {
    Ok(match config.backend {
        LlmBackendKind::Echo => Arc::new(EchoBackend),
        LlmBackendKind::OpenAi => Arc::new(OpenAiBackend::new(config)?),
    })
}

/// Any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<Secret<String>>,
}

impl OpenAiBackend {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

fn request_body(model: &str, request: &ChatRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(serde_json::json!({ "role": "system", "content": system }));
    }
    messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));
    serde_json::json!({ "model": model, "messages": messages })
}

fn parse_completion(
    resp: &serde_json::Value,
    fallback_model: &str,
) -> anyhow::Result<GeneratedResponse> {
    let content = resp["choices"][0]["message"]["content"]
        .as_str()
        .context("completion response has no message content")?;
    let model = resp["model"].as_str().unwrap_or(fallback_model);
    Ok(GeneratedResponse::new(content).with_model(model))
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<GeneratedResponse> {
        let body = request_body(&self.model, request);
        debug!(model = %self.model, prompt_len = request.prompt.len(), "chat completion request");
        trace!(body = %body, "chat completion request body");

        let mut http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key.expose_secret());
        }

        let http_resp = http.send().await?;
        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body_text, "chat completion API error");
            bail!("chat completion API error HTTP {status}: {body_text}");
        }

        let resp = http_resp.json::<serde_json::Value>().await?;
        trace!(response = %resp, "chat completion raw response");
        parse_completion(&resp, &self.model)
    }
}
