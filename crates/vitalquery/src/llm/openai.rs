use std::fmt::{Debug, Formatter};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatPrompt, LanguageModel, truncate_at_stop};
use crate::config::LlmConfig;

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiCompatibleModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
}

// The OpenAI API caps `stop` at four sequences; the rest are applied locally.
const MAX_STOP_SEQUENCES: usize = 4;

impl OpenAiCompatibleModel {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|value| !value.trim().is_empty());
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client for the language model")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

impl LanguageModel for OpenAiCompatibleModel {
    fn complete(&self, prompt: &ChatPrompt, stop: &[&str]) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &prompt.system,
                },
                WireMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: stop.iter().copied().take(MAX_STOP_SEQUENCES).collect(),
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(purpose = %prompt.purpose, %url, "llm: sending completion request");
        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .with_context(|| format!("language model request to `{url}` failed"))?;
        let status = response.status();
        let text = response
            .text()
            .with_context(|| format!("failed to read language model response from `{url}`"))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&text)
                .map(|api_error| api_error.error.message)
                .unwrap_or(text);
            bail!("language model returned HTTP {status}: {detail}");
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse language model response from `{url}`"))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| anyhow!("language model response from `{url}` had no choices"))?;
        Ok(truncate_at_stop(&content, stop).to_string())
    }
}

impl Debug for OpenAiCompatibleModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleModel")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field(
                "api_key",
                &self.api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
