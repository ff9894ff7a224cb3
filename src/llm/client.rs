//! OpenAI-compatible chat completion client

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::LlmClient;
use crate::config::LlmSettings;
use crate::error::LlmError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiCompatClient {
    http_client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: build_http_client(),
            api_key: Some(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Client for the configured endpoint, or `None` when neither a key nor a
    /// custom base URL was supplied (no filter available).
    #[must_use]
    pub fn from_settings(settings: &LlmSettings) -> Option<Self> {
        if settings.api_key.is_none() && settings.base_url.is_none() {
            return None;
        }
        Some(Self {
            http_client: build_http_client(),
            api_key: settings.api_key.clone(),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Set a custom base URL (proxies, local inference servers).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

fn build_http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
        };

        let mut builder = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: ChatResponseRaw = response.json().await?;
        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(model = %self.model, chars = content.len(), "LLM completion received");

        if content.trim().is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(content)
    }
}
