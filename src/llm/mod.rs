//! LLM inference collaborator and the content filter built on it

mod client;

pub use client::OpenAiCompatClient;

use async_trait::async_trait;
use tracing::warn;

use crate::error::LlmError;

/// System prompt of the content filter
pub const CONTENT_FILTER_PROMPT: &str = "You clean up web page content converted to markdown. \
Keep only the main content of the page: remove navigation menus, cookie notices, \
advertisements, share buttons, comment sections, footers and unrelated links. \
Do not summarize or rewrite the remaining text. Return only the cleaned markdown.";

/// Single prompt-completion call
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Run `body` through the content filter.
///
/// Any failure (including an empty completion) returns the unfiltered body.
pub async fn apply_content_filter(client: Option<&dyn LlmClient>, body: String) -> String {
    let Some(client) = client else {
        warn!("Content filter requested but no LLM client is configured");
        return body;
    };

    match client.complete(CONTENT_FILTER_PROMPT, &body).await {
        Ok(filtered) if !filtered.trim().is_empty() => filtered,
        Ok(_) => {
            warn!("Content filter returned nothing, keeping unfiltered body");
            body
        }
        Err(e) => {
            warn!("Content filter failed, keeping unfiltered body: {e}");
            body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl LlmClient for Failing {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::EmptyCompletion)
        }
    }

    struct Upper;

    #[async_trait]
    impl LlmClient for Upper {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
            Ok(prompt.to_uppercase())
        }
    }

    #[tokio::test]
    async fn failure_returns_unfiltered_body() {
        let body = apply_content_filter(Some(&Failing), "keep me".into()).await;
        assert_eq!(body, "keep me");
        let body = apply_content_filter(None, "keep me".into()).await;
        assert_eq!(body, "keep me");
    }

    #[tokio::test]
    async fn success_replaces_body() {
        let body = apply_content_filter(Some(&Upper), "shout".into()).await;
        assert_eq!(body, "SHOUT");
    }
}
