//! Generic page extraction through the rendering engine
//!
//! Fallback chain:
//! 1. main-content container converted to markdown
//! 2. `document.body.innerText`
//! 3. hard failure (rendered upstream as an error sentinel body)

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::markdown::{document_title, extract_main_content, html_to_markdown};
use super::page_load::wait_for_page_load;
use super::scripts::BODY_TEXT_SCRIPT;
use super::{FetchContext, Strategy, StrategyKind};
use crate::browser::PageSession;
use crate::error::ExtractError;

/// Upper bound on the post-navigation settle wait
const MAX_SETTLE_WAIT: Duration = Duration::from_secs(10);

pub struct GenericPageStrategy {
    page_load_timeout: Duration,
    ttl: Duration,
}

impl GenericPageStrategy {
    #[must_use]
    pub fn new(page_load_timeout: Duration, ttl: Duration) -> Self {
        Self {
            page_load_timeout,
            ttl,
        }
    }

    async fn render(&self, page: &dyn PageSession, url: &Url) -> Result<String, ExtractError> {
        page.navigate(url.as_str(), self.page_load_timeout).await?;
        wait_for_page_load(page, self.page_load_timeout.min(MAX_SETTLE_WAIT)).await;

        let html = page.content().await?;
        match structured_markdown(&html) {
            Ok(markdown) if !markdown.trim().is_empty() => return Ok(markdown),
            Ok(_) => debug!(url = %url, "Structured extraction produced no text"),
            Err(e) => warn!(url = %url, "Structured extraction failed: {e:#}"),
        }

        let text = page
            .evaluate(BODY_TEXT_SCRIPT)
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::trim).map(str::to_string))
            .unwrap_or_default();
        if !text.is_empty() {
            debug!(url = %url, "Using raw body text");
            return Ok(match document_title(&html) {
                Some(title) => format!("# {title}\n\n{text}"),
                None => text,
            });
        }

        Err(ExtractError::Failed(format!(
            "No readable content found at {url}"
        )))
    }
}

/// Markdown of the main content, with the document title as a top-level
/// heading when the content has none of its own.
fn structured_markdown(html: &str) -> anyhow::Result<String> {
    let content = extract_main_content(html)?;
    let markdown = html_to_markdown(&content)?;
    if markdown.trim().is_empty() {
        return Ok(markdown);
    }

    let has_heading = markdown.lines().any(|l| l.starts_with("# "));
    Ok(match document_title(html) {
        Some(title) if !has_heading => format!("# {title}\n\n{markdown}"),
        _ => markdown,
    })
}

#[async_trait]
impl Strategy for GenericPageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::GenericPage
    }

    fn shared_cache_ttl(&self) -> Option<Duration> {
        Some(self.ttl)
    }

    async fn fetch(&self, url: &Url, ctx: &FetchContext<'_>) -> Result<String, ExtractError> {
        let page = ctx.acquire_page().await?;
        let result = self.render(&*page, url).await;
        page.release().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_prepended_when_content_has_no_heading() {
        let html = "<html><head><title>Docs</title></head><body><main><p>Hello there</p></main></body></html>";
        let markdown = structured_markdown(html).unwrap();
        assert!(markdown.starts_with("# Docs\n\n"));
        assert!(markdown.contains("Hello there"));
    }

    #[test]
    fn existing_heading_is_kept() {
        let html = "<html><head><title>Docs</title></head><body><article><h1>Guide</h1><p>Text</p></article></body></html>";
        let markdown = structured_markdown(html).unwrap();
        assert!(markdown.starts_with("# Guide"));
        assert!(!markdown.contains("# Docs"));
    }
}
