//! Concurrent fan-out over the extraction strategies
//!
//! [`Converter`] turns identifiers into [`ConversionResult`]s. Each identifier
//! runs the same pipeline independently:
//!
//! 1. per-caller rate limit (skipped for privileged callers)
//! 2. route to a strategy and fetch, through the shared cache when the
//!    strategy does not cache for itself
//! 3. optional content filter
//! 4. error sentinel classification (504 on a timeout signature, else 500)
//!
//! Panics and per-item time-outs are caught at the item boundary, so one bad
//! identifier never takes its siblings down. Results are raw bodies; callers
//! annotate them with [`ConversionResult::annotated`] when they need
//! frontmatter.

mod result;

pub use result::ConversionResult;

use futures::FutureExt;
use futures::future::join_all;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::RenderingResource;
use crate::cache::{CacheAside, MemoryKvStore, cache_key, is_error_body};
use crate::config::ServiceConfig;
use crate::error::{ExtractError, RateLimitKind, ServiceError, is_timeout_message};
use crate::extract::{FetchContext, StrategySet, route};
use crate::llm::{LlmClient, OpenAiCompatClient, apply_content_filter};
use crate::ratelimit::{RateLimitDecision, RateLimiter, TokenBucketLimiter};
use crate::utils::constants::{ERROR_SENTINEL, RATE_LIMIT_SENTINEL};

/// Mode flags shared by every identifier of one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionOptions {
    pub bypass_cache: bool,
    pub apply_content_filter: bool,
    pub crawl_linked: bool,
}

/// Who is asking. Privileged callers skip rate limiting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub ip: Option<String>,
    pub privileged: bool,
}

impl Caller {
    #[must_use]
    pub fn anonymous(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            privileged: false,
        }
    }

    #[must_use]
    pub fn privileged() -> Self {
        Self {
            ip: None,
            privileged: true,
        }
    }

    fn rate_limit_key(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }
}

/// A validated conversion request
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub url: Url,
    pub options: ConversionOptions,
    pub caller: Caller,
}

pub struct Converter {
    resource: Arc<dyn RenderingResource>,
    cache: CacheAside,
    limiter: Arc<dyn RateLimiter>,
    llm: Option<Arc<dyn LlmClient>>,
    strategies: StrategySet,
    item_timeout: Duration,
}

impl Converter {
    #[must_use]
    pub fn new(
        resource: Arc<dyn RenderingResource>,
        cache: CacheAside,
        limiter: Arc<dyn RateLimiter>,
        strategies: StrategySet,
    ) -> Self {
        Self {
            resource,
            cache,
            limiter,
            llm: None,
            strategies,
            item_timeout: Duration::from_secs(crate::utils::constants::DEFAULT_ITEM_TIMEOUT_SECS),
        }
    }

    /// Production wiring: in-process cache and limiter, strategies and LLM
    /// client from `config`.
    #[must_use]
    pub fn from_config(config: &ServiceConfig, resource: Arc<dyn RenderingResource>) -> Self {
        let cache = CacheAside::new(Arc::new(MemoryKvStore::new(config.cache().capacity)));
        let limiter = Arc::new(TokenBucketLimiter::new(config.rate_limit().per_minute));
        let llm = OpenAiCompatClient::from_settings(config.llm())
            .map(|client| Arc::new(client) as Arc<dyn LlmClient>);
        if llm.is_none() {
            debug!("No LLM endpoint configured, content filter requests will pass bodies through");
        }

        Self::new(resource, cache, limiter, StrategySet::from_config(config))
            .with_llm(llm)
            .with_item_timeout(config.item_timeout())
    }

    #[must_use]
    pub fn with_llm(mut self, llm: Option<Arc<dyn LlmClient>>) -> Self {
        self.llm = llm;
        self
    }

    #[must_use]
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    /// Convert every identifier concurrently. The output order matches `urls`.
    pub async fn convert_many(
        &self,
        urls: &[Url],
        options: &ConversionOptions,
        caller: &Caller,
    ) -> Vec<ConversionResult> {
        join_all(urls.iter().map(|url| self.convert_one(url, options, caller))).await
    }

    /// Convert one identifier. Never fails: every problem becomes an
    /// error-shaped result.
    pub async fn convert_one(
        &self,
        url: &Url,
        options: &ConversionOptions,
        caller: &Caller,
    ) -> ConversionResult {
        if !caller.privileged
            && let RateLimitDecision::Deny { retry_after } =
                self.limiter.check(caller.rate_limit_key()).await
        {
            debug!(url = %url, caller = caller.rate_limit_key(), "Rate limited");
            let err = ServiceError::RateLimited {
                kind: RateLimitKind::Platform,
                message: format!(
                    "Rate limit exceeded, retry after {}s",
                    retry_after.as_secs().max(1)
                ),
            };
            return ConversionResult::failure(url.as_str(), RATE_LIMIT_SENTINEL, 429, err.to_string());
        }

        let started = Instant::now();
        let work = AssertUnwindSafe(self.convert_unguarded(url, options)).catch_unwind();
        let result = match tokio::time::timeout(self.item_timeout, work).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                warn!(url = %url, "Extraction panicked: {message}");
                ConversionResult::failure(
                    url.as_str(),
                    format!("{ERROR_SENTINEL}Internal error while converting {url}"),
                    500,
                    format!("panic: {message}"),
                )
            }
            Err(_) => {
                let message = format!(
                    "Timeout after {}s converting {url}",
                    self.item_timeout.as_secs()
                );
                warn!(url = %url, "{message}");
                ConversionResult::failure(
                    url.as_str(),
                    format!("{ERROR_SENTINEL}{message}"),
                    504,
                    message,
                )
            }
        };

        info!(
            url = %url,
            status = result.status_code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Conversion finished"
        );
        result
    }

    async fn convert_unguarded(&self, url: &Url, options: &ConversionOptions) -> ConversionResult {
        match self.fetch(url, options).await {
            Ok(body) if is_error_body(&body) => {
                let status = if is_timeout_message(&body) { 504 } else { 500 };
                let details = body.trim_start_matches(ERROR_SENTINEL).to_string();
                ConversionResult::failure(url.as_str(), body, status, details)
            }
            Ok(body) => ConversionResult::success(url.as_str(), body),
            Err(e) => {
                warn!(url = %url, "Extraction failed: {}", e.details());
                ConversionResult::failure(
                    url.as_str(),
                    format!("{ERROR_SENTINEL}{e}"),
                    e.status(),
                    e.details(),
                )
            }
        }
    }

    async fn fetch(&self, url: &Url, options: &ConversionOptions) -> Result<String, ExtractError> {
        let kind = route(url);
        let strategy = self.strategies.get(kind);
        let ctx = FetchContext {
            resource: &*self.resource,
            cache: &self.cache,
            bypass_cache: options.bypass_cache,
        };
        let filter = options.apply_content_filter;
        debug!(url = %url, strategy = %kind, "Routed");

        match strategy.shared_cache_ttl() {
            Some(ttl) => {
                let key = cache_key(kind.name(), url.as_str(), filter);
                self.cache
                    .get_or_fetch(&key, ttl, options.bypass_cache, || async {
                        let body = strategy.fetch(url, &ctx).await?;
                        Ok::<_, ExtractError>(self.filter(filter, body).await)
                    })
                    .await
            }
            None => {
                let body = strategy.fetch(url, &ctx).await?;
                Ok(self.filter(filter, body).await)
            }
        }
    }

    async fn filter(&self, enabled: bool, body: String) -> String {
        if !enabled || is_error_body(&body) {
            return body;
        }
        apply_content_filter(self.llm.as_deref(), body).await
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
