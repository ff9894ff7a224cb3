//! Fluent builder for `ServiceConfig`
//!
//! Fields left unset keep their defaults. `build()` validates the combination
//! of values that cannot be checked one field at a time.

use anyhow::{Result, bail};
use std::path::PathBuf;

use super::types::{
    BrowserSettings, CacheSettings, CrawlSettings, ForumSettings, LifecycleSettings, LlmSettings,
    RateLimitSettings, ServiceConfig, UpstreamEndpoints,
};

#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn api_secret(mut self, secret: Option<String>) -> Self {
        self.config.api_secret = secret.filter(|s| !s.is_empty());
        self
    }

    #[must_use]
    pub fn browser_ws_url(mut self, ws_url: Option<String>) -> Self {
        self.config.browser.ws_url = ws_url.filter(|s| !s.is_empty());
        self
    }

    #[must_use]
    pub fn browser_executable(mut self, path: Option<PathBuf>) -> Self {
        self.config.browser.executable = path;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.browser.headless = headless;
        self
    }

    #[must_use]
    pub fn launch_attempts(mut self, attempts: u32) -> Self {
        self.config.browser.launch_attempts = attempts;
        self
    }

    #[must_use]
    pub fn page_load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.browser.page_load_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn item_timeout_secs(mut self, secs: u64) -> Self {
        self.config.browser.item_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn idle_tick_secs(mut self, secs: u64) -> Self {
        self.config.lifecycle.tick_secs = secs;
        self
    }

    #[must_use]
    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.config.lifecycle.keep_alive_secs = secs;
        self
    }

    #[must_use]
    pub fn state_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.lifecycle.state_path = path;
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: CacheSettings) -> Self {
        self.config.cache = cache;
        self
    }

    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache.capacity = capacity;
        self
    }

    #[must_use]
    pub fn max_crawl_links(mut self, max_links: usize) -> Self {
        self.config.crawl = CrawlSettings { max_links };
        self
    }

    #[must_use]
    pub fn rate_limit_per_minute(mut self, per_minute: u32) -> Self {
        self.config.rate_limit = RateLimitSettings { per_minute };
        self
    }

    #[must_use]
    pub fn llm(mut self, llm: LlmSettings) -> Self {
        self.config.llm = llm;
        self
    }

    #[must_use]
    pub fn forum(mut self, forum: ForumSettings) -> Self {
        self.config.forum = forum;
        self
    }

    #[must_use]
    pub fn endpoints(mut self, endpoints: UpstreamEndpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    #[must_use]
    pub fn browser(mut self, browser: BrowserSettings) -> Self {
        self.config.browser = browser;
        self
    }

    #[must_use]
    pub fn lifecycle(mut self, lifecycle: LifecycleSettings) -> Self {
        self.config.lifecycle = lifecycle;
        self
    }

    /// Validate and produce the final configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when a value would make the service unable to run:
    /// zero launch attempts, a zero idle tick, a keep-alive shorter than one
    /// tick, a zero cache capacity, or a malformed remote engine URL.
    pub fn build(self) -> Result<ServiceConfig> {
        let c = self.config;

        if c.browser.launch_attempts == 0 {
            bail!("launch_attempts must be at least 1");
        }
        if c.lifecycle.tick_secs == 0 {
            bail!("idle tick must be at least 1 second");
        }
        if c.lifecycle.keep_alive_secs < c.lifecycle.tick_secs {
            bail!(
                "keep-alive ({}s) must not be shorter than the idle tick ({}s)",
                c.lifecycle.keep_alive_secs,
                c.lifecycle.tick_secs
            );
        }
        if c.cache.capacity == 0 {
            bail!("cache capacity must be non-zero");
        }
        if let Some(ws) = &c.browser.ws_url {
            let parsed = url::Url::parse(ws)
                .map_err(|e| anyhow::anyhow!("Invalid browser websocket URL '{ws}': {e}"))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                bail!("browser websocket URL must use ws:// or wss://, got '{ws}'");
            }
        }
        if c.forum.client_id.is_some() != c.forum.client_secret.is_some() {
            bail!("forum client id and secret must be configured together");
        }

        Ok(c)
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::new()
    }
}
