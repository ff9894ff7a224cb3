//! Core configuration types for the conversion service
//!
//! `ServiceConfig` groups every tunable the service reads at startup. Instances
//! are produced by [`ServiceConfigBuilder`](super::builder::ServiceConfigBuilder)
//! which validates cross-field constraints.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_IDLE_TICK_SECS, DEFAULT_ITEM_TIMEOUT_SECS,
    DEFAULT_KEEP_ALIVE_SECS, DEFAULT_LAUNCH_ATTEMPTS, DEFAULT_MAX_CRAWL_LINKS,
    DEFAULT_PAGE_LOAD_TIMEOUT_SECS, DEFAULT_RATE_LIMIT_PER_MINUTE, FORUM_LISTING_TTL_SECS,
    FORUM_TOKEN_TTL_SECS, GENERIC_PAGE_TTL_SECS, SOCIAL_POST_TTL_SECS, SOCIAL_PROFILE_TTL_SECS,
    VIDEO_METADATA_TTL_SECS,
};

/// Main configuration struct for the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    /// Bearer token that bypasses rate limiting. `None` disables the bypass.
    #[serde(skip_serializing)]
    pub(crate) api_secret: Option<String>,
    pub(crate) browser: BrowserSettings,
    pub(crate) lifecycle: LifecycleSettings,
    pub(crate) cache: CacheSettings,
    pub(crate) crawl: CrawlSettings,
    pub(crate) rate_limit: RateLimitSettings,
    pub(crate) llm: LlmSettings,
    pub(crate) forum: ForumSettings,
    pub(crate) endpoints: UpstreamEndpoints,
}

/// Rendering engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Remote DevTools websocket URL. When set, the engine is connected to
    /// instead of launched locally.
    pub ws_url: Option<String>,
    /// Local Chromium executable; found or downloaded when unset
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub launch_attempts: u32,
    pub page_load_timeout_secs: u64,
    /// Upper bound for one fan-out item
    pub item_timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            ws_url: None,
            executable: None,
            headless: true,
            launch_attempts: DEFAULT_LAUNCH_ATTEMPTS,
            page_load_timeout_secs: DEFAULT_PAGE_LOAD_TIMEOUT_SECS,
            item_timeout_secs: DEFAULT_ITEM_TIMEOUT_SECS,
        }
    }
}

/// Idle lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSettings {
    pub tick_secs: u64,
    pub keep_alive_secs: u64,
    /// File holding the persisted idle counter. `None` keeps it in memory.
    pub state_path: Option<PathBuf>,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_IDLE_TICK_SECS,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            state_path: None,
        }
    }
}

/// Per-strategy cache TTLs and store capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub capacity: usize,
    pub generic_page_ttl_secs: u64,
    pub social_profile_ttl_secs: u64,
    pub social_post_ttl_secs: u64,
    pub video_ttl_secs: u64,
    pub forum_ttl_secs: u64,
    pub forum_token_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            generic_page_ttl_secs: GENERIC_PAGE_TTL_SECS,
            social_profile_ttl_secs: SOCIAL_PROFILE_TTL_SECS,
            social_post_ttl_secs: SOCIAL_POST_TTL_SECS,
            video_ttl_secs: VIDEO_METADATA_TTL_SECS,
            forum_ttl_secs: FORUM_LISTING_TTL_SECS,
            forum_token_ttl_secs: FORUM_TOKEN_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSettings {
    pub max_links: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_links: DEFAULT_MAX_CRAWL_LINKS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Requests per minute per caller. Zero disables limiting.
    pub per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
        }
    }
}

/// OpenAI-compatible chat completion endpoint used by the content filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Credentials for the authenticated forum API path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForumSettings {
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
}

/// Base URLs of upstream APIs. Overridable so tests can target a mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamEndpoints {
    pub syndication_base: String,
    pub forum_public_base: String,
    pub forum_oauth_base: String,
    pub forum_token_url: String,
}

impl Default for UpstreamEndpoints {
    fn default() -> Self {
        Self {
            syndication_base: "https://cdn.syndication.twimg.com".to_string(),
            forum_public_base: "https://www.reddit.com".to_string(),
            forum_oauth_base: "https://oauth.reddit.com".to_string(),
            forum_token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
        }
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn api_secret(&self) -> Option<&str> {
        self.api_secret.as_deref()
    }

    #[must_use]
    pub fn browser(&self) -> &BrowserSettings {
        &self.browser
    }

    #[must_use]
    pub fn lifecycle(&self) -> &LifecycleSettings {
        &self.lifecycle
    }

    #[must_use]
    pub fn cache(&self) -> &CacheSettings {
        &self.cache
    }

    #[must_use]
    pub fn crawl(&self) -> &CrawlSettings {
        &self.crawl
    }

    #[must_use]
    pub fn rate_limit(&self) -> &RateLimitSettings {
        &self.rate_limit
    }

    #[must_use]
    pub fn llm(&self) -> &LlmSettings {
        &self.llm
    }

    #[must_use]
    pub fn forum(&self) -> &ForumSettings {
        &self.forum
    }

    #[must_use]
    pub fn endpoints(&self) -> &UpstreamEndpoints {
        &self.endpoints
    }

    #[must_use]
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.page_load_timeout_secs)
    }

    #[must_use]
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.item_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            api_secret: None,
            browser: BrowserSettings::default(),
            lifecycle: LifecycleSettings::default(),
            cache: CacheSettings::default(),
            crawl: CrawlSettings::default(),
            rate_limit: RateLimitSettings::default(),
            llm: LlmSettings::default(),
            forum: ForumSettings::default(),
            endpoints: UpstreamEndpoints::default(),
        }
    }
}
