//! Extraction router and strategies
//!
//! [`route`] picks a [`StrategyKind`] from the identifier alone; the
//! [`StrategySet`] maps each kind to the strategy instance that fetches it.
//! Strategies that talk to HTTP APIs own their client; strategies that render
//! pages borrow the shared rendering resource through [`FetchContext`].

mod forum;
mod generic;
pub mod markdown;
mod page_load;
mod router;
pub mod scripts;
mod social_post;
mod social_profile;
mod video;

pub use forum::{FORUM_TOKEN_CACHE_KEY, ForumListingStrategy};
pub use generic::GenericPageStrategy;
pub use router::{ROUTES, RouteRule, route};
pub use social_post::{SocialPostStrategy, syndication_token};
pub use social_profile::SocialProfileStrategy;
pub use video::{VideoMetadataStrategy, parse_video_id};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::browser::{PageGuard, RenderingResource};
use crate::cache::CacheAside;
use crate::config::ServiceConfig;
use crate::error::{ExtractError, ServiceError};

/// User agent sent to upstream JSON APIs
pub(crate) const API_USER_AGENT: &str = concat!("webdown/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    GenericPage,
    SocialProfile,
    SocialPost,
    VideoMetadata,
    ForumListing,
}

impl StrategyKind {
    /// Stable name, also the cache key prefix.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::GenericPage => "generic",
            Self::SocialProfile => "social-profile",
            Self::SocialPost => "social-post",
            Self::VideoMetadata => "video",
            Self::ForumListing => "forum",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared collaborators handed to a strategy for one fetch
pub struct FetchContext<'a> {
    pub resource: &'a dyn RenderingResource,
    pub cache: &'a CacheAside,
    pub bypass_cache: bool,
}

impl FetchContext<'_> {
    /// Ensure the rendering engine is alive and open a page on it.
    ///
    /// Called only on the paths that actually render, so cache hits never
    /// launch the engine.
    pub async fn acquire_page(&self) -> Result<PageGuard, ExtractError> {
        if !self.resource.ensure().await {
            let attempts = self.resource.attempts();
            return Err(ExtractError::EngineUnavailable(
                ServiceError::ResourceUnavailable { attempts }.to_string(),
            ));
        }
        self.resource
            .acquire_page()
            .await
            .map_err(|e| ExtractError::EngineUnavailable(format!("{e:#}")))
    }
}

#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// TTL for the shared cache layer. `None` means the strategy caches its
    /// own results and the orchestrator must not wrap it.
    fn shared_cache_ttl(&self) -> Option<Duration>;

    /// Raw body for `url`, before annotation.
    async fn fetch(&self, url: &Url, ctx: &FetchContext<'_>) -> Result<String, ExtractError>;
}

/// One strategy instance per kind
#[derive(Clone)]
pub struct StrategySet {
    generic: Arc<dyn Strategy>,
    social_profile: Arc<dyn Strategy>,
    social_post: Arc<dyn Strategy>,
    video: Arc<dyn Strategy>,
    forum: Arc<dyn Strategy>,
}

impl StrategySet {
    /// Production strategies configured from `config`.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        let cache = config.cache();
        let secs = Duration::from_secs;
        Self {
            generic: Arc::new(GenericPageStrategy::new(
                config.page_load_timeout(),
                secs(cache.generic_page_ttl_secs),
            )),
            social_profile: Arc::new(SocialProfileStrategy::new(
                config.page_load_timeout(),
                secs(cache.social_profile_ttl_secs),
            )),
            social_post: Arc::new(SocialPostStrategy::new(
                &config.endpoints().syndication_base,
                secs(cache.social_post_ttl_secs),
            )),
            video: Arc::new(VideoMetadataStrategy::new(secs(cache.video_ttl_secs))),
            forum: Arc::new(ForumListingStrategy::new(
                config.endpoints().clone(),
                config.forum().clone(),
                secs(cache.forum_ttl_secs),
                secs(cache.forum_token_ttl_secs),
            )),
        }
    }

    /// Replace the strategy registered for `strategy.kind()`.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        match strategy.kind() {
            StrategyKind::GenericPage => self.generic = strategy,
            StrategyKind::SocialProfile => self.social_profile = strategy,
            StrategyKind::SocialPost => self.social_post = strategy,
            StrategyKind::VideoMetadata => self.video = strategy,
            StrategyKind::ForumListing => self.forum = strategy,
        }
        self
    }

    #[must_use]
    pub fn get(&self, kind: StrategyKind) -> &Arc<dyn Strategy> {
        match kind {
            StrategyKind::GenericPage => &self.generic,
            StrategyKind::SocialProfile => &self.social_profile,
            StrategyKind::SocialPost => &self.social_post,
            StrategyKind::VideoMetadata => &self.video,
            StrategyKind::ForumListing => &self.forum,
        }
    }
}
