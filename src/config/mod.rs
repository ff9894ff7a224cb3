//! Service configuration: settings types and their builder.

pub mod builder;
pub mod types;

pub use builder::ServiceConfigBuilder;
pub use types::{
    BrowserSettings, CacheSettings, CrawlSettings, ForumSettings, LifecycleSettings, LlmSettings,
    RateLimitSettings, ServiceConfig, UpstreamEndpoints,
};
