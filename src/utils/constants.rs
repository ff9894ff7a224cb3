//! Shared constants for webdown
//!
//! Default values and wire-level markers used throughout the codebase to ensure
//! consistency and avoid magic numbers.

/// Cache TTL for generic page bodies (1 hour)
pub const GENERIC_PAGE_TTL_SECS: u64 = 3600;

/// Cache TTL for social profile timelines (30 minutes)
///
/// Profiles change more often than articles, so they expire sooner.
pub const SOCIAL_PROFILE_TTL_SECS: u64 = 1800;

/// Cache TTL for individual social posts (1 hour)
pub const SOCIAL_POST_TTL_SECS: u64 = 3600;

/// Cache TTL for video metadata documents (24 hours)
///
/// The document is derived purely from the identifier and never goes stale.
pub const VIDEO_METADATA_TTL_SECS: u64 = 86_400;

/// Cache TTL for forum listings (10 minutes)
pub const FORUM_LISTING_TTL_SECS: u64 = 600;

/// Cache TTL for the forum OAuth access token (50 minutes)
///
/// Tokens are issued for one hour; refreshing at 50 minutes keeps a margin.
pub const FORUM_TOKEN_TTL_SECS: u64 = 3000;

/// Number of attempts `ensure()` makes before declaring the engine unavailable
pub const DEFAULT_LAUNCH_ATTEMPTS: u32 = 3;

/// Idle timer tick (seconds added to the idle counter per firing)
pub const DEFAULT_IDLE_TICK_SECS: u64 = 10;

/// Idle seconds after which the rendering engine is torn down
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;

/// Timeout for `page.goto()` and the load wait that follows
pub const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 30;

/// Upper bound for one fan-out item, including cache and filter work
pub const DEFAULT_ITEM_TIMEOUT_SECS: u64 = 60;

/// Maximum number of same-site links followed from a crawl seed
pub const DEFAULT_MAX_CRAWL_LINKS: usize = 10;

/// Default per-caller request budget
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 30;

/// Default number of entries kept by the in-process KV store
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Prefix of every error body produced by an extraction strategy.
///
/// Upstream status mapping keys off this marker, so it must stay stable.
pub const ERROR_SENTINEL: &str = "Error: ";

/// Body returned when the caller exceeded the platform rate limit
pub const RATE_LIMIT_SENTINEL: &str = "Error: Rate limit exceeded. Try again later.";

/// Body returned when a forum upstream reported a rate limit on both API paths
pub const UPSTREAM_RATE_LIMIT_SENTINEL: &str = "Error: Upstream rate limit exceeded";

/// Heading that separates the seed document from embedded subpages in text crawls
pub const RELATED_SUBPAGES_HEADING: &str = "## Related Subpages";

/// Body length above which the summarization directive is appended
pub const SUMMARIZE_DIRECTIVE_MIN_CHARS: usize = 1000;

/// Body length above which the entity-extraction directive is appended
pub const ENTITY_DIRECTIVE_MIN_CHARS: usize = 3000;

/// Prefix for local Chromium profile directories.
///
/// Directories carrying this prefix that do not belong to the live handle are
/// treated as orphaned sessions and removed during launch recovery.
pub const PROFILE_DIR_PREFIX: &str = "webdown_chrome_";

/// Chrome user agent string used for rendering and upstream API calls
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
