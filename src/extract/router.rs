//! Identifier classification
//!
//! Rules are evaluated top to bottom and the first match wins:
//!
//! | rule              | matches                                         | strategy        |
//! |-------------------|-------------------------------------------------|-----------------|
//! | video             | youtube.com, youtu.be                           | VideoMetadata   |
//! | social-post       | twitter.com / x.com, numeric last path segment  | SocialPost      |
//! | social-profile    | twitter.com / x.com, single handle segment      | SocialProfile   |
//! | social-ambiguous  | any other twitter.com / x.com path              | GenericPage     |
//! | forum             | reddit.com with an `/r/<community>` segment     | ForumListing    |
//! | (default)         | everything else                                 | GenericPage     |
//!
//! Routing is pure string inspection; no I/O happens here.

use tracing::warn;
use url::Url;

use super::StrategyKind;
use crate::utils::normalized_host;

const VIDEO_HOSTS: &[&str] = &["youtube.com", "m.youtube.com", "music.youtube.com", "youtu.be"];
const SOCIAL_HOSTS: &[&str] = &["twitter.com", "x.com", "mobile.twitter.com", "mobile.x.com"];
const FORUM_HOSTS: &[&str] = &["reddit.com", "old.reddit.com", "new.reddit.com", "np.reddit.com"];

/// First path segments on social hosts that are app routes, not handles
const RESERVED_SOCIAL_PATHS: &[&str] = &[
    "home",
    "explore",
    "search",
    "i",
    "settings",
    "notifications",
    "messages",
    "hashtag",
    "intent",
    "share",
    "login",
    "signup",
    "tos",
    "privacy",
];

pub struct RouteRule {
    pub name: &'static str,
    pub matches: fn(&Url) -> bool,
    pub strategy: StrategyKind,
}

/// The routing table, in precedence order.
pub const ROUTES: &[RouteRule] = &[
    RouteRule {
        name: "video",
        matches: is_video_url,
        strategy: StrategyKind::VideoMetadata,
    },
    RouteRule {
        name: "social-post",
        matches: is_social_post,
        strategy: StrategyKind::SocialPost,
    },
    RouteRule {
        name: "social-profile",
        matches: is_social_profile,
        strategy: StrategyKind::SocialProfile,
    },
    RouteRule {
        name: "social-ambiguous",
        matches: is_social_host,
        strategy: StrategyKind::GenericPage,
    },
    RouteRule {
        name: "forum",
        matches: is_forum_listing,
        strategy: StrategyKind::ForumListing,
    },
];

/// Strategy for an identifier.
#[must_use]
pub fn route(url: &Url) -> StrategyKind {
    match ROUTES.iter().find(|rule| (rule.matches)(url)) {
        Some(rule) => {
            if rule.name == "social-ambiguous" {
                warn!(url = %url, "Social URL is neither a post nor a profile, using generic page extraction");
            }
            rule.strategy
        }
        None => StrategyKind::GenericPage,
    }
}

fn host_in(url: &Url, hosts: &[&str]) -> bool {
    normalized_host(url).is_some_and(|h| hosts.contains(&h.as_str()))
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default()
}

pub fn is_video_url(url: &Url) -> bool {
    host_in(url, VIDEO_HOSTS)
}

pub fn is_social_host(url: &Url) -> bool {
    host_in(url, SOCIAL_HOSTS)
}

/// `/<handle>/status/<digits>` and other shapes ending in a numeric segment
pub fn is_social_post(url: &Url) -> bool {
    if !is_social_host(url) {
        return false;
    }
    let segs = segments(url);
    segs.len() >= 2
        && segs
            .last()
            .is_some_and(|last| last.chars().all(|c| c.is_ascii_digit()))
}

/// `/<handle>` where the handle is not numeric and not an app route
pub fn is_social_profile(url: &Url) -> bool {
    if !is_social_host(url) {
        return false;
    }
    match segments(url).as_slice() {
        [handle] => {
            !handle.chars().all(|c| c.is_ascii_digit())
                && !RESERVED_SOCIAL_PATHS.contains(&handle.to_ascii_lowercase().as_str())
                && handle
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Any path under `/r/<community>`
pub fn is_forum_listing(url: &Url) -> bool {
    if !host_in(url, FORUM_HOSTS) {
        return false;
    }
    let segs = segments(url);
    segs.windows(2).any(|w| w[0].eq_ignore_ascii_case("r") && !w[1].is_empty())
}
