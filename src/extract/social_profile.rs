//! Social profile timeline through the rendering engine

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::page_load::{scroll_to_bottom, wait_for_page_load};
use super::scripts::PROFILE_POSTS_SCRIPT;
use super::{FetchContext, Strategy, StrategyKind};
use crate::browser::PageSession;
use crate::cache::cache_key;
use crate::error::ExtractError;

const SCROLL_PASSES: usize = 3;
const SCROLL_PAUSE: Duration = Duration::from_millis(1500);
const MAX_POSTS: usize = 10;

#[derive(Debug, Default, Deserialize)]
struct ProfileSnapshot {
    #[serde(default)]
    name: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    posts: Vec<String>,
}

impl ProfileSnapshot {
    fn is_empty(&self) -> bool {
        self.name.trim().is_empty() && self.bio.trim().is_empty() && self.posts.is_empty()
    }
}

/// Script result as a snapshot. Undecodable or empty results are failures so
/// they never reach the cache.
fn decode_snapshot(value: serde_json::Value, url: &Url) -> Result<ProfileSnapshot, ExtractError> {
    let snapshot: ProfileSnapshot = serde_json::from_value(value).map_err(|e| {
        warn!(url = %url, "Unexpected profile script result: {e}");
        ExtractError::Failed(format!("unreadable profile data for {url}: {e}"))
    })?;
    if snapshot.is_empty() {
        return Err(ExtractError::Failed(format!("no profile content rendered for {url}")));
    }
    Ok(snapshot)
}

fn handle_of(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut s| s.find(|seg| !seg.is_empty()))
        .unwrap_or("unknown")
        .to_string()
}

fn render(handle: &str, snapshot: &ProfileSnapshot) -> String {
    let title = if snapshot.name.trim().is_empty() {
        format!("@{handle}")
    } else {
        format!("{} (@{handle})", snapshot.name.trim())
    };

    let mut out = format!("# {title}\n\n");
    if !snapshot.bio.trim().is_empty() {
        let _ = write!(out, "{}\n\n", snapshot.bio.trim());
    }

    out.push_str("## Recent posts\n\n");
    if snapshot.posts.is_empty() {
        out.push_str("No posts could be read from this profile.\n");
    }
    for (i, post) in snapshot.posts.iter().take(MAX_POSTS).enumerate() {
        let indented = post.trim().replace('\n', "\n   ");
        let _ = writeln!(out, "{}. {indented}", i + 1);
    }
    let _ = write!(out, "\nSource: https://x.com/{handle}\n");
    out
}

pub struct SocialProfileStrategy {
    page_load_timeout: Duration,
    ttl: Duration,
}

impl SocialProfileStrategy {
    #[must_use]
    pub fn new(page_load_timeout: Duration, ttl: Duration) -> Self {
        Self {
            page_load_timeout,
            ttl,
        }
    }

    async fn scrape(&self, page: &dyn PageSession, url: &Url) -> Result<String, ExtractError> {
        page.navigate(url.as_str(), self.page_load_timeout).await?;
        wait_for_page_load(page, self.page_load_timeout.min(Duration::from_secs(10))).await;
        scroll_to_bottom(page, SCROLL_PASSES, SCROLL_PAUSE).await;

        let value = page.evaluate(PROFILE_POSTS_SCRIPT).await?;
        let snapshot = decode_snapshot(value, url)?;
        debug!(url = %url, posts = snapshot.posts.len(), "Profile snapshot extracted");
        Ok(render(&handle_of(url), &snapshot))
    }
}

#[async_trait]
impl Strategy for SocialProfileStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SocialProfile
    }

    fn shared_cache_ttl(&self) -> Option<Duration> {
        None
    }

    async fn fetch(&self, url: &Url, ctx: &FetchContext<'_>) -> Result<String, ExtractError> {
        let key = cache_key(self.kind().name(), url.as_str(), false);
        ctx.cache
            .get_or_fetch(&key, self.ttl, ctx.bypass_cache, || async {
                let page = ctx.acquire_page().await?;
                let result = self.scrape(&*page, url).await;
                page.release().await;
                result
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_numbered_posts() {
        let snapshot = ProfileSnapshot {
            name: "Rust Language".into(),
            bio: "Empowering everyone".into(),
            posts: vec!["First post text".into(), "Second\npost".into()],
        };
        let doc = render("rustlang", &snapshot);
        assert!(doc.starts_with("# Rust Language (@rustlang)"));
        assert!(doc.contains("1. First post text"));
        assert!(doc.contains("2. Second\n   post"));
    }

    #[test]
    fn empty_profile_still_renders() {
        let doc = render("ghost", &ProfileSnapshot::default());
        assert!(doc.starts_with("# @ghost"));
        assert!(doc.contains("No posts could be read"));
    }

    #[test]
    fn unexpected_script_results_are_failures() {
        let url = Url::parse("https://x.com/rustlang").unwrap();
        assert!(matches!(
            decode_snapshot(serde_json::json!("not an object"), &url),
            Err(ExtractError::Failed(_))
        ));
        assert!(matches!(
            decode_snapshot(serde_json::json!({}), &url),
            Err(ExtractError::Failed(_))
        ));
        let snapshot = decode_snapshot(serde_json::json!({"name": "Rust"}), &url).unwrap();
        assert_eq!(snapshot.name, "Rust");
    }

    #[test]
    fn handle_is_first_segment() {
        assert_eq!(handle_of(&Url::parse("https://x.com/rustlang").unwrap()), "rustlang");
    }
}
