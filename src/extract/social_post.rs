//! Single social post through the public syndication API
//!
//! No rendering engine is involved. A 404 or a tombstone payload is reported
//! as not-found, distinct from transport failures.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Write;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{API_USER_AGENT, FetchContext, Strategy, StrategyKind};
use crate::cache::cache_key;
use crate::error::ExtractError;

/// Fractional base-36 digits emitted for the syndication token
const TOKEN_FRACTION_DIGITS: usize = 11;

#[derive(Debug, Deserialize)]
struct SyndicatedPost {
    #[serde(rename = "__typename", default)]
    typename: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    user: Option<SyndicatedUser>,
    #[serde(default)]
    favorite_count: Option<u64>,
    #[serde(default)]
    conversation_count: Option<u64>,
    #[serde(default)]
    photos: Vec<SyndicatedPhoto>,
    #[serde(default)]
    quoted_tweet: Option<Box<SyndicatedPost>>,
}

#[derive(Debug, Deserialize)]
struct SyndicatedUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    screen_name: String,
}

#[derive(Debug, Deserialize)]
struct SyndicatedPhoto {
    url: String,
}

/// Token the syndication endpoint expects alongside a post id:
/// `(id / 1e15 * PI)` written in base 36 with zeros and the point removed.
#[must_use]
pub fn syndication_token(id: &str) -> String {
    let value = id.parse::<f64>().unwrap_or(0.0) / 1e15 * std::f64::consts::PI;
    let mut int_part = value.trunc() as u64;
    let mut frac = value.fract();

    let mut int_digits = Vec::new();
    loop {
        int_digits.push(base36_digit(int_part % 36));
        int_part /= 36;
        if int_part == 0 {
            break;
        }
    }
    let mut token: String = int_digits.into_iter().rev().collect();

    for _ in 0..TOKEN_FRACTION_DIGITS {
        if frac <= 0.0 {
            break;
        }
        frac *= 36.0;
        let digit = frac.trunc();
        token.push(base36_digit(digit as u64));
        frac -= digit;
    }

    token.retain(|c| c != '0');
    token
}

fn base36_digit(d: u64) -> char {
    char::from_digit((d % 36) as u32, 36).unwrap_or('0')
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

/// Numeric id after `status`, else a numeric last segment.
///
/// `/<handle>/status/<id>/photo/1` names post `<id>`, not `1`.
fn post_id(url: &Url) -> Option<&str> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    if let Some(pos) = segments
        .iter()
        .position(|s| matches!(*s, "status" | "statuses"))
    {
        return segments.get(pos + 1).copied().filter(|s| is_numeric(s));
    }
    segments.last().copied().filter(|s| is_numeric(s))
}

fn render(post: &SyndicatedPost, id: &str) -> String {
    let (name, handle) = post
        .user
        .as_ref()
        .map(|u| (u.name.as_str(), u.screen_name.as_str()))
        .unwrap_or(("Unknown", "unknown"));

    let mut out = format!("# Post by {name} (@{handle})\n\n{}\n", post.text.trim());

    for (i, photo) in post.photos.iter().enumerate() {
        let _ = write!(out, "\n![Photo {}]({})\n", i + 1, photo.url);
    }

    if let Some(quoted) = &post.quoted_tweet {
        let (qname, qhandle) = quoted
            .user
            .as_ref()
            .map(|u| (u.name.as_str(), u.screen_name.as_str()))
            .unwrap_or(("Unknown", "unknown"));
        let quoted_text = quoted.text.trim().replace('\n', "\n> ");
        let _ = write!(out, "\n> **Quoting {qname} (@{qhandle}):** {quoted_text}\n");
    }

    out.push('\n');
    if let Some(created) = &post.created_at {
        let _ = writeln!(out, "- Posted: {created}");
    }
    if let Some(likes) = post.favorite_count {
        let _ = writeln!(out, "- Likes: {likes}");
    }
    if let Some(replies) = post.conversation_count {
        let _ = writeln!(out, "- Replies: {replies}");
    }
    let _ = writeln!(out, "- Source: https://x.com/{handle}/status/{id}");
    out
}

pub struct SocialPostStrategy {
    http: reqwest::Client,
    base_url: String,
    ttl: Duration,
}

impl SocialPostStrategy {
    #[must_use]
    pub fn new(base_url: &str, ttl: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(API_USER_AGENT)
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            ttl,
        }
    }

    async fn fetch_post(&self, id: &str) -> Result<String, ExtractError> {
        let endpoint = format!(
            "{}/tweet-result?id={id}&lang=en&token={}",
            self.base_url,
            syndication_token(id)
        );
        debug!(%endpoint, "Fetching syndicated post");

        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .with_context(|| format!("Failed to fetch post {id}"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ExtractError::NotFound(format!("post {id} does not exist")));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ExtractError::RateLimited(format!(
                "syndication API throttled post {id}"
            )));
        }
        if !status.is_success() {
            return Err(ExtractError::Failed(format!(
                "syndication API returned {status} for post {id}"
            )));
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read post {id}"))?;
        if body.trim().is_empty() || body.trim() == "{}" {
            return Err(ExtractError::NotFound(format!("post {id} does not exist")));
        }

        let post: SyndicatedPost = serde_json::from_str(&body)
            .with_context(|| format!("Unexpected syndication payload for post {id}"))?;
        if post.typename.as_deref() == Some("TweetTombstone") {
            return Err(ExtractError::NotFound(format!("post {id} is unavailable")));
        }

        Ok(render(&post, id))
    }
}

#[async_trait]
impl Strategy for SocialPostStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SocialPost
    }

    fn shared_cache_ttl(&self) -> Option<Duration> {
        None
    }

    async fn fetch(&self, url: &Url, ctx: &FetchContext<'_>) -> Result<String, ExtractError> {
        let id = post_id(url)
            .ok_or_else(|| ExtractError::InvalidIdentifier(format!("no post id in {url}")))?
            .to_string();

        let key = cache_key(self.kind().name(), &id, false);
        ctx.cache
            .get_or_fetch(&key, self.ttl, ctx.bypass_cache, || self.fetch_post(&id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_deterministic_base36() {
        let token = syndication_token("1234567890123456789");
        assert_eq!(token, syndication_token("1234567890123456789"));
        assert!(!token.is_empty());
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() && c != '0'));
        assert_ne!(token, syndication_token("987654321987654321"));
    }

    #[test]
    fn extracts_numeric_tail() {
        let url = Url::parse("https://x.com/rustlang/status/1790000000000000000").unwrap();
        assert_eq!(post_id(&url), Some("1790000000000000000"));
        let url = Url::parse("https://x.com/rustlang").unwrap();
        assert_eq!(post_id(&url), None);
    }

    #[test]
    fn media_suffix_keeps_the_status_id() {
        let url = Url::parse("https://x.com/a/status/123/photo/1").unwrap();
        assert_eq!(post_id(&url), Some("123"));
        let url = Url::parse("https://twitter.com/a/status/456/video/2").unwrap();
        assert_eq!(post_id(&url), Some("456"));
        let url = Url::parse("https://x.com/a/status/notanid/photo/1").unwrap();
        assert_eq!(post_id(&url), None);
    }

    #[test]
    fn renders_quoted_post_and_counts() {
        let post: SyndicatedPost = serde_json::from_value(serde_json::json!({
            "__typename": "Tweet",
            "text": "Rust 2024 is out",
            "created_at": "2025-02-20T12:00:00.000Z",
            "user": {"name": "Rust", "screen_name": "rustlang"},
            "favorite_count": 10,
            "conversation_count": 2,
            "photos": [{"url": "https://pbs.twimg.com/media/a.jpg"}],
            "quoted_tweet": {"text": "Original", "user": {"name": "Q", "screen_name": "q"}}
        }))
        .unwrap();
        let doc = render(&post, "42");
        assert!(doc.starts_with("# Post by Rust (@rustlang)"));
        assert!(doc.contains("![Photo 1](https://pbs.twimg.com/media/a.jpg)"));
        assert!(doc.contains("> **Quoting Q (@q):** Original"));
        assert!(doc.contains("- Likes: 10"));
        assert!(doc.contains("https://x.com/rustlang/status/42"));
    }
}
