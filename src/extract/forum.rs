//! Forum community listings
//!
//! The public JSON API is tried first. When it signals a rate limit (429, an
//! exhausted `x-ratelimit-remaining` header, or rate-limit wording in an error
//! body) the request is retried on the authenticated API with a
//! client-credentials token. The token is cached in the shared KV store with
//! its own TTL; a 401 on the authenticated path deletes it, fetches a fresh
//! one and retries exactly once.

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Response, StatusCode, header};
use serde::Deserialize;
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{API_USER_AGENT, FetchContext, Strategy, StrategyKind};
use crate::cache::CacheAside;
use crate::config::{ForumSettings, UpstreamEndpoints};
use crate::error::ExtractError;
use crate::utils::truncate_with_ellipsis;

/// KV key of the cached access token
pub const FORUM_TOKEN_CACHE_KEY: &str = "forum:token";

const MAX_POSTS: usize = 25;
const EXCERPT_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    is_self: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Outcome of one API call
enum Attempt {
    Body(String),
    RateLimited(String),
    Unauthorized,
}

/// Whether a public API response signals throttling
fn is_rate_limited(status: StatusCode, headers: &header::HeaderMap, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .is_some_and(|remaining| remaining <= 0.0);
    if exhausted {
        return true;
    }
    if !status.is_success() {
        let lower = body.to_lowercase();
        return lower.contains("rate limit") || lower.contains("too many requests");
    }
    false
}

/// Community name following the `/r/` segment
fn community_of(url: &Url) -> Option<String> {
    let segs: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    segs.windows(2)
        .find(|w| w[0].eq_ignore_ascii_case("r"))
        .map(|w| w[1].to_string())
}

/// Listing path without a trailing slash or `.json` suffix
fn listing_path(url: &Url) -> String {
    let path = url.path().trim_end_matches('/');
    path.strip_suffix(".json").unwrap_or(path).to_string()
}

fn render(community: &str, body: &str, public_base: &str) -> Result<String, ExtractError> {
    let value: serde_json::Value =
        serde_json::from_str(body).context("Forum API returned invalid JSON")?;

    // Listing pages return one listing; comment pages return an array of them.
    let listings: Vec<Listing> = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        other => vec![serde_json::from_value(other).context("Unexpected forum listing shape")?],
    };

    let posts: Vec<Post> = listings
        .into_iter()
        .flat_map(|l| l.data.children)
        .filter(|t| t.kind == "t3")
        .filter_map(|t| serde_json::from_value(t.data).ok())
        .take(MAX_POSTS)
        .collect();

    let mut out = format!("# r/{community}\n\n");
    if posts.is_empty() {
        out.push_str("No posts found in this listing.\n");
        return Ok(out);
    }

    for (i, post) in posts.iter().enumerate() {
        let link = format!("{}{}", public_base.trim_end_matches('/'), post.permalink);
        let _ = writeln!(out, "{}. **[{}]({link})**", i + 1, post.title.trim());
        let _ = writeln!(
            out,
            "   - u/{} · {} points · {} comments",
            post.author, post.score, post.num_comments
        );
        if !post.is_self
            && let Some(target) = post.url.as_deref().filter(|u| !u.is_empty())
        {
            let _ = writeln!(out, "   - Link: {target}");
        }
        let excerpt = post.selftext.trim();
        if !excerpt.is_empty() {
            let excerpt = truncate_with_ellipsis(excerpt, EXCERPT_CHARS).replace('\n', " ");
            let _ = writeln!(out, "   > {excerpt}");
        }
        out.push('\n');
    }
    Ok(out)
}

pub struct ForumListingStrategy {
    http: reqwest::Client,
    endpoints: UpstreamEndpoints,
    credentials: ForumSettings,
    ttl: Duration,
    token_ttl: Duration,
}

impl ForumListingStrategy {
    #[must_use]
    pub fn new(
        endpoints: UpstreamEndpoints,
        credentials: ForumSettings,
        ttl: Duration,
        token_ttl: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(API_USER_AGENT)
                .timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_default(),
            endpoints,
            credentials,
            ttl,
            token_ttl,
        }
    }

    fn has_credentials(&self) -> bool {
        self.credentials.client_id.is_some() && self.credentials.client_secret.is_some()
    }

    async fn read(response: Response) -> Result<(StatusCode, header::HeaderMap, String), ExtractError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .context("Failed to read forum API response")?;
        Ok((status, headers, body))
    }

    async fn fetch_public(&self, path: &str) -> Result<Attempt, ExtractError> {
        let endpoint = format!(
            "{}{path}.json?limit={MAX_POSTS}&raw_json=1",
            self.endpoints.forum_public_base.trim_end_matches('/')
        );
        debug!(%endpoint, "Fetching public forum listing");
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {endpoint}"))?;
        let (status, headers, body) = Self::read(response).await?;

        if is_rate_limited(status, &headers, &body) {
            return Ok(Attempt::RateLimited(format!(
                "public API throttled ({status})"
            )));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(Attempt::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ExtractError::NotFound(format!("listing {path} does not exist")));
        }
        if !status.is_success() {
            return Err(ExtractError::Failed(format!(
                "public forum API returned {status} for {path}"
            )));
        }
        Ok(Attempt::Body(body))
    }

    async fn fetch_oauth(&self, path: &str, token: &str) -> Result<Attempt, ExtractError> {
        let endpoint = format!(
            "{}{path}?limit={MAX_POSTS}&raw_json=1",
            self.endpoints.forum_oauth_base.trim_end_matches('/')
        );
        debug!(%endpoint, "Fetching authenticated forum listing");
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {endpoint}"))?;
        let (status, headers, body) = Self::read(response).await?;

        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized);
        }
        if is_rate_limited(status, &headers, &body) {
            return Ok(Attempt::RateLimited(format!(
                "authenticated API throttled ({status})"
            )));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ExtractError::NotFound(format!("listing {path} does not exist")));
        }
        if !status.is_success() {
            return Err(ExtractError::Failed(format!(
                "authenticated forum API returned {status} for {path}"
            )));
        }
        Ok(Attempt::Body(body))
    }

    /// Cached token, or a fresh one from the token endpoint.
    async fn access_token(&self, cache: &CacheAside) -> Result<String, ExtractError> {
        if let Some(token) = cache.get(FORUM_TOKEN_CACHE_KEY).await {
            return Ok(token);
        }

        let (Some(id), Some(secret)) = (
            self.credentials.client_id.as_deref(),
            self.credentials.client_secret.as_deref(),
        ) else {
            return Err(ExtractError::UpstreamAuth(
                "forum credentials are not configured".to_string(),
            ));
        };

        info!("Requesting forum access token");
        let basic = BASE64.encode(format!("{id}:{secret}"));
        let response = self
            .http
            .post(&self.endpoints.forum_token_url)
            .header(header::AUTHORIZATION, format!("Basic {basic}"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .context("Failed to request forum access token")?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::UpstreamAuth(format!(
                "token endpoint returned {status}"
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .context("Invalid forum token response")?;

        cache
            .put(FORUM_TOKEN_CACHE_KEY, &token.access_token, self.token_ttl)
            .await;
        Ok(token.access_token)
    }

    /// Authenticated path with one retry after a 401.
    async fn fetch_authenticated(
        &self,
        path: &str,
        cache: &CacheAside,
    ) -> Result<String, ExtractError> {
        let token = self.access_token(cache).await?;
        match self.fetch_oauth(path, &token).await? {
            Attempt::Body(body) => return Ok(body),
            Attempt::RateLimited(reason) => return Err(ExtractError::RateLimited(reason)),
            Attempt::Unauthorized => {
                warn!("Forum token rejected, refreshing once");
                cache.delete(FORUM_TOKEN_CACHE_KEY).await;
            }
        }

        let token = self.access_token(cache).await?;
        match self.fetch_oauth(path, &token).await? {
            Attempt::Body(body) => Ok(body),
            Attempt::RateLimited(reason) => Err(ExtractError::RateLimited(reason)),
            Attempt::Unauthorized => {
                cache.delete(FORUM_TOKEN_CACHE_KEY).await;
                Err(ExtractError::UpstreamAuth(
                    "forum API rejected a freshly issued token".to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl Strategy for ForumListingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ForumListing
    }

    fn shared_cache_ttl(&self) -> Option<Duration> {
        Some(self.ttl)
    }

    async fn fetch(&self, url: &Url, ctx: &FetchContext<'_>) -> Result<String, ExtractError> {
        let community = community_of(url)
            .ok_or_else(|| ExtractError::InvalidIdentifier(format!("no community in {url}")))?;
        let path = listing_path(url);

        let body = match self.fetch_public(&path).await? {
            Attempt::Body(body) => body,
            Attempt::RateLimited(reason) if !self.has_credentials() => {
                return Err(ExtractError::RateLimited(format!(
                    "{reason}, no credentials configured for the authenticated API"
                )));
            }
            Attempt::RateLimited(_) => {
                info!(url = %url, "Public forum API rate limited, using authenticated API");
                self.fetch_authenticated(&path, ctx.cache).await?
            }
            Attempt::Unauthorized => {
                return Err(ExtractError::Failed(format!(
                    "public forum API refused access to {path}"
                )));
            }
        };

        render(&community, &body, &self.endpoints.forum_public_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rate_limit_signals() {
        let mut headers = header::HeaderMap::new();
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, &headers, ""));
        assert!(!is_rate_limited(StatusCode::OK, &headers, "{}"));
        assert!(is_rate_limited(
            StatusCode::FORBIDDEN,
            &headers,
            "Too Many Requests"
        ));
        headers.insert("x-ratelimit-remaining", "0.0".parse().unwrap());
        assert!(is_rate_limited(StatusCode::OK, &headers, "{}"));
    }

    #[test]
    fn community_and_path() {
        let url = Url::parse("https://www.reddit.com/r/rust/top/").unwrap();
        assert_eq!(community_of(&url).as_deref(), Some("rust"));
        assert_eq!(listing_path(&url), "/r/rust/top");
    }

    #[test]
    fn renders_posts_with_excerpt() {
        let body = serde_json::json!({
            "kind": "Listing",
            "data": {"children": [
                {"kind": "t3", "data": {
                    "title": "Announcing Rust 1.85",
                    "author": "rustlang",
                    "score": 1200,
                    "num_comments": 150,
                    "permalink": "/r/rust/comments/abc/announcing/",
                    "selftext": "x".repeat(400),
                    "is_self": true
                }},
                {"kind": "t1", "data": {"body": "a comment"}}
            ]}
        })
        .to_string();
        let doc = render("rust", &body, "https://www.reddit.com").unwrap();
        assert!(doc.starts_with("# r/rust"));
        assert!(doc.contains(
            "1. **[Announcing Rust 1.85](https://www.reddit.com/r/rust/comments/abc/announcing/)**"
        ));
        assert!(doc.contains("u/rustlang · 1200 points · 150 comments"));
        assert!(doc.contains(&format!("> {}...", "x".repeat(300))));
        assert!(!doc.contains("a comment"));
    }
}
