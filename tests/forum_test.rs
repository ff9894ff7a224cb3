//! Forum listing strategy against a mock upstream

mod common;

use mockito::{Matcher, Server, ServerGuard};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use common::{FakeLauncher, Harness};
use webdown::config::{ForumSettings, UpstreamEndpoints};
use webdown::extract::FORUM_TOKEN_CACHE_KEY;
use webdown::ratelimit::NoopLimiter;
use webdown::{Caller, ConversionOptions, ServiceConfig};

const LISTING_URL: &str = "https://www.reddit.com/r/rust/top/";

fn listing_body() -> String {
    serde_json::json!({
        "kind": "Listing",
        "data": {"children": [
            {"kind": "t3", "data": {
                "title": "Borrow checker tips",
                "author": "ferris",
                "score": 42,
                "num_comments": 7,
                "permalink": "/r/rust/comments/xyz/borrow_checker_tips/",
                "selftext": "Some advice.",
                "is_self": true
            }}
        ]}
    })
    .to_string()
}

fn harness(server: &ServerGuard, credentials: bool) -> Harness {
    let forum = if credentials {
        ForumSettings {
            client_id: Some("client".into()),
            client_secret: Some("secret".into()),
        }
    } else {
        ForumSettings::default()
    };
    let config = ServiceConfig::builder()
        .forum(forum)
        .endpoints(UpstreamEndpoints {
            syndication_base: server.url(),
            forum_public_base: server.url(),
            forum_oauth_base: format!("{}/oauth", server.url()),
            forum_token_url: format!("{}/token", server.url()),
        })
        .build()
        .unwrap();
    Harness::with_config(FakeLauncher::new(vec![]), Arc::new(NoopLimiter), &config)
}

async fn convert(h: &Harness) -> webdown::ConversionResult {
    h.converter
        .convert_one(
            &Url::parse(LISTING_URL).unwrap(),
            &ConversionOptions::default(),
            &Caller::privileged(),
        )
        .await
}

#[tokio::test]
async fn public_listing_renders_without_token() {
    let mut server = Server::new_async().await;
    let public = server
        .mock("GET", "/r/rust/top.json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(listing_body())
        .create_async()
        .await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;

    let h = harness(&server, true);
    let result = convert(&h).await;

    assert!(!result.is_error(), "{:?}", result.error_details);
    assert!(result.md.starts_with("# r/rust"));
    assert!(result.md.contains("Borrow checker tips"));
    assert!(result.md.contains("u/ferris · 42 points · 7 comments"));
    public.assert_async().await;
    token.assert_async().await;
    assert_eq!(h.launcher.launch_count(), 0);
}

#[tokio::test]
async fn throttled_public_api_falls_back_to_oauth() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/r/rust/top.json")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body("Too Many Requests")
        .create_async()
        .await;
    let token = server
        .mock("POST", "/token")
        .match_header("authorization", Matcher::Regex("^Basic ".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"tok-1","token_type":"bearer","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;
    let oauth = server
        .mock("GET", "/oauth/r/rust/top")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer tok-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(listing_body())
        .create_async()
        .await;

    let h = harness(&server, true);
    let result = convert(&h).await;

    assert!(!result.is_error(), "{:?}", result.error_details);
    assert!(result.md.contains("Borrow checker tips"));
    token.assert_async().await;
    oauth.assert_async().await;
    assert_eq!(
        h.converter.cache().get(FORUM_TOKEN_CACHE_KEY).await.as_deref(),
        Some("tok-1")
    );
}

#[tokio::test]
async fn rejected_token_is_refreshed_once() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/r/rust/top.json")
        .match_query(Matcher::Any)
        .with_status(429)
        .create_async()
        .await;
    let stale = server
        .mock("GET", "/oauth/r/rust/top")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let fresh = server
        .mock("GET", "/oauth/r/rust/top")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(listing_body())
        .expect(1)
        .create_async()
        .await;
    let token = server
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"fresh"}"#)
        .expect(1)
        .create_async()
        .await;

    let h = harness(&server, true);
    h.converter
        .cache()
        .put(FORUM_TOKEN_CACHE_KEY, "stale", Duration::from_secs(3600))
        .await;

    let result = convert(&h).await;

    assert!(!result.is_error(), "{:?}", result.error_details);
    stale.assert_async().await;
    fresh.assert_async().await;
    token.assert_async().await;
    assert_eq!(
        h.converter.cache().get(FORUM_TOKEN_CACHE_KEY).await.as_deref(),
        Some("fresh")
    );
}

#[tokio::test]
async fn throttled_without_credentials_is_429() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/r/rust/top.json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("x-ratelimit-remaining", "0")
        .with_body(listing_body())
        .create_async()
        .await;

    let h = harness(&server, false);
    let result = convert(&h).await;

    assert_eq!(result.error, Some(true));
    assert_eq!(result.status, Some(429));
}

#[tokio::test]
async fn missing_community_is_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/r/rust/top.json")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let h = harness(&server, true);
    let result = convert(&h).await;

    assert_eq!(result.status, Some(500));
    assert!(result.error_details.unwrap_or_default().contains("does not exist"));
}
