//! End-to-end HTTP tests over the axum router

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::{FakeLauncher, Harness, PageScript, create_test_html};
use webdown::lifecycle::{AlarmOutcome, IdleController, MemoryStateStore};
use webdown::ratelimit::{RateLimiter, TokenBucketLimiter};
use webdown::utils::constants::RELATED_SUBPAGES_HEADING;
use webdown::{AppState, RenderingResource, create_router};

const SECRET: &str = "test-secret";

fn site() -> FakeLauncher {
    FakeLauncher::new(vec![
        (
            "https://example.com/a",
            PageScript::Html(create_test_html(
                "Page A",
                "<article><h1>Page A</h1><p>Details about A.</p></article>",
            )),
        ),
        (
            "https://example.com/b",
            PageScript::Slow(Duration::from_millis(10), "<html><body></body></html>".into()),
        ),
        (
            "https://example.com/slow",
            PageScript::Slow(
                Duration::from_secs(5),
                create_test_html("Slow", "<article><p>Eventually.</p></article>"),
            ),
        ),
        (
            "https://example.com/lonely",
            PageScript::Html(create_test_html(
                "Lonely",
                "<article><h1>Lonely</h1><p>No links here.</p></article>",
            )),
        ),
        (
            "https://example.com",
            PageScript::Html(create_test_html(
                "Example Domain",
                r#"<article><h1>Example Domain</h1>
                   <p>This domain is for use in examples.</p>
                   <p><a href="/a">Read A</a> and <a href="/b">Read B</a>
                   and <a href="https://elsewhere.test/">elsewhere</a>.</p></article>"#,
            )),
        ),
    ])
}

struct App {
    router: axum::Router,
    lifecycle: Arc<IdleController>,
}

fn app_with(limiter: Arc<dyn RateLimiter>) -> App {
    let h = Harness::with_limiter(site(), limiter);
    let lifecycle = Arc::new(IdleController::new(
        Arc::new(MemoryStateStore::new()),
        Arc::clone(&h.resource) as Arc<dyn RenderingResource>,
        10,
        60,
    ));
    let state = AppState {
        converter: Arc::new(h.converter),
        lifecycle: Arc::clone(&lifecycle),
        api_secret: Some(SECRET.to_string()),
        max_links: 10,
    };
    App {
        router: create_router(state),
        lifecycle,
    }
}

fn app() -> App {
    app_with(Arc::new(webdown::ratelimit::NoopLimiter))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_json(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::empty())
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn json_single_page_has_frontmatter_and_no_error() {
    let app = app();
    let response = app
        .router
        .oneshot(get_json("/?url=https://example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );

    let results: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    let items = results.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].get("error").is_none());

    let md = items[0]["md"].as_str().unwrap();
    assert!(md.starts_with("---\n"));
    let (_, rest) = md.split_once("\n---\n").expect("closing frontmatter delimiter");
    assert!(rest.contains("This domain is for use in examples."));
    assert!(md.contains("title: Example Domain"));
}

#[tokio::test]
async fn missing_url_serves_help_page() {
    let response = app().router.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert!(body_text(response).await.contains("<html"));
}

#[tokio::test]
async fn invalid_or_empty_url_is_rejected() {
    for uri in ["/?url=", "/?url=not-a-url", "/?url=ftp://example.com/file"] {
        let response = app().router.oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], true);
        assert_eq!(body["status"], 400);
    }
}

#[tokio::test]
async fn non_get_is_405() {
    let request = Request::builder()
        .method("POST")
        .uri("/?url=https://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app().router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn text_crawl_embeds_successful_subpages() {
    let response = app()
        .router
        .oneshot(get("/?url=https://example.com&subpages=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/markdown")
    );

    let body = body_text(response).await;
    assert!(body.starts_with("---\n"));
    assert!(body.contains(RELATED_SUBPAGES_HEADING));
    assert!(body.contains("### Page A"));
    assert!(body.contains("Details about A."));
    assert!(!body.contains("Source: https://example.com/b"));
}

#[tokio::test]
async fn text_crawl_without_subpages_omits_section() {
    let response = app()
        .router
        .oneshot(get("/?url=https://example.com/lonely&subpages=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("No links here."));
    assert!(!body.contains(RELATED_SUBPAGES_HEADING));
}

#[tokio::test]
async fn json_crawl_returns_seed_then_subpages() {
    let response = app()
        .router
        .oneshot(get_json("/?url=https://example.com&subpages=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let results: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    let items = results.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["url"], "https://example.com/");
    assert_eq!(items[1]["url"], "https://example.com/a");
    assert_eq!(items[2]["url"], "https://example.com/b");
    assert!(items[1]["md"].as_str().unwrap().starts_with("---\n"));
    assert_eq!(items[2]["error"], true);
    assert_eq!(items[2]["status"], 500);
}

#[tokio::test]
async fn rate_limit_applies_unless_bearer_matches() {
    let app = app_with(Arc::new(TokenBucketLimiter::new(1)));

    let first = app
        .router
        .clone()
        .oneshot(get("/?url=https://example.com/a"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .router
        .clone()
        .oneshot(get("/?url=https://example.com/a"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = serde_json::from_str(&body_text(second).await).unwrap();
    assert_eq!(body["status"], 429);

    let privileged = Request::builder()
        .uri("/?url=https://example.com/a")
        .header(header::AUTHORIZATION, format!("Bearer {SECRET}"))
        .body(Body::empty())
        .unwrap();
    let third = app.router.oneshot(privileged).await.unwrap();
    assert_eq!(third.status(), StatusCode::OK);
}

#[tokio::test]
async fn requests_arm_the_idle_timer_and_health_reports_state() {
    let app = app();

    let health = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(health).await).unwrap();
    assert_eq!(body["engine"], "cold");
    assert!(!app.lifecycle.is_armed().await);

    let response = app
        .router
        .clone()
        .oneshot(get("/?url=https://example.com/a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.lifecycle.is_armed().await);

    let health = app.router.oneshot(get("/health")).await.unwrap();
    let body: serde_json::Value = serde_json::from_str(&body_text(health).await).unwrap();
    assert_eq!(body["engine"], "warm");
}

#[tokio::test]
async fn client_disconnect_does_not_block_idle_teardown() {
    let app = app();

    // The client gives up while the page is still loading.
    let abandoned = tokio::time::timeout(
        Duration::from_millis(300),
        app.router
            .clone()
            .oneshot(get("/?url=https://example.com/slow")),
    )
    .await;
    assert!(abandoned.is_err());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !app.lifecycle.is_armed().await && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(app.lifecycle.is_armed().await);

    let response = app
        .router
        .clone()
        .oneshot(get("/?url=https://example.com/a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut outcome = AlarmOutcome::Ignored;
    for _ in 0..6 {
        outcome = app.lifecycle.alarm().await;
    }
    assert_eq!(outcome, AlarmOutcome::TornDown { idle_seconds: 60 });

    let health = app.router.oneshot(get("/health")).await.unwrap();
    let body: serde_json::Value = serde_json::from_str(&body_text(health).await).unwrap();
    assert_eq!(body["engine"], "cold");
}
