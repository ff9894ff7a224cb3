//! Test utilities shared by the webdown integration tests
//!
//! Fakes stand in for the rendering engine and the LLM so that the
//! orchestrator, lifecycle and HTTP layers run without Chromium or network.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use webdown::browser::{EngineHandle, Launcher, PageGuard, PageSession, RenderingResource};
use webdown::error::LlmError;
use webdown::extract::scripts::{BODY_TEXT_SCRIPT, PROFILE_POSTS_SCRIPT, READY_STATE_SCRIPT};
use webdown::llm::LlmClient;

/// Creates a test HTML document with specified content
#[allow(dead_code)]
pub fn create_test_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body>
    <nav><a href="/nav-only">Navigation</a></nav>
    <main>{body}</main>
    <footer>Footer text</footer>
</body>
</html>"#
    )
}

/// Per-URL behaviour of the fake engine
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum PageScript {
    Html(String),
    /// Navigation fails with this message
    NavigationError(String),
    /// Navigation succeeds after sleeping
    Slow(Duration, String),
}

/// Shared record of what the fake engine was asked to do
#[derive(Debug, Default)]
pub struct EngineLog {
    pub navigations: Mutex<Vec<String>>,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
}

#[allow(dead_code)]
impl EngineLog {
    pub async fn navigated(&self) -> Vec<String> {
        self.navigations.lock().await.clone()
    }

    pub fn open_pages(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst) - self.pages_closed.load(Ordering::SeqCst)
    }
}

pub struct FakePage {
    pages: Arc<Vec<(String, PageScript)>>,
    current: Mutex<Option<PageScript>>,
    profile: Option<Value>,
    log: Arc<EngineLog>,
}

impl FakePage {
    fn html(&self, script: Option<&PageScript>) -> String {
        match script {
            Some(PageScript::Html(html) | PageScript::Slow(_, html)) => html.clone(),
            _ => String::new(),
        }
    }
}

#[async_trait]
impl PageSession for FakePage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.log.navigations.lock().await.push(url.to_string());
        let script = self
            .pages
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, s)| s.clone())
            .unwrap_or_else(|| PageScript::Html(create_test_html("Default", "<p>Default page</p>")));

        match &script {
            PageScript::NavigationError(message) => return Err(anyhow!(message.clone())),
            PageScript::Slow(delay, _) => tokio::time::sleep(*delay).await,
            PageScript::Html(_) => {}
        }
        *self.current.lock().await = Some(script);
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html(self.current.lock().await.as_ref()))
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        if script == READY_STATE_SCRIPT {
            return Ok(json!({"readyState": "complete", "bodyExists": true, "imagesLoaded": true}));
        }
        if script == BODY_TEXT_SCRIPT {
            return Ok(json!(""));
        }
        if script == PROFILE_POSTS_SCRIPT {
            return Ok(self.profile.clone().unwrap_or_else(|| json!({})));
        }
        Ok(json!(0))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeHandle {
    pages: Arc<Vec<(String, PageScript)>>,
    profile: Option<Value>,
    log: Arc<EngineLog>,
    alive: Arc<AtomicBool>,
    pub closed: Arc<AtomicUsize>,
}

#[async_trait]
impl EngineHandle for FakeHandle {
    async fn probe(&self) -> Result<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(anyhow!("engine connection lost"))
        }
    }

    async fn new_page(&self) -> Result<Box<dyn PageSession>> {
        self.log.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            pages: Arc::clone(&self.pages),
            current: Mutex::new(None),
            profile: self.profile.clone(),
            log: Arc::clone(&self.log),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher with scripted failures and orphaned sessions
#[derive(Clone)]
pub struct FakeLauncher {
    pub pages: Arc<Vec<(String, PageScript)>>,
    pub profile: Option<Value>,
    pub log: Arc<EngineLog>,
    /// Launch attempts that fail before one succeeds
    pub failures_before_success: Arc<AtomicUsize>,
    pub launches: Arc<AtomicUsize>,
    pub alive: Arc<AtomicBool>,
    pub handle_closes: Arc<AtomicUsize>,
    pub sessions: Arc<Mutex<Vec<String>>>,
    /// Session ids whose close call fails
    pub stuck_sessions: Arc<Vec<String>>,
    pub closed_sessions: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl FakeLauncher {
    pub fn new(pages: Vec<(&str, PageScript)>) -> Self {
        Self {
            pages: Arc::new(pages.into_iter().map(|(p, s)| (p.to_string(), s)).collect()),
            profile: None,
            log: Arc::new(EngineLog::default()),
            failures_before_success: Arc::new(AtomicUsize::new(0)),
            launches: Arc::new(AtomicUsize::new(0)),
            alive: Arc::new(AtomicBool::new(true)),
            handle_closes: Arc::new(AtomicUsize::new(0)),
            sessions: Arc::new(Mutex::new(Vec::new())),
            stuck_sessions: Arc::new(Vec::new()),
            closed_sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_profile(mut self, profile: Value) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn failing(self, failures: usize) -> Self {
        self.failures_before_success.store(failures, Ordering::SeqCst);
        self
    }

    pub fn with_sessions(self, sessions: &[&str], stuck: &[&str]) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(sessions.iter().map(|s| (*s).to_string()).collect())),
            stuck_sessions: Arc::new(stuck.iter().map(|s| (*s).to_string()).collect()),
            ..self
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    type Handle = FakeHandle;

    async fn launch(&self) -> Result<FakeHandle> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_before_success.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_before_success.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("Failed to launch browser: port in use"));
        }
        self.alive.store(true, Ordering::SeqCst);
        Ok(FakeHandle {
            pages: Arc::clone(&self.pages),
            profile: self.profile.clone(),
            log: Arc::clone(&self.log),
            alive: Arc::clone(&self.alive),
            closed: Arc::clone(&self.handle_closes),
        })
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        Ok(self.sessions.lock().await.clone())
    }

    async fn close_session(&self, session_id: &str) -> Result<()> {
        if self.stuck_sessions.iter().any(|s| s == session_id) {
            return Err(anyhow!("session {session_id} refused to close"));
        }
        self.sessions.lock().await.retain(|s| s != session_id);
        self.closed_sessions.lock().await.push(session_id.to_string());
        Ok(())
    }
}

/// Rendering resource that counts shutdowns, for lifecycle tests
#[derive(Default)]
pub struct CountingResource {
    pub active: AtomicBool,
    pub shutdowns: AtomicUsize,
}

#[allow(dead_code)]
impl CountingResource {
    pub fn active() -> Self {
        Self {
            active: AtomicBool::new(true),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderingResource for CountingResource {
    async fn ensure(&self) -> bool {
        self.active.store(true, Ordering::SeqCst);
        true
    }

    async fn probe(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn acquire_page(&self) -> Result<PageGuard> {
        Err(anyhow!("CountingResource does not render"))
    }

    async fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn attempts(&self) -> u32 {
        1
    }
}

/// LLM that upper-cases its prompt, or fails when `fail` is set
#[derive(Default)]
pub struct FakeLlm {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(LlmError::EmptyCompletion)
        } else {
            Ok(prompt.to_uppercase())
        }
    }
}

/// Converter over a fake engine with an in-memory cache and no rate limit
#[allow(dead_code)]
pub struct Harness {
    pub launcher: FakeLauncher,
    pub resource: Arc<webdown::ResourceManager<FakeLauncher>>,
    pub store: Arc<webdown::MemoryKvStore>,
    pub converter: webdown::Converter,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(launcher: FakeLauncher) -> Self {
        Self::with_limiter(launcher, Arc::new(webdown::ratelimit::NoopLimiter))
    }

    pub fn with_limiter(
        launcher: FakeLauncher,
        limiter: Arc<dyn webdown::ratelimit::RateLimiter>,
    ) -> Self {
        let config = webdown::ServiceConfig::builder()
            .page_load_timeout_secs(2)
            .build()
            .expect("test config");
        Self::with_config(launcher, limiter, &config)
    }

    /// Strategies built from `config`, e.g. with upstream endpoints pointed
    /// at a mock server
    pub fn with_config(
        launcher: FakeLauncher,
        limiter: Arc<dyn webdown::ratelimit::RateLimiter>,
        config: &webdown::ServiceConfig,
    ) -> Self {
        let resource = Arc::new(webdown::ResourceManager::new(launcher.clone(), 3));
        let store = Arc::new(webdown::MemoryKvStore::new(100));
        let converter = webdown::Converter::new(
            Arc::clone(&resource) as Arc<dyn RenderingResource>,
            webdown::CacheAside::new(Arc::clone(&store) as Arc<dyn webdown::KvStore>),
            limiter,
            webdown::extract::StrategySet::from_config(config),
        )
        .with_item_timeout(Duration::from_secs(20));

        Self {
            launcher,
            resource,
            store,
            converter,
        }
    }
}
