//! webdown HTTP service
//!
//! Serves the conversion endpoint, drives the idle lifecycle timer, and
//! closes the rendering engine on ctrl-c.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webdown::browser::{BrowserManager, ChromeLauncher, RenderingResource};
use webdown::config::{ForumSettings, LlmSettings, ServiceConfig, UpstreamEndpoints};
use webdown::lifecycle::{
    FileStateStore, IdleController, MemoryStateStore, StateStore, spawn_alarm_driver,
};
use webdown::orchestrator::Converter;
use webdown::server::{AppState, serve};
use webdown::utils::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_IDLE_TICK_SECS, DEFAULT_ITEM_TIMEOUT_SECS,
    DEFAULT_KEEP_ALIVE_SECS, DEFAULT_LAUNCH_ATTEMPTS, DEFAULT_MAX_CRAWL_LINKS,
    DEFAULT_PAGE_LOAD_TIMEOUT_SECS, DEFAULT_RATE_LIMIT_PER_MINUTE,
};

#[derive(Parser, Debug)]
#[command(name = "webdown")]
#[command(about = "Convert web resources into annotated markdown over HTTP")]
#[command(version)]
struct Cli {
    #[arg(long, env = "WEBDOWN_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "WEBDOWN_PORT", default_value_t = 8787)]
    port: u16,

    /// Bearer token that bypasses the per-caller rate limit
    #[arg(long, env = "WEBDOWN_API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,

    /// Connect to a remote DevTools endpoint instead of launching Chromium
    #[arg(long, env = "WEBDOWN_BROWSER_WS_URL")]
    browser_ws_url: Option<String>,

    /// Chromium executable for local launches
    #[arg(long, env = "WEBDOWN_BROWSER_PATH")]
    browser_path: Option<PathBuf>,

    /// Show the local browser window
    #[arg(long, env = "WEBDOWN_HEADFUL")]
    headful: bool,

    #[arg(long, env = "WEBDOWN_LAUNCH_ATTEMPTS", default_value_t = DEFAULT_LAUNCH_ATTEMPTS)]
    launch_attempts: u32,

    #[arg(long, env = "WEBDOWN_PAGE_LOAD_TIMEOUT", default_value_t = DEFAULT_PAGE_LOAD_TIMEOUT_SECS)]
    page_load_timeout: u64,

    #[arg(long, env = "WEBDOWN_ITEM_TIMEOUT", default_value_t = DEFAULT_ITEM_TIMEOUT_SECS)]
    item_timeout: u64,

    #[arg(long, env = "WEBDOWN_IDLE_TICK", default_value_t = DEFAULT_IDLE_TICK_SECS)]
    idle_tick: u64,

    /// Idle seconds before the rendering engine is closed
    #[arg(long, env = "WEBDOWN_KEEP_ALIVE", default_value_t = DEFAULT_KEEP_ALIVE_SECS)]
    keep_alive: u64,

    /// Persist the idle counter to this file
    #[arg(long, env = "WEBDOWN_STATE_PATH")]
    state_path: Option<PathBuf>,

    #[arg(long, env = "WEBDOWN_CACHE_CAPACITY", default_value_t = DEFAULT_CACHE_CAPACITY)]
    cache_capacity: usize,

    #[arg(long, env = "WEBDOWN_MAX_CRAWL_LINKS", default_value_t = DEFAULT_MAX_CRAWL_LINKS)]
    max_crawl_links: usize,

    /// Requests per minute per caller (0 disables the limit)
    #[arg(long, env = "WEBDOWN_RATE_LIMIT", default_value_t = DEFAULT_RATE_LIMIT_PER_MINUTE)]
    rate_limit: u32,

    #[arg(long, env = "WEBDOWN_LLM_BASE_URL")]
    llm_base_url: Option<String>,

    #[arg(long, env = "WEBDOWN_LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    #[arg(long, env = "WEBDOWN_LLM_MODEL")]
    llm_model: Option<String>,

    #[arg(long, env = "WEBDOWN_FORUM_CLIENT_ID")]
    forum_client_id: Option<String>,

    #[arg(long, env = "WEBDOWN_FORUM_CLIENT_SECRET", hide_env_values = true)]
    forum_client_secret: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ServiceConfig> {
        ServiceConfig::builder()
            .host(self.host)
            .port(self.port)
            .api_secret(self.api_secret)
            .browser_ws_url(self.browser_ws_url)
            .browser_executable(self.browser_path)
            .headless(!self.headful)
            .launch_attempts(self.launch_attempts)
            .page_load_timeout_secs(self.page_load_timeout)
            .item_timeout_secs(self.item_timeout)
            .idle_tick_secs(self.idle_tick)
            .keep_alive_secs(self.keep_alive)
            .state_path(self.state_path)
            .cache_capacity(self.cache_capacity)
            .max_crawl_links(self.max_crawl_links)
            .rate_limit_per_minute(self.rate_limit)
            .llm(LlmSettings {
                base_url: self.llm_base_url,
                api_key: self.llm_api_key,
                model: self.llm_model,
            })
            .forum(ForumSettings {
                client_id: self.forum_client_id,
                client_secret: self.forum_client_secret,
            })
            .endpoints(UpstreamEndpoints::default())
            .build()
    }
}

async fn open_state_store(config: &ServiceConfig) -> Result<Arc<dyn StateStore>> {
    Ok(match &config.lifecycle().state_path {
        Some(path) => Arc::new(
            FileStateStore::open(path)
                .await
                .with_context(|| format!("Failed to open state file {}", path.display()))?,
        ),
        None => Arc::new(MemoryStateStore::new()),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webdown=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Cli::parse().into_config()?;

    let resource: Arc<dyn RenderingResource> = Arc::new(BrowserManager::new(
        ChromeLauncher::new(config.browser().clone()),
        config.browser().launch_attempts,
    ));
    let lifecycle = Arc::new(IdleController::new(
        open_state_store(&config).await?,
        Arc::clone(&resource),
        config.lifecycle().tick_secs,
        config.lifecycle().keep_alive_secs,
    ));
    let driver = spawn_alarm_driver(Arc::clone(&lifecycle));

    let state = AppState {
        converter: Arc::new(Converter::from_config(&config, Arc::clone(&resource))),
        lifecycle: Arc::clone(&lifecycle),
        api_secret: config.api_secret().map(str::to_string),
        max_links: config.crawl().max_links,
    };

    let served = serve(state, config.host(), config.port(), shutdown_signal()).await;

    lifecycle.stop().await;
    driver.abort();
    info!("Rendering engine closed, exiting");
    served
}
