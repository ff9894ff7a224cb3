//! chromiumoxide-backed engine handles
//!
//! Two launch modes share one handle type:
//! - local: find (or download) Chromium and launch it with a fresh profile
//!   directory under the system temp dir
//! - remote: connect to a DevTools websocket (`BrowserSettings::ws_url`)
//!
//! Orphaned sessions are stale profile directories in local mode and DevTools
//! targets (`/json/list`) in remote mode.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use super::{EngineHandle, Launcher, PageSession};
use crate::config::BrowserSettings;
use crate::utils::constants::{CHROME_USER_AGENT, PROFILE_DIR_PREFIX};

/// Launches local Chromium or connects to a remote DevTools endpoint.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    settings: BrowserSettings,
    http: reqwest::Client,
}

impl ChromeLauncher {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    /// `ws://host:port/devtools/browser/<id>` → `http://host:port`
    fn devtools_http_base(ws_url: &str) -> Result<String> {
        let parsed = url::Url::parse(ws_url).context("Invalid DevTools websocket URL")?;
        let scheme = if parsed.scheme() == "wss" { "https" } else { "http" };
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("DevTools websocket URL has no host"))?;
        Ok(match parsed.port() {
            Some(port) => format!("{scheme}://{host}:{port}"),
            None => format!("{scheme}://{host}"),
        })
    }

    async fn launch_local(&self) -> Result<ChromeHandle> {
        let (chrome_path, source) =
            super::setup::resolve_executable(self.settings.executable.as_deref()).await?;
        debug!(path = %chrome_path.display(), ?source, "Resolved browser executable");

        let user_data_dir = std::env::temp_dir().join(format!(
            "{PROFILE_DIR_PREFIX}{}_{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&user_data_dir).context("Failed to create user data directory")?;

        let mut config_builder = BrowserConfigBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080)
            .user_data_dir(user_data_dir.clone())
            .chrome_executable(chrome_path);

        if self.settings.headless {
            config_builder = config_builder.headless_mode(HeadlessMode::default());
        } else {
            config_builder = config_builder.with_head();
        }

        let browser_config = config_builder
            .arg(format!("--user-agent={CHROME_USER_AGENT}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-notifications")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-background-networking")
            .arg("--disable-breakpad")
            .arg("--disable-features=TranslateUI")
            .arg("--metrics-recording-only")
            .arg("--password-store=basic")
            .arg("--use-mock-keychain")
            .arg("--hide-scrollbars")
            .arg("--mute-audio")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        info!(profile = %user_data_dir.display(), "Launching local browser");
        let (browser, handler) = match Browser::launch(browser_config).await {
            Ok(pair) => pair,
            Err(e) => {
                // The profile directory would otherwise be picked up as an
                // orphan on the next attempt anyway; remove it eagerly.
                let _ = std::fs::remove_dir_all(&user_data_dir);
                return Err(anyhow::Error::new(e).context("Failed to launch browser"));
            }
        };

        Ok(ChromeHandle::new(browser, spawn_handler(handler), Some(user_data_dir)))
    }

    async fn connect_remote(&self, ws_url: &str) -> Result<ChromeHandle> {
        info!(endpoint = %ws_url, "Connecting to remote browser");
        let (browser, handler) = Browser::connect(ws_url.to_string())
            .await
            .with_context(|| format!("Failed to connect to browser at {ws_url}"))?;
        Ok(ChromeHandle::new(browser, spawn_handler(handler), None))
    }
}

/// Drive the CDP event stream on a tracked task that `ChromeHandle` aborts.
fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let msg = e.to_string();
                // Chrome emits CDP events chromiumoxide does not model; these
                // surface as deserialization errors and are harmless.
                if msg.contains("data did not match any variant of untagged enum Message")
                    || msg.contains("Failed to deserialize WS response")
                {
                    trace!("Suppressed benign CDP serialization error: {msg}");
                } else {
                    error!("Browser handler error: {e:?}");
                }
            }
        }
        info!("Browser event handler task completed");
    })
}

#[derive(Debug, Deserialize)]
struct DevtoolsTarget {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[async_trait]
impl Launcher for ChromeLauncher {
    type Handle = ChromeHandle;

    async fn launch(&self) -> Result<ChromeHandle> {
        match &self.settings.ws_url {
            Some(ws_url) => self.connect_remote(ws_url).await,
            None => self.launch_local().await,
        }
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        if let Some(ws_url) = &self.settings.ws_url {
            let base = Self::devtools_http_base(ws_url)?;
            let targets: Vec<DevtoolsTarget> = self
                .http
                .get(format!("{base}/json/list"))
                .send()
                .await
                .context("Failed to list DevTools targets")?
                .error_for_status()?
                .json()
                .await
                .context("Failed to parse DevTools target list")?;
            return Ok(targets
                .into_iter()
                .filter(|t| t.kind == "page")
                .map(|t| t.id)
                .collect());
        }

        let mut sessions = Vec::new();
        let mut entries = tokio::fs::read_dir(std::env::temp_dir())
            .await
            .context("Failed to read temp directory")?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(PROFILE_DIR_PREFIX) {
                sessions.push(entry.path().to_string_lossy().into_owned());
            }
        }
        Ok(sessions)
    }

    async fn close_session(&self, session_id: &str) -> Result<()> {
        if let Some(ws_url) = &self.settings.ws_url {
            let base = Self::devtools_http_base(ws_url)?;
            self.http
                .get(format!("{base}/json/close/{session_id}"))
                .send()
                .await
                .with_context(|| format!("Failed to close DevTools target {session_id}"))?
                .error_for_status()?;
            return Ok(());
        }

        let path = PathBuf::from(session_id);
        let is_ours = path.parent() == Some(std::env::temp_dir().as_path())
            && path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(PROFILE_DIR_PREFIX));
        if !is_ours {
            anyhow::bail!("Refusing to remove non-profile path {}", path.display());
        }
        tokio::fs::remove_dir_all(&path)
            .await
            .with_context(|| format!("Failed to remove stale profile {}", path.display()))
    }
}

/// One live chromiumoxide browser and its event handler task.
pub struct ChromeHandle {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    user_data_dir: std::sync::Mutex<Option<PathBuf>>,
}

impl ChromeHandle {
    fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: Option<PathBuf>) -> Self {
        Self {
            browser: Mutex::new(browser),
            handler,
            user_data_dir: std::sync::Mutex::new(user_data_dir),
        }
    }

    /// Must run after the browser process exited so Chrome has released
    /// every file handle in the profile.
    fn cleanup_temp_dir(&self) {
        let taken = match self.user_data_dir.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(path) = taken {
            debug!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

#[async_trait]
impl EngineHandle for ChromeHandle {
    async fn probe(&self) -> Result<()> {
        let browser = self.browser.lock().await;
        browser
            .version()
            .await
            .map(|_| ())
            .context("Browser version probe failed")
    }

    async fn new_page(&self) -> Result<Box<dyn PageSession>> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create blank page")?;
        Ok(Box::new(ChromePage { page }))
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let close_result = browser.close().await;
        if let Err(e) = browser.wait().await {
            warn!("Failed to wait for browser exit: {e}");
        }
        drop(browser);
        self.cleanup_temp_dir();
        close_result
            .map(|_| ())
            .context("Failed to close browser cleanly")
    }
}

impl Drop for ChromeHandle {
    fn drop(&mut self) {
        debug!("Dropping ChromeHandle - aborting handler task");
        self.handler.abort();
        self.cleanup_temp_dir();
    }
}

/// chromiumoxide page behind the `PageSession` trait.
pub struct ChromePage {
    page: Page,
}

#[async_trait]
impl PageSession for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let load = async {
            self.page
                .goto(url)
                .await
                .with_context(|| format!("Failed to navigate to {url}"))?;
            self.page
                .wait_for_navigation()
                .await
                .context("Failed waiting for navigation")?;
            Ok::<_, anyhow::Error>(())
        };
        match tokio::time::timeout(timeout, load).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "Navigation timeout after {} seconds for {url}",
                timeout.as_secs()
            )),
        }
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .context("Failed to get page content")
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("Failed to evaluate script")?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await.context("Failed to close page")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devtools_base_from_ws_url() {
        assert_eq!(
            ChromeLauncher::devtools_http_base("ws://127.0.0.1:9222/devtools/browser/abc").unwrap(),
            "http://127.0.0.1:9222"
        );
        assert_eq!(
            ChromeLauncher::devtools_http_base("wss://chrome.example.com/devtools/browser/x")
                .unwrap(),
            "https://chrome.example.com"
        );
    }
}
