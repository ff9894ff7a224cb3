//! Rendering engine lifecycle manager
//!
//! Owns the single engine handle. The handle is launched on first need,
//! health-checked with a version probe before each use, and replaced
//! wholesale when the probe fails. Launch failures trigger a best-effort
//! sweep of orphaned sessions before the next attempt.
//!
//! # Lifecycle
//! - Handle NOT launched on manager creation (lazy initialization)
//! - `ensure()` probes the existing handle, launching a new one if needed
//! - `shutdown()` closes the handle (idle teardown or server shutdown)
//!
//! # Thread Safety
//! The slot is an `Arc<Mutex<Option<Arc<Handle>>>>`. Holding the lock across
//! a launch makes concurrent `ensure()` calls single-flight: the second caller
//! waits and then finds the fresh handle.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{EngineHandle, Launcher, PageGuard, RenderingResource};

/// Outcome of an orphaned-session sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupResult {
    /// Every listed session was closed (or there were none)
    Success { closed: usize },
    /// Some sessions could not be listed or closed, with error details
    PartialFailure { closed: usize, errors: Vec<String> },
}

pub struct ResourceManager<L: Launcher> {
    launcher: L,
    handle: Arc<Mutex<Option<Arc<L::Handle>>>>,
    attempts: u32,
}

impl<L: Launcher> ResourceManager<L> {
    #[must_use]
    pub fn new(launcher: L, attempts: u32) -> Self {
        Self {
            launcher,
            handle: Arc::new(Mutex::new(None)),
            attempts: attempts.max(1),
        }
    }

    /// Close every session the launcher reports, except `keep`.
    ///
    /// Individual failures are collected and logged; the loop always runs to
    /// the end.
    pub async fn cleanup_orphaned_sessions(&self, keep: Option<&str>) -> CleanupResult {
        let sessions = match self.launcher.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(target: "webdown::browser", "Failed to list sessions: {e:#}");
                return CleanupResult::PartialFailure {
                    closed: 0,
                    errors: vec![format!("list sessions failed: {e:#}")],
                };
            }
        };

        let mut closed = 0;
        let mut errors = Vec::new();
        for session in sessions.iter().filter(|s| Some(s.as_str()) != keep) {
            match self.launcher.close_session(session).await {
                Ok(()) => {
                    debug!(target: "webdown::browser", "Closed orphaned session {session}");
                    closed += 1;
                }
                Err(e) => {
                    warn!(target: "webdown::browser", "Failed to close session {session}: {e:#}");
                    errors.push(format!("{session}: {e:#}"));
                }
            }
        }

        if errors.is_empty() {
            CleanupResult::Success { closed }
        } else {
            CleanupResult::PartialFailure { closed, errors }
        }
    }

    async fn current(&self) -> Option<Arc<L::Handle>> {
        self.handle.lock().await.clone()
    }
}

/// Close a handle that is being discarded. Failures are logged only.
async fn discard<H: EngineHandle>(handle: Arc<H>, reason: &str) {
    if let Err(e) = handle.close().await {
        warn!(target: "webdown::browser", "Failed to close {reason} browser: {e:#}");
    }
}

#[async_trait]
impl<L: Launcher> RenderingResource for ResourceManager<L> {
    async fn ensure(&self) -> bool {
        let mut guard = self.handle.lock().await;

        for attempt in 1..=self.attempts {
            if let Some(handle) = guard.as_ref() {
                match handle.probe().await {
                    Ok(()) => {
                        debug!(target: "webdown::browser", "Browser health check passed, reusing existing browser");
                        return true;
                    }
                    Err(e) => {
                        warn!(target: "webdown::browser", "Browser health check failed (attempt {attempt}): {e:#}. Triggering recovery...");
                        if let Some(dead) = guard.take() {
                            discard(dead, "unhealthy").await;
                        }
                    }
                }
            }

            info!(target: "webdown::browser", "Launching browser (attempt {attempt}/{})", self.attempts);
            match self.launcher.launch().await {
                Ok(handle) => {
                    *guard = Some(Arc::new(handle));
                    return true;
                }
                Err(e) => {
                    warn!(target: "webdown::browser", "Browser launch failed (attempt {attempt}): {e:#}");
                    if let CleanupResult::PartialFailure { closed, errors } =
                        self.cleanup_orphaned_sessions(None).await
                    {
                        warn!(
                            target: "webdown::browser",
                            "Session cleanup closed {closed}, {} failures",
                            errors.len()
                        );
                    }
                }
            }
        }

        warn!(target: "webdown::browser", "Browser unavailable after {} attempts", self.attempts);
        false
    }

    async fn probe(&self) -> bool {
        match self.current().await {
            Some(handle) => handle.probe().await.is_ok(),
            None => false,
        }
    }

    async fn acquire_page(&self) -> Result<PageGuard> {
        let handle = self
            .current()
            .await
            .ok_or_else(|| anyhow::anyhow!("Rendering engine is not running"))?;
        let page = handle.new_page().await?;
        Ok(PageGuard::new(page, "extraction"))
    }

    async fn is_active(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    async fn shutdown(&self) {
        let taken = self.handle.lock().await.take();
        if let Some(handle) = taken {
            info!(target: "webdown::browser", "Shutting down browser");
            discard(handle, "idle").await;
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }
}
