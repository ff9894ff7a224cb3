//! Shared rendering engine ownership
//!
//! The service owns at most one live rendering engine. `ResourceManager`
//! launches it lazily, health-checks it before use, retries failed launches
//! after cleaning up orphaned sessions, and hands out pages scoped to one
//! extraction call.
//!
//! The engine is reached only through the traits below so that the manager's
//! retry logic and every strategy can be exercised with fakes:
//! - [`Launcher`] creates handles and enumerates / closes leftover sessions
//! - [`EngineHandle`] is one live engine (probe, new page, close)
//! - [`PageSession`] is one browsing context
//! - [`RenderingResource`] is what the rest of the crate depends on

mod chrome;
mod manager;
mod page;
mod setup;

pub use chrome::{ChromeHandle, ChromeLauncher, ChromePage};
pub use manager::{CleanupResult, ResourceManager};
pub use page::PageGuard;
pub use setup::{ExecutableSource, LookupError, locate_installed, resolve_executable};

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// The production resource: chromiumoxide behind the retrying manager.
pub type BrowserManager = ResourceManager<ChromeLauncher>;

/// One logical browsing context.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate and wait for the load to settle, bounded by `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String>;

    /// Evaluate a script in the page and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Close the browsing context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A live rendering engine instance.
#[async_trait]
pub trait EngineHandle: Send + Sync + 'static {
    /// Cheap round-trip against the engine (version query).
    async fn probe(&self) -> Result<()>;

    async fn new_page(&self) -> Result<Box<dyn PageSession>>;

    /// Shut the engine down. Safe to call on an already-dead engine.
    async fn close(&self) -> Result<()>;
}

/// Produces engine handles and cleans up sessions left behind by earlier ones.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    type Handle: EngineHandle;

    async fn launch(&self) -> Result<Self::Handle>;

    /// Identifiers of sessions that exist on the engine side.
    async fn list_sessions(&self) -> Result<Vec<String>>;

    async fn close_session(&self, session_id: &str) -> Result<()>;
}

/// The owned rendering resource injected into the orchestrator.
#[async_trait]
pub trait RenderingResource: Send + Sync {
    /// Guarantee a live handle exists. Returns false once the retry budget
    /// is exhausted.
    async fn ensure(&self) -> bool;

    /// Probe the current handle. Any failure, or no handle, means not alive.
    async fn probe(&self) -> bool;

    /// Open a page on the live handle. Callers release it through
    /// [`PageGuard::release`] on every exit path.
    async fn acquire_page(&self) -> Result<PageGuard>;

    /// Whether a handle is currently held (liveness is not checked).
    async fn is_active(&self) -> bool;

    /// Close and drop the current handle, if any. Close failures are logged.
    async fn shutdown(&self);

    /// Number of attempts `ensure` makes before giving up.
    fn attempts(&self) -> u32;
}
