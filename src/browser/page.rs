//! Scoped page acquisition
//!
//! A `PageGuard` owns one browsing context for the duration of a single
//! extraction. Callers release it explicitly with [`PageGuard::release`];
//! if the guard is dropped without that (early return through `?`, panic,
//! cancelled future) `Drop` spawns the close so no context leaks.

use std::ops::Deref;
use tracing::{debug, warn};

use super::PageSession;

pub struct PageGuard {
    page: Option<Box<dyn PageSession>>,
    label: String,
}

impl PageGuard {
    pub fn new(page: Box<dyn PageSession>, label: impl Into<String>) -> Self {
        Self {
            page: Some(page),
            label: label.into(),
        }
    }

    /// Close the page now. Close failures are logged, never returned.
    pub async fn release(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!(label = %self.label, "Failed to close page: {e:#}");
            } else {
                debug!(label = %self.label, "Page closed");
            }
        }
    }
}

impl Deref for PageGuard {
    type Target = dyn PageSession;

    fn deref(&self) -> &Self::Target {
        // `page` is only taken by `release(self)` and `drop`, both of which
        // consume the guard.
        match self.page.as_deref() {
            Some(page) => page,
            None => unreachable!("PageGuard used after release"),
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        let label = std::mem::take(&mut self.label);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        warn!(label = %label, "Failed to close page in drop: {e:#}");
                    }
                });
            }
            Err(_) => {
                warn!(label = %label, "PageGuard dropped outside a runtime; page not closed");
            }
        }
    }
}
