//! Cache-aside layer over a TTL key-value store
//!
//! Values are raw extracted bodies, before metadata annotation. Errors are
//! never written back, so a transient failure is retried on the next request.
//! Store failures are logged and treated as misses.

mod store;

pub use store::{KvStore, MemoryKvStore};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::utils::constants::ERROR_SENTINEL;

/// Suffix appended to keys whose value went through the content filter
pub const FILTERED_KEY_SUFFIX: &str = ":filtered";

/// `{strategy}:{identifier}` plus the filter-mode suffix when applicable.
#[must_use]
pub fn cache_key(strategy: &str, identifier: &str, filtered: bool) -> String {
    if filtered {
        format!("{strategy}:{identifier}{FILTERED_KEY_SUFFIX}")
    } else {
        format!("{strategy}:{identifier}")
    }
}

/// Whether a body is an error marker rather than content
#[must_use]
pub fn is_error_body(body: &str) -> bool {
    body.starts_with(ERROR_SENTINEL)
}

#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn KvStore>,
}

impl CacheAside {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Read-through fetch.
    ///
    /// With `bypass` the existing entry is deleted before `fetch` runs, so a
    /// concurrent reader cannot see the old value re-inserted afterwards.
    /// Only `Ok` bodies that do not carry the error sentinel are written back.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        bypass: bool,
        fetch: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Into<String>,
    {
        if bypass {
            self.delete(key).await;
        } else if let Some(hit) = self.get(key).await {
            debug!(key, "Cache hit");
            return Ok(hit);
        }

        let value: String = fetch().await?.into();
        if !is_error_body(&value) {
            self.put(key, &value, ttl).await;
        }
        Ok(value)
    }

    /// Lookup that treats store failures as misses.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, "Cache read failed: {e}");
                None
            }
        }
    }

    pub async fn put(&self, key: &str, value: &str, ttl: Duration) {
        if let Err(e) = self.store.put_with_ttl(key, value.to_string(), ttl).await {
            warn!(key, "Cache write failed: {e}");
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, "Cache delete failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filtered_keys_do_not_collide() {
        assert_eq!(
            cache_key("generic", "https://example.com/", false),
            "generic:https://example.com/"
        );
        assert_eq!(
            cache_key("generic", "https://example.com/", true),
            "generic:https://example.com/:filtered"
        );
    }

    #[tokio::test]
    async fn error_bodies_are_not_cached() {
        let cache = CacheAside::new(Arc::new(MemoryKvStore::new(8)));
        let ttl = Duration::from_secs(60);

        let body: Result<String, ()> = cache
            .get_or_fetch("k", ttl, false, || async {
                Ok::<_, ()>("Error: navigation failed".to_string())
            })
            .await;
        assert!(body.unwrap().starts_with("Error: "));
        assert!(cache.get("k").await.is_none());
    }
}
