//! Key-value store collaborator with per-entry TTL

use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::CacheError;

/// get / put-with-ttl / delete over string values
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn put_with_ttl(&self, key: &str, value: String, ttl: Duration)
    -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process store: bounded LRU with lazy expiry on read.
#[derive(Debug)]
pub struct MemoryKvStore {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of entries held, expired ones included until they are read.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn put_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl {
                key: key.to_string(),
            });
        }
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::InvalidTtl {
                key: key.to_string(),
            })?;
        self.entries
            .lock()
            .await
            .put(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.pop(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let store = MemoryKvStore::new(4);
        store
            .put_with_ttl("k", "v".into(), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let store = MemoryKvStore::new(2);
        let ttl = Duration::from_secs(60);
        store.put_with_ttl("a", "1".into(), ttl).await.unwrap();
        store.put_with_ttl("b", "2".into(), ttl).await.unwrap();
        store.get("a").await.unwrap();
        store.put_with_ttl("c", "3".into(), ttl).await.unwrap();

        assert!(store.get("b").await.unwrap().is_none());
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("c").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let store = MemoryKvStore::new(2);
        let err = store.put_with_ttl("k", "v".into(), Duration::ZERO).await;
        assert!(matches!(err, Err(CacheError::InvalidTtl { .. })));
    }
}
