//! Per-caller rate limiting
//!
//! The orchestrator only sees the [`RateLimiter`] trait. The in-process
//! implementation keeps one token bucket per caller key in a bounded LRU, so
//! memory stays flat no matter how many distinct callers show up.

mod bucket;

use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use bucket::TokenBucket;

/// Maximum number of caller keys tracked simultaneously
const MAX_TRACKED_CALLERS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allow,
    /// Denied; a token becomes available after `retry_after`
    Deny { retry_after: Duration },
}

impl RateLimitDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str) -> RateLimitDecision;
}

/// Token bucket per caller: `per_minute` burst, refilled continuously.
pub struct TokenBucketLimiter {
    per_minute: u32,
    buckets: Mutex<LruCache<String, Arc<TokenBucket>>>,
    base: Instant,
}

impl TokenBucketLimiter {
    /// `per_minute == 0` disables limiting.
    #[must_use]
    pub fn new(per_minute: u32) -> Self {
        Self::with_capacity(per_minute, MAX_TRACKED_CALLERS)
    }

    #[must_use]
    pub fn with_capacity(per_minute: u32, max_callers: usize) -> Self {
        let capacity = NonZeroUsize::new(max_callers).unwrap_or(NonZeroUsize::MIN);
        Self {
            per_minute,
            buckets: Mutex::new(LruCache::new(capacity)),
            base: Instant::now(),
        }
    }

    pub async fn tracked_callers(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn check(&self, key: &str) -> RateLimitDecision {
        if self.per_minute == 0 {
            return RateLimitDecision::Allow;
        }

        let bucket = {
            let mut buckets = self.buckets.lock().await;
            if let Some(bucket) = buckets.get(key) {
                Arc::clone(bucket)
            } else {
                let bucket = Arc::new(TokenBucket::new(
                    self.per_minute,
                    f64::from(self.per_minute) / 60.0,
                    self.base,
                ));
                buckets.put(key.to_string(), Arc::clone(&bucket));
                bucket
            }
        };
        bucket.try_consume()
    }
}

/// Limiter that admits everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLimiter;

#[async_trait]
impl RateLimiter for NoopLimiter {
    async fn check(&self, _key: &str) -> RateLimitDecision {
        RateLimitDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn callers_have_independent_budgets() {
        let limiter = TokenBucketLimiter::new(2);
        assert!(limiter.check("1.1.1.1").await.is_allowed());
        assert!(limiter.check("1.1.1.1").await.is_allowed());
        assert!(!limiter.check("1.1.1.1").await.is_allowed());
        assert!(limiter.check("2.2.2.2").await.is_allowed());
    }

    #[tokio::test]
    async fn zero_disables_limiting() {
        let limiter = TokenBucketLimiter::new(0);
        for _ in 0..100 {
            assert!(limiter.check("k").await.is_allowed());
        }
        assert_eq!(limiter.tracked_callers().await, 0);
    }

    #[tokio::test]
    async fn tracked_callers_are_bounded() {
        let limiter = TokenBucketLimiter::with_capacity(5, 3);
        for i in 0..10 {
            limiter.check(&format!("caller-{i}")).await;
        }
        assert_eq!(limiter.tracked_callers().await, 3);
    }
}
