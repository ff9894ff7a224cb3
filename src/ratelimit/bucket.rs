//! Lock-free token bucket with fixed-point arithmetic

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::RateLimitDecision;

/// Scaling factor for fixed-point token arithmetic (1000x precision)
const TOKEN_SCALE: u64 = 1000;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// One caller's bucket.
#[derive(Debug)]
pub(super) struct TokenBucket {
    /// Available tokens scaled by `TOKEN_SCALE`
    tokens: AtomicU64,
    /// Last refill as nanoseconds since `base`
    last_refill_nanos: AtomicU64,
    /// Nanoseconds to produce one whole token; zero never refills
    nanos_per_token: u64,
    /// Bucket size scaled by `TOKEN_SCALE`
    max_tokens: u64,
    base: Instant,
}

impl TokenBucket {
    /// A full bucket holding `capacity` tokens that refills at `per_second`.
    /// Sub-one rates such as 30 per minute refill at their exact period.
    pub(super) fn new(capacity: u32, per_second: f64, base: Instant) -> Self {
        let max_tokens = u64::from(capacity.max(1)) * TOKEN_SCALE;
        let nanos_per_token = if per_second > 0.0 && per_second.is_finite() {
            (NANOS_PER_SECOND / per_second).round().max(1.0) as u64
        } else {
            0
        };

        Self {
            tokens: AtomicU64::new(max_tokens),
            last_refill_nanos: AtomicU64::new(base.elapsed().as_nanos() as u64),
            nanos_per_token,
            max_tokens,
            base,
        }
    }

    pub(super) fn try_consume(&self) -> RateLimitDecision {
        self.try_consume_at(self.base.elapsed().as_nanos() as u64)
    }

    /// `try_consume` at `now_nanos` past `base`.
    fn try_consume_at(&self, now_nanos: u64) -> RateLimitDecision {
        self.refill(now_nanos);

        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current < TOKEN_SCALE {
                let needed = TOKEN_SCALE - current;
                let nanos_needed = if self.nanos_per_token > 0 {
                    scaled_to_nanos(needed, self.nanos_per_token)
                } else {
                    1_000_000_000
                };
                return RateLimitDecision::Deny {
                    retry_after: Duration::from_nanos(nanos_needed.max(1)),
                };
            }

            if self
                .tokens
                .compare_exchange_weak(
                    current,
                    current - TOKEN_SCALE,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return RateLimitDecision::Allow;
            }
        }
    }

    /// Only advance `last_refill_nanos` by the time that actually produced
    /// tokens, so callers arriving in quick succession keep accumulating the
    /// fractional remainder instead of resetting it.
    fn refill(&self, now_nanos: u64) {
        if self.nanos_per_token == 0 {
            return;
        }
        loop {
            let last = self.last_refill_nanos.load(Ordering::Relaxed);
            if now_nanos <= last {
                return;
            }

            let elapsed = now_nanos - last;
            let to_add = nanos_to_scaled(elapsed, self.nanos_per_token);
            if to_add == 0 {
                return;
            }
            let credited = scaled_to_nanos(to_add, self.nanos_per_token).min(elapsed);

            if self
                .last_refill_nanos
                .compare_exchange_weak(
                    last,
                    last.saturating_add(credited),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_err()
            {
                continue;
            }

            let _ = self
                .tokens
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                    Some(current.saturating_add(to_add).min(self.max_tokens))
                });
            return;
        }
    }
}

/// Scaled tokens produced by `nanos` of refill.
fn nanos_to_scaled(nanos: u64, nanos_per_token: u64) -> u64 {
    let scaled = u128::from(nanos) * u128::from(TOKEN_SCALE) / u128::from(nanos_per_token);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Nanoseconds needed to produce `scaled` tokens, rounded up.
fn scaled_to_nanos(scaled: u64, nanos_per_token: u64) -> u64 {
    let nanos = (u128::from(scaled) * u128::from(nanos_per_token)).div_ceil(u128::from(TOKEN_SCALE));
    u64::try_from(nanos).unwrap_or(u64::MAX)
}
