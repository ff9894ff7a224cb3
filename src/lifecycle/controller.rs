//! Idle lifecycle state machine
//!
//! ```text
//!  Cold ──request──▶ Warm ──alarm (idle < keep-alive)──▶ Cooling ─┐
//!   ▲                 ▲                                    ▲      │ alarm
//!   │                 └────────────request─────────────────┤◀─────┘
//!   └──────────alarm (idle ≥ keep-alive): close engine─────┘
//! ```
//!
//! Every inbound request resets the idle counter. When a request completes the
//! wake timer is armed if it is not already. Each timer firing adds one tick to
//! the counter and re-arms; once the counter reaches the keep-alive threshold
//! the engine is closed and no timer is armed until the next request.

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use super::store::StateStore;
use crate::browser::RenderingResource;

/// Store key of the persisted idle counter (seconds)
pub const IDLE_SECONDS_KEY: &str = "idle_seconds";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    /// No engine handle
    Cold,
    /// Engine present, no idle time accumulated
    Warm,
    /// Engine present, idle time accumulating toward teardown
    Cooling,
}

/// What a timer firing did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmOutcome {
    /// No wake was scheduled; nothing changed
    Ignored,
    /// Counter advanced, timer re-armed
    Rearmed { idle_seconds: u64 },
    /// Threshold reached, engine closed, no timer armed
    TornDown { idle_seconds: u64 },
}

pub struct IdleController {
    store: Arc<dyn StateStore>,
    resource: Arc<dyn RenderingResource>,
    tick_secs: u64,
    keep_alive_secs: u64,
    in_flight: AtomicUsize,
    /// Serializes read-modify-write of the counter and the wake slot
    op_lock: Mutex<()>,
    pub(super) wake: Notify,
}

impl IdleController {
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        resource: Arc<dyn RenderingResource>,
        tick_secs: u64,
        keep_alive_secs: u64,
    ) -> Self {
        Self {
            store,
            resource,
            tick_secs: tick_secs.max(1),
            keep_alive_secs,
            in_flight: AtomicUsize::new(0),
            op_lock: Mutex::new(()),
            wake: Notify::new(),
        }
    }

    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub(super) fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Persisted idle counter. Read failures count as zero.
    pub async fn idle_seconds(&self) -> u64 {
        match self.store.get(IDLE_SECONDS_KEY).await {
            Ok(v) => v.unwrap_or(0),
            Err(e) => {
                warn!("Failed to read idle counter: {e:#}");
                0
            }
        }
    }

    pub async fn state(&self) -> IdleState {
        if !self.resource.is_active().await {
            IdleState::Cold
        } else if self.idle_seconds().await == 0 {
            IdleState::Warm
        } else {
            IdleState::Cooling
        }
    }

    pub async fn is_armed(&self) -> bool {
        matches!(self.store.scheduled_wake().await, Ok(Some(_)))
    }

    /// An inbound request arrived. The counter resets now; the returned guard
    /// marks the request finished, whether through [`RequestGuard::finish`] or
    /// by being dropped with a cancelled handler.
    pub async fn request_started(self: &Arc<Self>) -> RequestGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = RequestGuard {
            controller: Some(Arc::clone(self)),
        };
        let _op = self.op_lock.lock().await;
        self.reset_counter().await;
        guard
    }

    fn leave(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Reset the counter and arm the timer if none is armed.
    async fn settle(&self) {
        let _op = self.op_lock.lock().await;
        self.reset_counter().await;
        if !self.is_armed().await {
            self.arm().await;
        }
    }

    /// Timer firing.
    pub async fn alarm(&self) -> AlarmOutcome {
        let _op = self.op_lock.lock().await;

        match self.store.scheduled_wake().await {
            Ok(Some(_)) => {}
            Ok(None) => return AlarmOutcome::Ignored,
            Err(e) => {
                warn!("Failed to read wake schedule: {e:#}");
                return AlarmOutcome::Ignored;
            }
        }
        // The wake that fired is consumed; re-arming below schedules a new one.
        if let Err(e) = self.store.cancel_wake().await {
            warn!("Failed to clear fired wake: {e:#}");
        }

        if self.in_flight.load(Ordering::SeqCst) > 0 {
            debug!("Alarm fired with requests in flight; re-arming without counting");
            self.arm().await;
            return AlarmOutcome::Rearmed {
                idle_seconds: self.idle_seconds().await,
            };
        }

        let idle_seconds = self.idle_seconds().await + self.tick_secs;
        if let Err(e) = self.store.put(IDLE_SECONDS_KEY, idle_seconds).await {
            warn!("Failed to persist idle counter: {e:#}");
        }

        if idle_seconds >= self.keep_alive_secs {
            info!(idle_seconds, "Idle threshold reached, closing rendering engine");
            self.resource.shutdown().await;
            AlarmOutcome::TornDown { idle_seconds }
        } else {
            debug!(idle_seconds, "Engine idle, re-arming timer");
            self.arm().await;
            AlarmOutcome::Rearmed { idle_seconds }
        }
    }

    /// Cancel the timer and close the engine (server shutdown).
    pub async fn stop(&self) {
        let _op = self.op_lock.lock().await;
        if let Err(e) = self.store.cancel_wake().await {
            warn!("Failed to cancel wake on shutdown: {e:#}");
        }
        self.resource.shutdown().await;
        self.wake.notify_one();
    }

    async fn reset_counter(&self) {
        if let Err(e) = self.store.put(IDLE_SECONDS_KEY, 0).await {
            warn!("Failed to reset idle counter: {e:#}");
        }
    }

    async fn arm(&self) {
        let tick = chrono::Duration::seconds(i64::try_from(self.tick_secs).unwrap_or(i64::MAX));
        let at = Utc::now() + tick;
        match self.store.schedule_wake_at(at).await {
            Ok(()) => self.wake.notify_one(),
            Err(e) => warn!("Failed to schedule wake: {e:#}"),
        }
    }
}

/// One in-flight request.
///
/// Dropping the guard without [`finish`](Self::finish) (a client that hung up
/// mid-conversion) still leaves the in-flight count and spawns the reset and
/// re-arm, so an abandoned request never pins the engine warm.
#[must_use = "dropping the guard ends the request immediately"]
pub struct RequestGuard {
    controller: Option<Arc<IdleController>>,
}

impl RequestGuard {
    /// The request finished (successfully or not).
    pub async fn finish(mut self) {
        if let Some(controller) = self.controller.take() {
            controller.leave();
            controller.settle().await;
        }
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let Some(controller) = self.controller.take() else {
            return;
        };
        controller.leave();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Request abandoned before completion");
                handle.spawn(async move { controller.settle().await });
            }
            Err(_) => warn!("RequestGuard dropped outside a runtime; idle timer not armed"),
        }
    }
}
