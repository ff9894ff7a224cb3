//! Background task that fires the persisted wake timer.

use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::controller::{AlarmOutcome, IdleController};

/// Spawn the alarm loop.
///
/// The loop sleeps until the scheduled wake time (re-reading the schedule
/// whenever the controller re-arms it) and calls [`IdleController::alarm`].
/// A wake that was persisted before a restart is picked up on the first pass.
pub fn spawn_alarm_driver(controller: Arc<IdleController>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let notified = controller.wake.notified();
            tokio::pin!(notified);

            let wake_at = match controller.store().scheduled_wake().await {
                Ok(at) => at,
                Err(e) => {
                    warn!("Alarm driver failed to read schedule: {e:#}");
                    tokio::time::sleep(controller.tick()).await;
                    continue;
                }
            };

            let Some(at) = wake_at else {
                notified.await;
                continue;
            };

            let delay = (at - Utc::now()).to_std().unwrap_or_default();
            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    match controller.alarm().await {
                        AlarmOutcome::TornDown { idle_seconds } => {
                            debug!(idle_seconds, "Alarm driver observed teardown");
                        }
                        AlarmOutcome::Rearmed { .. } | AlarmOutcome::Ignored => {}
                    }
                }
                () = &mut notified => {}
            }
        }
    })
}
