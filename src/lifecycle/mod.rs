//! Idle lifecycle of the rendering engine
//!
//! Keeps the engine warm between bursts of requests and closes it after a
//! configurable period without traffic. The idle counter and wake time are
//! persisted through a [`StateStore`] so a restart resumes the countdown.

mod controller;
mod driver;
mod store;

pub use controller::{AlarmOutcome, IDLE_SECONDS_KEY, IdleController, IdleState, RequestGuard};
pub use driver::spawn_alarm_driver;
pub use store::{FileStateStore, MemoryStateStore, StateStore};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("lifecycle.json");

        let at = chrono::Utc::now() + chrono::Duration::seconds(10);
        {
            let store = FileStateStore::open(&path).await.unwrap();
            store.put(IDLE_SECONDS_KEY, 40).await.unwrap();
            store.schedule_wake_at(at).await.unwrap();
        }

        let reopened = FileStateStore::open(&path).await.unwrap();
        assert_eq!(reopened.get(IDLE_SECONDS_KEY).await.unwrap(), Some(40));
        assert_eq!(reopened.scheduled_wake().await.unwrap(), Some(at));

        reopened.cancel_wake().await.unwrap();
        let again = FileStateStore::open(&path).await.unwrap();
        assert_eq!(again.scheduled_wake().await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_state_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lifecycle.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = FileStateStore::open(&path).await.unwrap();
        assert_eq!(store.get(IDLE_SECONDS_KEY).await.unwrap(), None);
        assert_eq!(store.scheduled_wake().await.unwrap(), None);
    }
}
