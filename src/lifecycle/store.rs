//! Persisted lifecycle state
//!
//! The idle counter and the scheduled wake time must survive the process
//! being restarted between requests. `FileStateStore` writes both to a small
//! JSON file after every change; `MemoryStateStore` keeps them in process for
//! tests and for deployments that do not need persistence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Key/value + alarm storage for the idle lifecycle.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<u64>>;

    async fn put(&self, key: &str, value: u64) -> Result<()>;

    /// Currently scheduled wake time, if any.
    async fn scheduled_wake(&self) -> Result<Option<DateTime<Utc>>>;

    /// Schedule (or move) the single wake timer.
    async fn schedule_wake_at(&self, at: DateTime<Utc>) -> Result<()>;

    async fn cancel_wake(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct PersistedState {
    #[serde(default)]
    values: BTreeMap<String, u64>,
    #[serde(default)]
    wake_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<PersistedState>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.state.lock().await.values.get(key).copied())
    }

    async fn put(&self, key: &str, value: u64) -> Result<()> {
        self.state.lock().await.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn scheduled_wake(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state.lock().await.wake_at)
    }

    async fn schedule_wake_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.state.lock().await.wake_at = Some(at);
        Ok(())
    }

    async fn cancel_wake(&self) -> Result<()> {
        self.state.lock().await.wake_at = None;
        Ok(())
    }
}

/// JSON file-backed store. Writes go to a sibling temp file and are renamed
/// into place so a crash never leaves a half-written state file.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl FileStateStore {
    /// Open (or create) the state file at `path`.
    ///
    /// A missing file starts from empty state. A corrupt file is logged and
    /// replaced on the next write rather than failing startup.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create state directory {}", parent.display()))?;
        }

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<PersistedState>(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Ignoring unreadable lifecycle state: {e}");
                    PersistedState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PersistedState::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read state file {}", path.display()));
            }
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &PersistedState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state).context("Failed to serialize state")?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to move state into {}", self.path.display()))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.state.lock().await.values.get(key).copied())
    }

    async fn put(&self, key: &str, value: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.values.insert(key.to_string(), value);
        self.persist(&state).await
    }

    async fn scheduled_wake(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state.lock().await.wake_at)
    }

    async fn schedule_wake_at(&self, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.wake_at = Some(at);
        self.persist(&state).await
    }

    async fn cancel_wake(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.wake_at.take().is_some() {
            self.persist(&state).await?;
        }
        Ok(())
    }
}
