//! Task status snapshots and their publication.
//!
//! Every lifecycle change and progress update of a task is written to a
//! [`StatusStore`] (the source of truth for status queries) and broadcast on
//! the [`EventBus`]. Store writes are retried with backoff; the bus never
//! fails.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tenvault_core::retry::{retry_with_backoff, RetryError, RetryPolicy};
use tenvault_core::task::{TaskKey, TaskKind, TaskStatus};
use tenvault_core::types::Timestamp;
use tenvault_events::{EventBus, TaskEvent};
use tenvault_pipeline::progress::ProgressError;
use tenvault_pipeline::{ProgressSink, ProgressUpdate};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::TaskError;

// ---------------------------------------------------------------------------
// TaskSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of one task, as returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub id: Uuid,
    #[serde(flatten)]
    pub key: TaskKey,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub percent: u8,
    /// Human-readable failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cancelled: bool,
    /// Storage path or URL of the produced artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_artifact: Option<String>,
    pub warnings: Vec<String>,
    pub queued_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
}

impl TaskSnapshot {
    pub fn queued(id: Uuid, key: TaskKey, kind: TaskKind) -> Self {
        Self {
            id,
            key,
            kind,
            status: TaskStatus::Queued,
            percent: 0,
            error: None,
            cancelled: false,
            result_artifact: None,
            warnings: Vec::new(),
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Move to `to`, stamping the start or finish time.
    pub fn transition(&mut self, to: TaskStatus) -> Result<(), String> {
        self.status.validate_transition(to)?;
        self.status = to;
        match to {
            TaskStatus::Started => self.started_at = Some(Utc::now()),
            TaskStatus::Done => {
                self.percent = 100;
                self.finished_at = Some(Utc::now());
            }
            TaskStatus::Failed => self.finished_at = Some(Utc::now()),
            TaskStatus::Queued => {}
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn event(&self) -> TaskEvent {
        let event = TaskEvent::new(self.id, self.key.clone(), self.kind, self.status)
            .with_percent(self.percent);
        match &self.error {
            Some(reason) => event.with_message(reason.clone()),
            None => event,
        }
    }
}

// ---------------------------------------------------------------------------
// StatusStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
#[error("Status store error: {0}")]
pub struct StatusError(pub String);

/// Where task snapshots are kept between status queries.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Replace the snapshot stored for `snapshot.key`.
    async fn put(&self, snapshot: TaskSnapshot) -> Result<(), StatusError>;

    /// Latest snapshot of the most recent task for `key`.
    async fn get(&self, key: &TaskKey) -> Result<Option<TaskSnapshot>, StatusError>;
}

/// In-process status store.
///
/// Keeps one snapshot per key: a new task for a key replaces the finished
/// one, so terminal entries are collected lazily.
#[derive(Default)]
pub struct MemoryStatusStore {
    entries: RwLock<HashMap<TaskKey, TaskSnapshot>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn put(&self, snapshot: TaskSnapshot) -> Result<(), StatusError> {
        let mut entries = self.entries.write().await;
        // A late write from a superseded task must not hide the newer one.
        if let Some(current) = entries.get(&snapshot.key) {
            if current.id != snapshot.id && snapshot.queued_at < current.queued_at {
                return Ok(());
            }
        }
        entries.insert(snapshot.key.clone(), snapshot);
        Ok(())
    }

    async fn get(&self, key: &TaskKey) -> Result<Option<TaskSnapshot>, StatusError> {
        Ok(self.entries.read().await.get(key).cloned())
    }
}

// ---------------------------------------------------------------------------
// StatusPublisher
// ---------------------------------------------------------------------------

/// Writes snapshots to the status store with bounded retries and mirrors
/// them on the event bus.
#[derive(Clone)]
pub struct StatusPublisher {
    store: Arc<dyn StatusStore>,
    bus: Arc<EventBus>,
    policy: RetryPolicy,
}

impl StatusPublisher {
    pub fn new(store: Arc<dyn StatusStore>, bus: Arc<EventBus>, policy: RetryPolicy) -> Self {
        Self { store, bus, policy }
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    /// Persist `snapshot`, giving up after the policy's attempts.
    ///
    /// Waits between attempts observe `cancel`; pass a fresh token for
    /// updates that must land even when the task is being cancelled.
    pub async fn publish(
        &self,
        snapshot: &TaskSnapshot,
        cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        let result = retry_with_backoff(
            &self.policy,
            cancel,
            "publish_task_status",
            |_: &StatusError| true,
            |_| self.store.put(snapshot.clone()),
        )
        .await;

        match result {
            Ok(()) => {
                self.bus.publish(snapshot.event());
                Ok(())
            }
            Err(RetryError::Cancelled) => Err(TaskError::Cancelled),
            Err(e) => Err(TaskError::Status(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskProgress
// ---------------------------------------------------------------------------

/// Progress handle given to a running job.
///
/// Owns the task's live snapshot; each update bumps the percent and
/// republishes it.
pub struct TaskProgress {
    snapshot: Mutex<TaskSnapshot>,
    publisher: StatusPublisher,
    cancel: CancellationToken,
}

impl TaskProgress {
    pub fn new(snapshot: TaskSnapshot, publisher: StatusPublisher, cancel: CancellationToken) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            publisher,
            cancel,
        }
    }

    /// Publish a new completion percentage. Lower values than the current
    /// one are ignored.
    pub async fn set_percent(&self, percent: u8) -> Result<(), TaskError> {
        let mut snapshot = self.snapshot.lock().await;
        let percent = percent.min(100);
        if percent <= snapshot.percent {
            return Ok(());
        }
        snapshot.percent = percent;
        self.publisher.publish(&snapshot, &self.cancel).await
    }

    pub async fn snapshot(&self) -> TaskSnapshot {
        self.snapshot.lock().await.clone()
    }

    /// Apply `f` to the live snapshot and publish the result.
    pub(crate) async fn update(
        &self,
        cancel: &CancellationToken,
        f: impl FnOnce(&mut TaskSnapshot) -> Result<(), String>,
    ) -> Result<TaskSnapshot, TaskError> {
        let mut snapshot = self.snapshot.lock().await;
        f(&mut snapshot).map_err(TaskError::Invalid)?;
        self.publisher.publish(&snapshot, cancel).await?;
        Ok(snapshot.clone())
    }
}

#[async_trait]
impl ProgressSink for TaskProgress {
    async fn report(&self, update: ProgressUpdate) -> Result<(), ProgressError> {
        tracing::debug!(
            table = %update.table,
            completed = update.completed,
            total = update.total,
            "Task progress"
        );
        self.set_percent(update.percent())
            .await
            .map_err(|e| ProgressError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;

    fn key() -> TaskKey {
        TaskKey::new("backup", 1, Uuid::nil())
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
            max_attempts: attempts,
        }
    }

    /// Fails the first `failures` writes.
    struct FlakyStore {
        failures: u32,
        calls: AtomicU32,
        inner: MemoryStatusStore,
    }

    #[async_trait]
    impl StatusStore for FlakyStore {
        async fn put(&self, snapshot: TaskSnapshot) -> Result<(), StatusError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(StatusError("unavailable".into()));
            }
            self.inner.put(snapshot).await
        }

        async fn get(&self, key: &TaskKey) -> Result<Option<TaskSnapshot>, StatusError> {
            self.inner.get(key).await
        }
    }

    fn flaky(failures: u32) -> Arc<FlakyStore> {
        Arc::new(FlakyStore {
            failures,
            calls: AtomicU32::new(0),
            inner: MemoryStatusStore::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Test: snapshot transitions follow the task state machine
    // -----------------------------------------------------------------------

    #[test]
    fn snapshot_follows_state_machine() {
        let mut s = TaskSnapshot::queued(Uuid::new_v4(), key(), TaskKind::Backup);
        assert!(s.transition(TaskStatus::Done).is_err());
        s.transition(TaskStatus::Started).unwrap();
        assert!(s.started_at.is_some());
        s.transition(TaskStatus::Done).unwrap();
        assert_eq!(s.percent, 100);
        assert!(s.finished_at.is_some());
        assert!(s.transition(TaskStatus::Failed).is_err());
    }

    #[test]
    fn snapshot_serializes_key_fields_flat() {
        let s = TaskSnapshot::queued(Uuid::nil(), key(), TaskKind::Backup);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["origin"], "backup");
        assert_eq!(json["tenant"], 1);
        assert_eq!(json["status"], "Queued");
        assert!(json.get("error").is_none());
    }

    // -----------------------------------------------------------------------
    // Test: publication retries then succeeds or gives up
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn transient_store_failures_are_retried() {
        let store = flaky(2);
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let publisher = StatusPublisher::new(store.clone(), bus, fast_policy(3));

        let s = TaskSnapshot::queued(Uuid::new_v4(), key(), TaskKind::Backup);
        publisher.publish(&s, &CancellationToken::new()).await.unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.get(&key()).await.unwrap(), Some(s.clone()));
        assert_eq!(rx.recv().await.unwrap().task_id, s.id);
    }

    #[tokio::test]
    async fn publication_fails_after_all_attempts() {
        let store = flaky(10);
        let publisher =
            StatusPublisher::new(store.clone(), Arc::new(EventBus::default()), fast_policy(3));

        let s = TaskSnapshot::queued(Uuid::new_v4(), key(), TaskKind::Backup);
        let err = publisher.publish(&s, &CancellationToken::new()).await.unwrap_err();

        assert_matches!(err, TaskError::Status(_));
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    // -----------------------------------------------------------------------
    // Test: progress only moves forward
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn progress_is_monotonic() {
        let store = Arc::new(MemoryStatusStore::new());
        let publisher =
            StatusPublisher::new(store.clone(), Arc::new(EventBus::default()), fast_policy(1));
        let s = TaskSnapshot::queued(Uuid::new_v4(), key(), TaskKind::Backup);
        let progress = TaskProgress::new(s, publisher, CancellationToken::new());

        progress.set_percent(40).await.unwrap();
        progress.set_percent(20).await.unwrap();

        assert_eq!(progress.snapshot().await.percent, 40);
        assert_eq!(store.get(&key()).await.unwrap().unwrap().percent, 40);
    }

    #[tokio::test]
    async fn stale_task_does_not_overwrite_newer_one() {
        let store = MemoryStatusStore::new();
        let old = TaskSnapshot::queued(Uuid::new_v4(), key(), TaskKind::Backup);
        tokio::time::sleep(Duration::from_millis(2)).await;
        let new = TaskSnapshot::queued(Uuid::new_v4(), key(), TaskKind::Backup);

        store.put(new.clone()).await.unwrap();
        store.put(old).await.unwrap();

        assert_eq!(store.get(&key()).await.unwrap().unwrap().id, new.id);
    }
}
