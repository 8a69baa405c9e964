//! In-process task event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Shared as `Arc<EventBus>` between the scheduler publishing lifecycle and
//! progress events and whoever listens (the log writer, tests).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenvault_core::task::{TaskKey, TaskKind, TaskStatus};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TaskEvent
// ---------------------------------------------------------------------------

/// Lifecycle or progress change of one background task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub task_id: Uuid,
    pub key: TaskKey,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Completion in percent, `0..=100`.
    pub percent: u8,
    /// Failure reason or progress detail.
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    pub fn new(task_id: Uuid, key: TaskKey, kind: TaskKind, status: TaskStatus) -> Self {
        Self {
            task_id,
            key,
            kind,
            status,
            percent: 0,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent = percent.min(100);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus for [`TaskEvent`]s.
///
/// ```rust
/// use tenvault_core::task::{TaskKey, TaskKind, TaskStatus};
/// use tenvault_events::bus::{EventBus, TaskEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
/// let key = TaskKey::new("backup", 1, uuid::Uuid::nil());
/// bus.publish(TaskEvent::new(uuid::Uuid::new_v4(), key, TaskKind::Backup, TaskStatus::Queued));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    /// When the buffer is full the oldest events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Never blocks; with no subscribers
    /// the event is dropped.
    pub fn publish(&self, event: TaskEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
