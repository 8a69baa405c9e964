//! Task event log writer.
//!
//! [`EventLog`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes every lifecycle change as a structured log line. It runs until the
//! bus is dropped.

use tenvault_core::task::TaskStatus;
use tokio::sync::broadcast;

use crate::bus::TaskEvent;

pub struct EventLog;

impl EventLog {
    pub async fn run(mut receiver: broadcast::Receiver<TaskEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::write(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event log lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event log shutting down");
                    break;
                }
            }
        }
    }

    fn write(event: &TaskEvent) {
        match event.status {
            TaskStatus::Failed => tracing::warn!(
                task_id = %event.task_id,
                key = %event.key,
                kind = %event.kind,
                message = event.message.as_deref().unwrap_or_default(),
                "Task failed"
            ),
            status => tracing::info!(
                task_id = %event.task_id,
                key = %event.key,
                kind = %event.kind,
                ?status,
                percent = event.percent,
                "Task update"
            ),
        }
    }
}
