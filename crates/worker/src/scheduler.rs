//! Background task scheduler.
//!
//! Runs jobs on a bounded pool with at most one non-terminal task per
//! [`TaskKey`]. Each task is one tokio task that waits for a pool permit,
//! runs its [`Job`] and records the outcome through the
//! [`StatusPublisher`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tenvault_core::task::{TaskKey, TaskKind, TaskStatus};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::error::TaskError;
use crate::status::{StatusPublisher, TaskProgress, TaskSnapshot};

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// What a running job sees of its task.
pub struct JobContext {
    pub task_id: Uuid,
    pub key: TaskKey,
    /// Fires when the task is terminated or the scheduler shuts down.
    pub cancel: CancellationToken,
    pub progress: Arc<TaskProgress>,
}

/// Result of a successful job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobOutput {
    pub artifact: Option<String>,
    pub warnings: Vec<String>,
}

/// A unit of background work.
#[async_trait]
pub trait Job: Send + 'static {
    fn kind(&self) -> TaskKind;

    async fn run(self: Box<Self>, ctx: &JobContext) -> Result<JobOutput, TaskError>;
}

/// Returned by [`TaskScheduler::enqueue`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskHandle {
    pub id: Uuid,
    #[serde(flatten)]
    pub key: TaskKey,
    pub kind: TaskKind,
    /// `false` when an already active task for the key was returned.
    pub created: bool,
}

struct ActiveTask {
    id: Uuid,
    kind: TaskKind,
    cancel: CancellationToken,
}

type ActiveTasks = Arc<Mutex<HashMap<TaskKey, ActiveTask>>>;

// ---------------------------------------------------------------------------
// TaskScheduler
// ---------------------------------------------------------------------------

pub struct TaskScheduler {
    permits: Arc<Semaphore>,
    active: ActiveTasks,
    publisher: StatusPublisher,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl TaskScheduler {
    /// `pool_size` bounds how many jobs run at once; further tasks stay
    /// queued until a slot frees up.
    pub fn new(pool_size: usize, publisher: StatusPublisher) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
            active: Arc::new(Mutex::new(HashMap::new())),
            publisher,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Queue `job` under `key`.
    ///
    /// If a non-terminal task already exists for the key its handle is
    /// returned and `job` is dropped.
    pub async fn enqueue(&self, key: TaskKey, job: Box<dyn Job>) -> Result<TaskHandle, TaskError> {
        if self.shutdown.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        let kind = job.kind();
        let mut active = self.active.lock().await;
        if let Some(existing) = active.get(&key) {
            tracing::debug!(key = %key, task_id = %existing.id, "Task already active");
            return Ok(TaskHandle {
                id: existing.id,
                key,
                kind: existing.kind,
                created: false,
            });
        }

        let id = Uuid::new_v4();
        let snapshot = TaskSnapshot::queued(id, key.clone(), kind);
        self.publisher
            .publish(&snapshot, &CancellationToken::new())
            .await?;

        let cancel = self.shutdown.child_token();
        active.insert(
            key.clone(),
            ActiveTask {
                id,
                kind,
                cancel: cancel.clone(),
            },
        );
        drop(active);

        let ctx = JobContext {
            task_id: id,
            key: key.clone(),
            cancel: cancel.clone(),
            progress: Arc::new(TaskProgress::new(snapshot, self.publisher.clone(), cancel)),
        };
        self.tracker.spawn(run_task(
            Arc::clone(&self.permits),
            Arc::clone(&self.active),
            job,
            ctx,
        ));

        tracing::info!(task_id = %id, key = %key, %kind, "Task queued");
        Ok(TaskHandle {
            id,
            key,
            kind,
            created: true,
        })
    }

    /// Latest snapshot of the most recent task for `key`.
    pub async fn status(&self, key: &TaskKey) -> Result<Option<TaskSnapshot>, TaskError> {
        self.publisher
            .store()
            .get(key)
            .await
            .map_err(|e| TaskError::Status(e.to_string()))
    }

    /// Request cancellation of the active task for `key`.
    ///
    /// Returns `false` when no task is active. The task observes the
    /// request at its next checkpoint and finishes as cancelled.
    pub async fn terminate(&self, key: &TaskKey) -> bool {
        match self.active.lock().await.get(key) {
            Some(task) => {
                tracing::info!(task_id = %task.id, key = %key, "Task termination requested");
                task.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_active(&self, key: &TaskKey) -> bool {
        self.active.lock().await.contains_key(key)
    }

    /// Cancel every task and wait for all of them to record their outcome.
    pub async fn shutdown(&self) {
        tracing::info!("Task scheduler shutting down");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn run_task(permits: Arc<Semaphore>, active: ActiveTasks, job: Box<dyn Job>, ctx: JobContext) {
    let permit = tokio::select! {
        _ = ctx.cancel.cancelled() => None,
        permit = permits.acquire_owned() => permit.ok(),
    };

    let outcome = match permit {
        None => Err(TaskError::Cancelled),
        Some(_permit) => match start(&ctx).await {
            Ok(()) => job.run(&ctx).await,
            Err(e) => Err(e),
        },
    };

    // The key stays locked until the outcome is recorded, so enqueue never
    // hands out a task that has already finished.
    let mut active = active.lock().await;
    finish(&ctx, outcome).await;
    if active.get(&ctx.key).is_some_and(|t| t.id == ctx.task_id) {
        active.remove(&ctx.key);
    }
}

async fn start(ctx: &JobContext) -> Result<(), TaskError> {
    ctx.progress
        .update(&ctx.cancel, |s| s.transition(TaskStatus::Started))
        .await?;
    tracing::info!(task_id = %ctx.task_id, key = %ctx.key, "Task started");
    Ok(())
}

async fn finish(ctx: &JobContext, outcome: Result<JobOutput, TaskError>) {
    // The final status must land even for a cancelled task.
    let cancel = CancellationToken::new();
    let result = match outcome {
        Ok(output) => {
            tracing::info!(
                task_id = %ctx.task_id,
                key = %ctx.key,
                artifact = output.artifact.as_deref().unwrap_or_default(),
                warnings = output.warnings.len(),
                "Task done"
            );
            ctx.progress
                .update(&cancel, |s| {
                    s.result_artifact = output.artifact;
                    s.warnings = output.warnings;
                    s.transition(TaskStatus::Done)
                })
                .await
        }
        Err(e) => {
            let cancelled = e.is_cancelled();
            tracing::warn!(
                task_id = %ctx.task_id,
                key = %ctx.key,
                cancelled,
                error = %e,
                "Task failed"
            );
            ctx.progress
                .update(&cancel, |s| {
                    s.error = Some(e.to_string());
                    s.cancelled = cancelled;
                    s.transition(TaskStatus::Failed)
                })
                .await
        }
    };

    if let Err(e) = result {
        tracing::error!(task_id = %ctx.task_id, error = %e, "Failed to record task outcome");
    }
}
