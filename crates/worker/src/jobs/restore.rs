use std::sync::Arc;

use async_trait::async_trait;
use tenvault_cloud::{StorageError, StorageTarget};
use tenvault_core::retry::{retry_with_backoff, RetryPolicy};
use tenvault_core::task::TaskKind;
use tenvault_pipeline::{read_container, RestoreExecutor, RestoreRequest};

use crate::error::TaskError;
use crate::scheduler::{Job, JobContext, JobOutput};

/// Download a container and restore it into the target tenant.
pub struct RestoreJob {
    pub restorer: RestoreExecutor,
    pub storage: Arc<dyn StorageTarget>,
    /// Storage key of the backup.
    pub path: String,
    pub request: RestoreRequest,
    pub retry: RetryPolicy,
}

#[async_trait]
impl Job for RestoreJob {
    fn kind(&self) -> TaskKind {
        TaskKind::Restore
    }

    async fn run(self: Box<Self>, ctx: &JobContext) -> Result<JobOutput, TaskError> {
        let bytes = retry_with_backoff(
            &self.retry,
            &ctx.cancel,
            "read_backup",
            StorageError::is_transient,
            |_| self.storage.read(&self.path),
        )
        .await
        .map_err(super::storage_failure)?;

        let container = read_container(&bytes)?;
        let report = self
            .restorer
            .restore(&container, &self.request, &ctx.cancel, ctx.progress.as_ref())
            .await?;

        tracing::info!(
            task_id = %ctx.task_id,
            source_tenant = container.manifest.source_tenant,
            tenant_id = self.request.target_tenant,
            restored = report.total_restored(),
            dropped = report.total_dropped(),
            "Restore applied"
        );

        Ok(JobOutput {
            artifact: None,
            warnings: report.warnings(),
        })
    }
}
