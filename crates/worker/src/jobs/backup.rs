use std::sync::Arc;

use async_trait::async_trait;
use tenvault_cloud::{StorageError, StorageTarget};
use tenvault_core::retry::{retry_with_backoff, RetryPolicy};
use tenvault_core::task::TaskKind;
use tenvault_core::types::{TenantId, Timestamp};
use tenvault_pipeline::{write_container, DumpExecutor, DumpRequest};

use crate::error::TaskError;
use crate::retention;
use crate::scheduler::{Job, JobContext, JobOutput};

/// Storage key of a backup taken at `created_at`.
///
/// The timestamp sorts lexicographically, which retention relies on.
pub fn backup_path(tenant: TenantId, created_at: Timestamp) -> String {
    format!(
        "{}backup_{}.zip",
        retention::tenant_prefix(tenant),
        created_at.format("%Y%m%dT%H%M%S")
    )
}

/// Dump a tenant, upload the container and prune old copies.
pub struct BackupJob {
    pub dumper: DumpExecutor,
    pub storage: Arc<dyn StorageTarget>,
    pub request: DumpRequest,
    /// Copies kept after upload; zero keeps everything.
    pub backups_stored: usize,
    pub retry: RetryPolicy,
}

#[async_trait]
impl Job for BackupJob {
    fn kind(&self) -> TaskKind {
        TaskKind::Backup
    }

    async fn run(self: Box<Self>, ctx: &JobContext) -> Result<JobOutput, TaskError> {
        let tenant = self.request.tenant;
        let container = self
            .dumper
            .dump(&self.request, &ctx.cancel, ctx.progress.as_ref())
            .await?;
        let bytes = write_container(&container)?;
        let path = backup_path(tenant, container.manifest.created_at);

        retry_with_backoff(
            &self.retry,
            &ctx.cancel,
            "write_backup",
            StorageError::is_transient,
            |_| self.storage.write(&path, bytes.clone()),
        )
        .await
        .map_err(super::storage_failure)?;

        tracing::info!(
            task_id = %ctx.task_id,
            tenant_id = tenant,
            path = %path,
            size = bytes.len(),
            rows = container.total_rows(),
            "Backup stored"
        );

        let mut warnings = Vec::new();
        let prefix = retention::tenant_prefix(tenant);
        if let Err(e) = retention::prune(self.storage.as_ref(), &prefix, self.backups_stored).await {
            tracing::warn!(tenant_id = tenant, error = %e, "Backup retention failed");
            warnings.push(format!("Old backups were not pruned: {e}"));
        }

        Ok(JobOutput {
            artifact: Some(path),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn backup_paths_sort_by_time() {
        let earlier = backup_path(7, Utc.with_ymd_and_hms(2025, 1, 9, 23, 0, 0).unwrap());
        let later = backup_path(7, Utc.with_ymd_and_hms(2025, 1, 10, 1, 0, 0).unwrap());
        assert_eq!(earlier, "7/backup_20250109T230000.zip");
        assert!(earlier < later);
    }
}
