//! Pruning of stored backups beyond a tenant's retained-copies count.

use tenvault_cloud::{StorageError, StorageTarget};
use tenvault_core::types::TenantId;

/// Prefix under which a tenant's backups are stored.
pub fn tenant_prefix(tenant: TenantId) -> String {
    format!("{tenant}/")
}

/// Delete the oldest artifacts under `prefix` so at most `keep` remain.
///
/// Artifact names embed a sortable timestamp, so name order is age order.
/// Returns the deleted keys. A `keep` of zero disables pruning.
pub async fn prune(
    storage: &dyn StorageTarget,
    prefix: &str,
    keep: usize,
) -> Result<Vec<String>, StorageError> {
    if keep == 0 {
        return Ok(Vec::new());
    }

    let mut keys = storage.list(prefix).await?;
    keys.sort();
    if keys.len() <= keep {
        return Ok(Vec::new());
    }

    let excess = keys.len() - keep;
    let doomed: Vec<String> = keys.into_iter().take(excess).collect();
    for key in &doomed {
        storage.delete(key).await?;
        tracing::info!(prefix, key = %key, "Old backup deleted");
    }
    Ok(doomed)
}
