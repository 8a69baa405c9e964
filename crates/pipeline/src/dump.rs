//! Tenant dump: select every table of the requested modules into a
//! [`DumpContainer`].

use std::sync::Arc;

use chrono::FixedOffset;
use tenvault_core::store::TenantStore;
use tenvault_core::types::TenantId;
use tenvault_core::SchemaRegistry;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;
use crate::format::DumpContainer;
use crate::progress::{Phase, ProgressSink, ProgressUpdate};
use crate::timezone;

#[derive(Debug, Clone)]
pub struct DumpRequest {
    pub tenant: TenantId,
    /// The tenant's UTC offset, used for tenant-relative dates.
    pub offset: FixedOffset,
    pub modules: Vec<String>,
}

#[derive(Clone)]
pub struct DumpExecutor {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn TenantStore>,
}

impl DumpExecutor {
    pub fn new(registry: Arc<SchemaRegistry>, store: Arc<dyn TenantStore>) -> Self {
        Self { registry, store }
    }

    /// Dump every table of `request.modules`, parents first.
    ///
    /// Dump-only tables are included so restore can resolve references
    /// against them.
    pub async fn dump(
        &self,
        request: &DumpRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<DumpContainer, ExecutorError> {
        let tables = self.registry.processing_order(&request.modules)?;
        let mut container = DumpContainer::new(
            request.tenant,
            request.modules.clone(),
            self.registry.helpers().now(),
        );

        tracing::info!(
            tenant_id = request.tenant,
            modules = ?request.modules,
            tables = tables.len(),
            "Dump started"
        );

        for (i, table) in tables.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }

            let condition = self.registry.select_condition(table, request.tenant)?;
            let mut rows = self.store.select_rows(table, &condition).await?;
            for row in &mut rows {
                timezone::row_to_utc(table, row, request.offset);
            }

            tracing::debug!(
                tenant_id = request.tenant,
                table = %table.name,
                rows = rows.len(),
                "Table dumped"
            );
            container.push_table(&table.name, &table.module, rows);

            progress
                .report(ProgressUpdate {
                    phase: Phase::Dump,
                    table: table.name.clone(),
                    completed: i + 1,
                    total: tables.len(),
                })
                .await?;
        }

        tracing::info!(
            tenant_id = request.tenant,
            rows = container.total_rows(),
            "Dump finished"
        );
        Ok(container)
    }
}
