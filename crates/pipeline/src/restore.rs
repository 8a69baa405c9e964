//! Tenant restore: write a [`DumpContainer`] into a target tenant,
//! regenerating keys and remapping every reference through a session
//! [`ColumnMapper`].

use std::sync::Arc;

use chrono::FixedOffset;
use tenvault_core::mapper::ColumnMapper;
use tenvault_core::row::DataRowInfo;
use tenvault_core::schema::{IdType, KeyPolicy, TableInfo};
use tenvault_core::store::{InsertOutcome, TableWriter, TenantStore};
use tenvault_core::transform::{ColumnTransformer, Transformed};
use tenvault_core::types::TenantId;
use tenvault_core::{ColumnValue, SchemaError, SchemaRegistry};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ExecutorError;
use crate::format::DumpContainer;
use crate::order;
use crate::progress::{Phase, ProgressSink, ProgressUpdate};
use crate::report::{RestoreReport, TableStats};
use crate::timezone;

/// Rows restored between two cancellation checks.
pub const ROW_BATCH: usize = 200;

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub target_tenant: TenantId,
    /// The target tenant's UTC offset.
    pub target_offset: FixedOffset,
    /// Modules to restore; `None` restores every module in the dump.
    pub modules: Option<Vec<String>>,
}

/// What happened to one dumped row.
enum RowOutcome {
    Ready(DataRowInfo),
    Dropped(String),
}

#[derive(Clone)]
pub struct RestoreExecutor {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn TenantStore>,
}

impl RestoreExecutor {
    pub fn new(registry: Arc<SchemaRegistry>, store: Arc<dyn TenantStore>) -> Self {
        Self { registry, store }
    }

    /// Restore `container` into `request.target_tenant`.
    ///
    /// Tables are written one transaction each, parents first. A fatal error
    /// stops the restore; tables committed before it stay written.
    pub async fn restore(
        &self,
        container: &DumpContainer,
        request: &RestoreRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<RestoreReport, ExecutorError> {
        let modules = request
            .modules
            .clone()
            .unwrap_or_else(|| container.manifest.modules.clone());
        let tables = self.registry.processing_order(&modules)?;

        if let Some(missing) = tables.iter().find(|t| container.rows(&t.name).is_none()) {
            return Err(SchemaError::MissingTable(missing.name.clone()).into());
        }

        tracing::info!(
            source_tenant = container.manifest.source_tenant,
            tenant_id = request.target_tenant,
            modules = ?modules,
            "Restore started"
        );

        let mut mapper = ColumnMapper::new();
        for table in &tables {
            mapper.mark_restored(&table.name);
        }

        let mut report = RestoreReport::default();
        for (i, table) in tables.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }
            let rows = container.rows(&table.name).unwrap_or_default();

            let stats = if table.is_restorable() {
                self.restore_table(table, rows, request, &mut mapper, cancel)
                    .await?
            } else {
                register_existing_keys(table, rows, &mut mapper);
                TableStats::new(&table.name)
            };

            tracing::debug!(
                tenant_id = request.target_tenant,
                table = %table.name,
                restored = stats.restored,
                dropped = stats.dropped,
                "Table restored"
            );
            report.tables.push(stats);

            progress
                .report(ProgressUpdate {
                    phase: Phase::Restore,
                    table: table.name.clone(),
                    completed: i + 1,
                    total: tables.len(),
                })
                .await?;
        }

        tracing::info!(
            tenant_id = request.target_tenant,
            restored = report.total_restored(),
            dropped = report.total_dropped(),
            "Restore finished"
        );
        Ok(report)
    }

    async fn restore_table(
        &self,
        table: &TableInfo,
        rows: &[DataRowInfo],
        request: &RestoreRequest,
        mapper: &mut ColumnMapper,
        cancel: &CancellationToken,
    ) -> Result<TableStats, ExecutorError> {
        let mut stats = TableStats::new(&table.name);
        let mut writer = self.store.begin_table(table).await?;

        for (n, index) in self.row_order(table, rows).into_iter().enumerate() {
            if n > 0 && n % ROW_BATCH == 0 && cancel.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }
            self.restore_row(table, &rows[index], request, mapper, writer.as_mut(), &mut stats)
                .await?;
        }

        writer.commit().await?;
        Ok(stats)
    }

    async fn restore_row(
        &self,
        table: &TableInfo,
        dumped: &DataRowInfo,
        request: &RestoreRequest,
        mapper: &mut ColumnMapper,
        writer: &mut dyn TableWriter,
        stats: &mut TableStats,
    ) -> Result<(), ExecutorError> {
        let helpers = self.registry.helpers();
        let prepared = self
            .registry
            .hooks(&table.name)
            .prepare_row(table, dumped.clone(), helpers)
            .map_err(|e| hook_failed(table, e.0))?;
        let Some(row) = prepared else {
            stats.rejected_by_hook += 1;
            return Ok(());
        };

        // The row's own key is staged first so self references resolve.
        let new_key = self.stage_key(table, &row, mapper, writer).await?;

        match self.build_row(table, &row, new_key, request, mapper)? {
            RowOutcome::Ready(out) => match writer.insert(&out, table.insert_mode).await? {
                InsertOutcome::Inserted => {
                    mapper.commit_staged();
                    stats.restored += 1;
                }
                InsertOutcome::Duplicate => {
                    // A preserved key that already exists is the same entity.
                    if table.key_policy == KeyPolicy::Preserve {
                        mapper.commit_staged();
                    } else {
                        mapper.discard_staged();
                    }
                    stats.duplicates_ignored += 1;
                }
            },
            RowOutcome::Dropped(reason) => {
                mapper.discard_staged();
                tracing::debug!(table = %table.name, %reason, "Row dropped");
                stats.dropped += 1;
            }
        }
        Ok(())
    }

    /// Generate (or keep) the row's primary key and stage the mapping.
    async fn stage_key(
        &self,
        table: &TableInfo,
        row: &DataRowInfo,
        mapper: &mut ColumnMapper,
        writer: &mut dyn TableWriter,
    ) -> Result<Option<ColumnValue>, ExecutorError> {
        let Some(id_column) = table.id_column.as_deref() else {
            return Ok(None);
        };
        let Some(old) = row.get(id_column).filter(|v| !v.is_null()) else {
            return Ok(None);
        };

        let new = match (table.key_policy, table.id_type) {
            (KeyPolicy::Preserve, _) => old.clone(),
            (KeyPolicy::Generate, IdType::Integer) => {
                old.coerce_like(&ColumnValue::Int(writer.allocate_id().await?))
            }
            (KeyPolicy::Generate, IdType::Guid) => {
                old.coerce_like(&ColumnValue::Guid(Uuid::new_v4()))
            }
        };
        mapper.stage(&table.name, id_column, old, new.clone());
        Ok(Some(new))
    }

    fn build_row(
        &self,
        table: &TableInfo,
        row: &DataRowInfo,
        new_key: Option<ColumnValue>,
        request: &RestoreRequest,
        mapper: &ColumnMapper,
    ) -> Result<RowOutcome, ExecutorError> {
        let hooks = self.registry.hooks(&table.name);
        let helpers = self.registry.helpers();
        let transformer = ColumnTransformer::new(&self.registry, mapper);
        let tenant = ColumnValue::Int(i64::from(request.target_tenant));

        let mut out = DataRowInfo::new();
        for (column, value) in row.iter() {
            if table.is_tenant_column(column) {
                out.set(column, value.coerce_like(&tenant));
                continue;
            }
            if table.is_id_column(column) {
                out.set(column, new_key.clone().unwrap_or_else(|| value.clone()));
                continue;
            }

            let replaced = hooks
                .prepare_value(table, column, value, helpers)
                .map_err(|e| hook_failed(table, e.0))?;
            let is_replaced = replaced.is_some();
            let value = replaced.unwrap_or_else(|| value.clone());

            let value = match transformer.transform(table, column, &value, row)? {
                Transformed::Keep => value,
                Transformed::Value(v) => v,
                Transformed::Drop(reason) => return Ok(RowOutcome::Dropped(reason)),
            };
            let value = if is_replaced {
                value
            } else {
                timezone::value_to_local(table, column, value, request.target_offset)
            };
            out.set(column, value);
        }
        Ok(RowOutcome::Ready(out))
    }

    /// Dump order, reordered parents first when the table references itself.
    fn row_order(&self, table: &TableInfo, rows: &[DataRowInfo]) -> Vec<usize> {
        let Some(id_column) = table.id_column.as_deref() else {
            return (0..rows.len()).collect();
        };
        let parents: Vec<&str> = self
            .registry
            .relations(&table.name)
            .filter(|r| r.is_self_reference())
            .map(|r| r.child.column.as_str())
            .collect();
        order::parents_first(rows, id_column, &parents)
    }
}

/// Dump-only tables are never written, but their keys still resolve: they
/// map to themselves.
fn register_existing_keys(table: &TableInfo, rows: &[DataRowInfo], mapper: &mut ColumnMapper) {
    let Some(id_column) = table.id_column.as_deref() else {
        return;
    };
    for row in rows {
        if let Some(id) = row.get(id_column) {
            mapper.insert(&table.name, id_column, id, id.clone());
        }
    }
}

fn hook_failed(table: &TableInfo, reason: String) -> ExecutorError {
    SchemaError::HookFailed {
        table: table.name.clone(),
        reason,
    }
    .into()
}
