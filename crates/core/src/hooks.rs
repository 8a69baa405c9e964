//! Per-table special cases applied during dump and restore.
//!
//! Hooks are registered against a table name once, when the registry is
//! built. The executor asks the registry for a table's hook set and never
//! branches on table names itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::helpers::SchemaHelpers;
use crate::row::DataRowInfo;
use crate::schema::TableInfo;
use crate::types::{TenantId, GLOBAL_TENANT};
use crate::value::ColumnValue;

// ---------------------------------------------------------------------------
// Select conditions
// ---------------------------------------------------------------------------

/// How a table's rows are scoped to one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TenantScope {
    /// `column = tenant`.
    Column { column: String, tenant: TenantId },
    /// `column IN (SELECT parent_column FROM parent_table
    /// WHERE parent_tenant_column = tenant)`.
    Via {
        column: String,
        parent_table: String,
        parent_column: String,
        parent_tenant_column: String,
        tenant: TenantId,
    },
}

/// Rows where `column = value` are left out of the dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    pub value: ColumnValue,
}

/// Structured row filter used when dumping a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectCondition {
    pub scope: TenantScope,
    pub exclusions: Vec<ColumnFilter>,
}

impl SelectCondition {
    /// Default condition `tenant_column = tenant`, if the table has one.
    pub fn tenant_scoped(table: &TableInfo, tenant: TenantId) -> Option<Self> {
        table.tenant_column.as_ref().map(|column| Self {
            scope: TenantScope::Column {
                column: column.clone(),
                tenant,
            },
            exclusions: Vec::new(),
        })
    }

    pub fn excluding(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.exclusions.push(ColumnFilter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// `true` if `row` is removed by one of the exclusions.
    pub fn is_excluded(&self, row: &DataRowInfo) -> bool {
        self.exclusions.iter().any(|f| {
            row.get(&f.column)
                .is_some_and(|v| v.key().is_some() && v.key() == f.value.key())
        })
    }
}

// ---------------------------------------------------------------------------
// Hook trait
// ---------------------------------------------------------------------------

/// Error raised by a hook. Fatal for the table being processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

/// Special-case behaviour of one table.
///
/// All methods default to "no special case".
pub trait TableHooks: Send + Sync {
    /// Adjust the dump filter. `base` is the condition produced so far
    /// (`None` when the table has no tenant column).
    fn select_condition(
        &self,
        _table: &TableInfo,
        _tenant: TenantId,
        base: Option<SelectCondition>,
    ) -> Option<SelectCondition> {
        base
    }

    /// Replace a value before insert. `Ok(None)` keeps the dumped value.
    fn prepare_value(
        &self,
        _table: &TableInfo,
        _column: &str,
        _value: &ColumnValue,
        _helpers: &SchemaHelpers,
    ) -> Result<Option<ColumnValue>, HookError> {
        Ok(None)
    }

    /// Transform or reject a row before insert. `Ok(None)` rejects it.
    fn prepare_row(
        &self,
        _table: &TableInfo,
        row: DataRowInfo,
        _helpers: &SchemaHelpers,
    ) -> Result<Option<DataRowInfo>, HookError> {
        Ok(Some(row))
    }
}

/// The hooks registered for one table, applied in registration order.
#[derive(Clone, Default)]
pub struct HookSet {
    hooks: Vec<Arc<dyn TableHooks>>,
}

impl HookSet {
    pub fn push(&mut self, hook: Arc<dyn TableHooks>) {
        self.hooks.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn select_condition(&self, table: &TableInfo, tenant: TenantId) -> Option<SelectCondition> {
        self.hooks
            .iter()
            .fold(SelectCondition::tenant_scoped(table, tenant), |base, h| {
                h.select_condition(table, tenant, base)
            })
    }

    /// First hook returning a replacement wins.
    pub fn prepare_value(
        &self,
        table: &TableInfo,
        column: &str,
        value: &ColumnValue,
        helpers: &SchemaHelpers,
    ) -> Result<Option<ColumnValue>, HookError> {
        for hook in &self.hooks {
            if let Some(v) = hook.prepare_value(table, column, value, helpers)? {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    /// Stops at the first hook rejecting the row.
    pub fn prepare_row(
        &self,
        table: &TableInfo,
        row: DataRowInfo,
        helpers: &SchemaHelpers,
    ) -> Result<Option<DataRowInfo>, HookError> {
        let mut current = row;
        for hook in &self.hooks {
            match hook.prepare_row(table, current, helpers)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

// ---------------------------------------------------------------------------
// Built-in hooks
// ---------------------------------------------------------------------------

/// Reject rows stamped with the portal-wide sentinel tenant.
#[derive(Debug, Default)]
pub struct RejectGlobalTenantRows;

impl TableHooks for RejectGlobalTenantRows {
    fn prepare_row(
        &self,
        table: &TableInfo,
        row: DataRowInfo,
        _helpers: &SchemaHelpers,
    ) -> Result<Option<DataRowInfo>, HookError> {
        let Some(column) = table.tenant_column.as_deref() else {
            return Err(HookError(format!(
                "table '{}' has no tenant column to check",
                table.name
            )));
        };
        let tenant = row.get(column).and_then(ColumnValue::as_int);
        if tenant == Some(i64::from(GLOBAL_TENANT)) {
            return Ok(None);
        }
        Ok(Some(row))
    }
}

/// Scope a table without its own tenant column through a parent table.
#[derive(Debug, Clone)]
pub struct ScopeThroughParent {
    pub column: String,
    pub parent_table: String,
    pub parent_column: String,
    pub parent_tenant_column: String,
}

impl ScopeThroughParent {
    pub fn new(
        column: impl Into<String>,
        parent_table: impl Into<String>,
        parent_column: impl Into<String>,
        parent_tenant_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            parent_table: parent_table.into(),
            parent_column: parent_column.into(),
            parent_tenant_column: parent_tenant_column.into(),
        }
    }
}

impl TableHooks for ScopeThroughParent {
    fn select_condition(
        &self,
        _table: &TableInfo,
        tenant: TenantId,
        base: Option<SelectCondition>,
    ) -> Option<SelectCondition> {
        let exclusions = base.map(|b| b.exclusions).unwrap_or_default();
        Some(SelectCondition {
            scope: TenantScope::Via {
                column: self.column.clone(),
                parent_table: self.parent_table.clone(),
                parent_column: self.parent_column.clone(),
                parent_tenant_column: self.parent_tenant_column.clone(),
                tenant,
            },
            exclusions,
        })
    }
}

/// Leave rows with specific column values out of the dump.
#[derive(Debug, Clone)]
pub struct ExcludeRows {
    pub column: String,
    pub values: Vec<ColumnValue>,
}

impl TableHooks for ExcludeRows {
    fn select_condition(
        &self,
        _table: &TableInfo,
        _tenant: TenantId,
        base: Option<SelectCondition>,
    ) -> Option<SelectCondition> {
        base.map(|b| {
            self.values
                .iter()
                .fold(b, |c, v| c.excluding(self.column.clone(), v.clone()))
        })
    }
}

/// Set columns to the restore instant instead of copying them.
#[derive(Debug, Clone)]
pub struct TouchOnRestore {
    pub columns: Vec<String>,
}

impl TableHooks for TouchOnRestore {
    fn prepare_value(
        &self,
        _table: &TableInfo,
        column: &str,
        _value: &ColumnValue,
        helpers: &SchemaHelpers,
    ) -> Result<Option<ColumnValue>, HookError> {
        if self.columns.iter().any(|c| c == column) {
            Ok(Some(ColumnValue::DateTime(helpers.now_naive())))
        } else {
            Ok(None)
        }
    }
}
