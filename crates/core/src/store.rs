//! Storage-engine seam the executor reads and writes tenant rows through.

use async_trait::async_trait;

use crate::error::SchemaError;
use crate::hooks::SelectCondition;
use crate::row::DataRowInfo;
use crate::schema::{InsertMode, TableInfo};

/// Errors raised by a [`TenantStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected a row on a table that does not ignore
    /// duplicates.
    #[error("Unique constraint violated on '{table}': {detail}")]
    UniqueViolation { table: String, detail: String },

    #[error("Table '{0}' does not exist in the store")]
    UnknownTable(String),

    #[error("Table '{table}' has no key column to allocate ids for")]
    NoKeyColumn { table: String },

    #[error("Value of column '{column}' cannot be stored: {reason}")]
    InvalidValue { column: String, reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result of inserting one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The row conflicted with an existing one and was skipped
    /// ([`InsertMode::IgnoreDuplicate`] only).
    Duplicate,
}

/// Read access to tenant rows and per-table write sessions.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Rows of `table` matching `condition`.
    async fn select_rows(
        &self,
        table: &TableInfo,
        condition: &SelectCondition,
    ) -> Result<Vec<DataRowInfo>, StoreError>;

    /// Open a write session for one table.
    ///
    /// Nothing written through the session is visible until
    /// [`TableWriter::commit`]; dropping the session discards it.
    async fn begin_table(&self, table: &TableInfo) -> Result<Box<dyn TableWriter>, StoreError>;
}

/// Transactional write session for one table.
#[async_trait]
pub trait TableWriter: Send {
    /// Reserve a new integer key from the table's sequence.
    async fn allocate_id(&mut self) -> Result<i64, StoreError>;

    async fn insert(
        &mut self,
        row: &DataRowInfo,
        mode: InsertMode,
    ) -> Result<InsertOutcome, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
