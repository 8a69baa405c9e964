//! In-memory [`TenantStore`] for tests and dry runs.
//!
//! Mirrors the guarantees the executor relies on: primary-key and declared
//! unique-set enforcement, a monotonically increasing id sequence per table,
//! and writes that become visible only on commit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tenvault_core::hooks::{SelectCondition, TenantScope};
use tenvault_core::registry::SchemaRegistry;
use tenvault_core::row::DataRowInfo;
use tenvault_core::schema::{InsertMode, TableInfo};
use tenvault_core::store::{InsertOutcome, StoreError, TableWriter, TenantStore};
use tenvault_core::types::TenantId;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<DataRowInfo>,
    /// Column sets whose combined key form must be unique.
    unique: Vec<Vec<String>>,
    next_id: i64,
}

impl MemoryTable {
    fn bump_sequence(&mut self, row: &DataRowInfo, id_column: Option<&str>) {
        if let Some(id) = id_column.and_then(|c| row.get(c)).and_then(|v| v.as_int()) {
            self.next_id = self.next_id.max(id);
        }
    }

    fn conflicts(&self, candidate: &DataRowInfo, pending: &[DataRowInfo]) -> Option<String> {
        self.unique.iter().find_map(|set| {
            let key = unique_key(candidate, set)?;
            let clash = self
                .rows
                .iter()
                .chain(pending)
                .any(|r| unique_key(r, set).as_ref() == Some(&key));
            clash.then(|| set.join(","))
        })
    }
}

/// Combined key form of `columns`, or `None` if any of them is null.
fn unique_key(row: &DataRowInfo, columns: &[String]) -> Option<Vec<String>> {
    columns
        .iter()
        .map(|c| row.get(c).and_then(|v| v.key()))
        .collect()
}

/// Thread-safe in-memory tenant store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryTenantStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one empty table per registry table, keyed on its id column.
    pub async fn for_registry(registry: &SchemaRegistry) -> Self {
        let store = Self::new();
        for module in registry.modules() {
            let Ok(tables) = registry.tables(module) else {
                continue;
            };
            for table in tables {
                let unique = table.id_column.iter().map(|c| vec![c.clone()]).collect();
                store.create_table(&table.name, unique).await;
            }
        }
        store
    }

    /// Create (or reset) a table with the given unique column sets.
    pub async fn create_table(&self, name: &str, unique: Vec<Vec<String>>) {
        self.tables.write().await.insert(
            name.to_string(),
            MemoryTable {
                unique,
                ..MemoryTable::default()
            },
        );
    }

    /// Add a unique column set to an existing table.
    pub async fn add_unique(&self, name: &str, columns: &[&str]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))?;
        table
            .unique
            .push(columns.iter().map(|c| c.to_string()).collect());
        Ok(())
    }

    /// Seed rows directly, bypassing constraints.
    pub async fn seed(
        &self,
        name: &str,
        id_column: Option<&str>,
        rows: impl IntoIterator<Item = DataRowInfo>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))?;
        for row in rows {
            table.bump_sequence(&row, id_column);
            table.rows.push(row);
        }
        Ok(())
    }

    /// Snapshot of a table's committed rows.
    pub async fn rows(&self, name: &str) -> Vec<DataRowInfo> {
        self.tables
            .read()
            .await
            .get(name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

fn tenant_matches(row: &DataRowInfo, column: &str, tenant: TenantId) -> bool {
    row.get(column)
        .and_then(|v| v.as_int())
        .is_some_and(|t| t == i64::from(tenant))
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn select_rows(
        &self,
        table: &TableInfo,
        condition: &SelectCondition,
    ) -> Result<Vec<DataRowInfo>, StoreError> {
        let tables = self.tables.read().await;
        let rows = &tables
            .get(&table.name)
            .ok_or_else(|| StoreError::UnknownTable(table.name.clone()))?
            .rows;

        let scoped: Vec<&DataRowInfo> = match &condition.scope {
            TenantScope::Column { column, tenant } => rows
                .iter()
                .filter(|r| tenant_matches(r, column, *tenant))
                .collect(),
            TenantScope::Via {
                column,
                parent_table,
                parent_column,
                parent_tenant_column,
                tenant,
            } => {
                let parents = tables
                    .get(parent_table)
                    .ok_or_else(|| StoreError::UnknownTable(parent_table.clone()))?;
                let keys: HashSet<String> = parents
                    .rows
                    .iter()
                    .filter(|r| tenant_matches(r, parent_tenant_column, *tenant))
                    .filter_map(|r| r.get(parent_column).and_then(|v| v.key()))
                    .collect();
                rows.iter()
                    .filter(|r| {
                        r.get(column)
                            .and_then(|v| v.key())
                            .is_some_and(|k| keys.contains(&k))
                    })
                    .collect()
            }
        };

        Ok(scoped
            .into_iter()
            .filter(|r| !condition.is_excluded(r))
            .cloned()
            .collect())
    }

    async fn begin_table(&self, table: &TableInfo) -> Result<Box<dyn TableWriter>, StoreError> {
        if !self.tables.read().await.contains_key(&table.name) {
            return Err(StoreError::UnknownTable(table.name.clone()));
        }
        Ok(Box::new(MemoryTableWriter {
            tables: Arc::clone(&self.tables),
            table: table.clone(),
            pending: Vec::new(),
        }))
    }
}

/// Buffers inserted rows until commit; dropping it discards them.
struct MemoryTableWriter {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
    table: TableInfo,
    pending: Vec<DataRowInfo>,
}

#[async_trait]
impl TableWriter for MemoryTableWriter {
    async fn allocate_id(&mut self) -> Result<i64, StoreError> {
        if self.table.id_column.is_none() {
            return Err(StoreError::NoKeyColumn {
                table: self.table.name.clone(),
            });
        }
        let mut tables = self.tables.write().await;
        let t = tables
            .get_mut(&self.table.name)
            .ok_or_else(|| StoreError::UnknownTable(self.table.name.clone()))?;
        t.next_id += 1;
        Ok(t.next_id)
    }

    async fn insert(
        &mut self,
        row: &DataRowInfo,
        mode: InsertMode,
    ) -> Result<InsertOutcome, StoreError> {
        let tables = self.tables.read().await;
        let t = tables
            .get(&self.table.name)
            .ok_or_else(|| StoreError::UnknownTable(self.table.name.clone()))?;

        if let Some(constraint) = t.conflicts(row, &self.pending) {
            return match mode {
                InsertMode::IgnoreDuplicate => Ok(InsertOutcome::Duplicate),
                _ => Err(StoreError::UniqueViolation {
                    table: self.table.name.clone(),
                    detail: constraint,
                }),
            };
        }
        drop(tables);

        self.pending.push(row.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut tables = this.tables.write().await;
        let t = tables
            .get_mut(&this.table.name)
            .ok_or_else(|| StoreError::UnknownTable(this.table.name.clone()))?;
        let id_column = this.table.id_column.as_deref();
        for row in this.pending {
            t.bump_sequence(&row, id_column);
            t.rows.push(row);
        }
        Ok(())
    }
}
