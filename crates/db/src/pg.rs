//! PostgreSQL [`TenantStore`].

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, Transaction};
use tenvault_core::hooks::SelectCondition;
use tenvault_core::row::DataRowInfo;
use tenvault_core::schema::{InsertMode, TableInfo};
use tenvault_core::store::{InsertOutcome, StoreError, TableWriter, TenantStore};

use crate::json::{decode_row, encode_row};
use crate::sql::{self, Bind};
use crate::DbPool;

/// PostgreSQL error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL error code for an undefined table.
const UNDEFINED_TABLE: &str = "42P01";

pub struct PgTenantStore {
    pool: DbPool,
}

impl PgTenantStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn map_sqlx(table: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return StoreError::UniqueViolation {
                    table: table.to_string(),
                    detail: db_err.constraint().unwrap_or("unknown").to_string(),
                }
            }
            Some(UNDEFINED_TABLE) => return StoreError::UnknownTable(table.to_string()),
            _ => {}
        }
    }
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn select_rows(
        &self,
        table: &TableInfo,
        condition: &SelectCondition,
    ) -> Result<Vec<DataRowInfo>, StoreError> {
        let (query, binds) = sql::select_rows(table, condition)?;

        let mut q = sqlx::query_scalar::<_, String>(&query);
        for bind in binds {
            q = match bind {
                Bind::Tenant(t) => q.bind(t),
                Bind::Text(s) => q.bind(s),
            };
        }
        let raw = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx(&table.name, e))?;

        raw.into_iter()
            .map(|text| match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => Ok(decode_row(table, map)),
                Ok(other) => Err(StoreError::Backend(format!(
                    "row_to_json returned {other} for '{}'",
                    table.name
                ))),
                Err(e) => Err(StoreError::Backend(e.to_string())),
            })
            .collect()
    }

    async fn begin_table(&self, table: &TableInfo) -> Result<Box<dyn TableWriter>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx(&table.name, e))?;
        Ok(Box::new(PgTableWriter {
            table: table.clone(),
            tx,
        }))
    }
}

/// One table's restore, inside a single transaction.
struct PgTableWriter {
    table: TableInfo,
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TableWriter for PgTableWriter {
    async fn allocate_id(&mut self) -> Result<i64, StoreError> {
        let Some(id_column) = self.table.id_column.clone() else {
            return Err(StoreError::NoKeyColumn {
                table: self.table.name.clone(),
            });
        };
        let quoted = sql::quote(&self.table.name)?;

        let next: Option<i64> = sqlx::query_scalar(sql::NEXT_ID)
            .bind(quoted)
            .bind(id_column)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx(&self.table.name, e))?;

        next.ok_or_else(|| StoreError::NoKeyColumn {
            table: self.table.name.clone(),
        })
    }

    async fn insert(
        &mut self,
        row: &DataRowInfo,
        mode: InsertMode,
    ) -> Result<InsertOutcome, StoreError> {
        let query = sql::insert_row(&self.table, row, mode)?;
        let result = sqlx::query(&query)
            .bind(encode_row(row))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx(&self.table.name, e))?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let name = this.table.name;
        this.tx.commit().await.map_err(|e| map_sqlx(&name, e))?;
        tracing::debug!(table = %name, "Table transaction committed");
        Ok(())
    }
}
