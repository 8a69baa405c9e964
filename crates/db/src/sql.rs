//! SQL text for generic, declaration-driven table access.
//!
//! Identifiers come from validated [`TableInfo`] declarations and are
//! quoted; every value is bound as a parameter.

use tenvault_core::hooks::{SelectCondition, TenantScope};
use tenvault_core::row::DataRowInfo;
use tenvault_core::schema::{validate_identifier, InsertMode, TableInfo};
use tenvault_core::types::TenantId;
use tenvault_core::SchemaError;

/// A parameter of a generated statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bind {
    Tenant(TenantId),
    Text(String),
}

/// Quote a validated identifier.
pub fn quote(name: &str) -> Result<String, SchemaError> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// `SELECT row_to_json(t)::text FROM "table" t WHERE ...`.
///
/// Exclusions compare the column's text form with the filter value's key
/// form.
pub fn select_rows(
    table: &TableInfo,
    condition: &SelectCondition,
) -> Result<(String, Vec<Bind>), SchemaError> {
    let mut binds = Vec::new();
    let mut sql = format!("SELECT row_to_json(t)::text FROM {} t WHERE ", quote(&table.name)?);

    match &condition.scope {
        TenantScope::Column { column, tenant } => {
            binds.push(Bind::Tenant(*tenant));
            sql.push_str(&format!("t.{} = $1", quote(column)?));
        }
        TenantScope::Via {
            column,
            parent_table,
            parent_column,
            parent_tenant_column,
            tenant,
        } => {
            binds.push(Bind::Tenant(*tenant));
            sql.push_str(&format!(
                "t.{} IN (SELECT p.{} FROM {} p WHERE p.{} = $1)",
                quote(column)?,
                quote(parent_column)?,
                quote(parent_table)?,
                quote(parent_tenant_column)?,
            ));
        }
    }

    for filter in &condition.exclusions {
        let Some(key) = filter.value.key() else {
            continue;
        };
        binds.push(Bind::Text(key));
        sql.push_str(&format!(
            " AND t.{}::text IS DISTINCT FROM ${}",
            quote(&filter.column)?,
            binds.len()
        ));
    }

    if let Some(id) = &table.id_column {
        sql.push_str(&format!(" ORDER BY t.{}", quote(id)?));
    }
    Ok((sql, binds))
}

/// Insert one JSON-encoded row (`$1`) through `json_populate_record`, so
/// Postgres casts every value to its column type.
pub fn insert_row(
    table: &TableInfo,
    row: &DataRowInfo,
    mode: InsertMode,
) -> Result<String, SchemaError> {
    let columns = row
        .columns()
        .map(quote)
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    let name = quote(&table.name)?;
    let mut sql = format!(
        "INSERT INTO {name} ({columns}) SELECT {columns} FROM json_populate_record(NULL::{name}, $1::json)"
    );
    if mode == InsertMode::IgnoreDuplicate {
        sql.push_str(" ON CONFLICT DO NOTHING");
    }
    Ok(sql)
}

/// Next value of the sequence backing `table.id_column`; `$1` is the quoted
/// table name, `$2` the column name.
pub const NEXT_ID: &str = "SELECT nextval(pg_get_serial_sequence($1, $2))";
