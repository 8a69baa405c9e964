#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while building or applying the table schema.
///
/// Every variant is fatal for the operation that raised it: a restore that
/// hits a schema error stops instead of writing a partially transformed
/// tenant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Table '{0}' is declared more than once")]
    DuplicateTable(String),

    #[error("Unknown module '{0}'")]
    UnknownModule(String),

    #[error("Relation {child}.{column} references undeclared table '{table}'")]
    UndeclaredTable {
        child: String,
        column: String,
        table: String,
    },

    #[error("Tables {0:?} form a dependency cycle")]
    Cycle(Vec<String>),

    #[error("Column {table}.{column} has more than one unconditional relation")]
    UnconditionalOverlap { table: String, column: String },

    #[error("Column {table}.{column} matched {matched} relations for one row")]
    AmbiguousRelation {
        table: String,
        column: String,
        matched: usize,
    },

    #[error("Hook for table '{table}' failed: {reason}")]
    HookFailed { table: String, reason: String },

    #[error("Table '{0}' is missing from the dump")]
    MissingTable(String),

    #[error("Hook registered for undeclared table '{0}'")]
    UnknownHookTable(String),

    #[error("Table '{0}' has neither a tenant column nor a scoping hook")]
    UnscopedTable(String),

    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),
}
