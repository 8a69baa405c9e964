//! Per-table dump/restore declarations.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid regex"));

/// Validate a table or column name before it is interpolated into SQL.
pub fn validate_identifier(name: &str) -> Result<(), SchemaError> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Type of a table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdType {
    /// Auto-increment integer; new keys come from the table's sequence.
    Integer,
    /// GUID; new keys are random v4 UUIDs.
    Guid,
}

/// Whether restore generates a new key or keeps the dumped one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    #[default]
    Generate,
    /// Keep the dumped key. Used for portal-wide GUID identities (users,
    /// groups) whose ids are referenced outside the tenant's own tables.
    Preserve,
}

/// How restore writes a table's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Plain insert; a unique-constraint violation is fatal.
    #[default]
    Insert,
    /// Insert, silently skipping rows that violate a unique constraint.
    IgnoreDuplicate,
    /// Dumped for reference resolution only, never reinserted.
    None,
}

// ---------------------------------------------------------------------------
// Column references
// ---------------------------------------------------------------------------

/// A `(table, column)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableColumn {
    pub table: String,
    pub column: String,
}

impl TableColumn {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for TableColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A date/time column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateColumn {
    pub name: String,
    /// Stored in the tenant's local time rather than UTC; converted to UTC in
    /// the dump and back to the target tenant's local time on restore.
    pub tenant_relative: bool,
}

// ---------------------------------------------------------------------------
// TableInfo
// ---------------------------------------------------------------------------

/// Dump/restore declaration of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    /// Owning module; stamped by the registry when the module is added.
    pub module: String,
    /// Tenant-scoping column. Tables without one are scoped by a
    /// select-condition hook that joins through a parent table.
    pub tenant_column: Option<String>,
    pub id_column: Option<String>,
    pub id_type: IdType,
    pub key_policy: KeyPolicy,
    pub insert_mode: InsertMode,
    /// Columns referencing a user or group identity.
    pub user_columns: Vec<String>,
    pub date_columns: Vec<DateColumn>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: String::new(),
            tenant_column: None,
            id_column: None,
            id_type: IdType::Integer,
            key_policy: KeyPolicy::Generate,
            insert_mode: InsertMode::Insert,
            user_columns: Vec::new(),
            date_columns: Vec::new(),
        }
    }

    pub fn tenant_column(mut self, column: impl Into<String>) -> Self {
        self.tenant_column = Some(column.into());
        self
    }

    pub fn id(mut self, column: impl Into<String>, id_type: IdType) -> Self {
        self.id_column = Some(column.into());
        self.id_type = id_type;
        self
    }

    pub fn preserve_keys(mut self) -> Self {
        self.key_policy = KeyPolicy::Preserve;
        self
    }

    pub fn insert_mode(mut self, mode: InsertMode) -> Self {
        self.insert_mode = mode;
        self
    }

    pub fn user_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Declare a date column stored in UTC.
    pub fn utc_date(mut self, column: impl Into<String>) -> Self {
        self.date_columns.push(DateColumn {
            name: column.into(),
            tenant_relative: false,
        });
        self
    }

    /// Declare a date column stored in tenant-local time.
    pub fn local_date(mut self, column: impl Into<String>) -> Self {
        self.date_columns.push(DateColumn {
            name: column.into(),
            tenant_relative: true,
        });
        self
    }

    pub fn is_user_column(&self, column: &str) -> bool {
        self.user_columns.iter().any(|c| c == column)
    }

    pub fn date_column(&self, column: &str) -> Option<&DateColumn> {
        self.date_columns.iter().find(|d| d.name == column)
    }

    pub fn is_tenant_column(&self, column: &str) -> bool {
        self.tenant_column.as_deref() == Some(column)
    }

    pub fn is_id_column(&self, column: &str) -> bool {
        self.id_column.as_deref() == Some(column)
    }

    /// `false` for dump-only tables.
    pub fn is_restorable(&self) -> bool {
        self.insert_mode != InsertMode::None
    }

    /// Validate every identifier this declaration puts into SQL.
    pub fn validate(&self) -> Result<(), SchemaError> {
        validate_identifier(&self.name)?;
        let columns = self
            .tenant_column
            .iter()
            .chain(self.id_column.iter())
            .chain(self.user_columns.iter())
            .chain(self.date_columns.iter().map(|d| &d.name));
        for column in columns {
            validate_identifier(column)?;
        }
        Ok(())
    }
}
