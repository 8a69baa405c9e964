//! Foreign-key-like links between tables.

use std::fmt;

use crate::helpers::SchemaHelpers;
use crate::row::DataRowInfo;
use crate::schema::TableColumn;

/// Applicability rule of a relation, evaluated against the child row.
///
/// A plain function rather than a closure: every rule receives all of its
/// context explicitly and can be tested in isolation.
pub type RowPredicate = fn(&DataRowInfo, &SchemaHelpers) -> bool;

/// How the child column encodes the referenced key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueShape {
    /// The column holds the parent key verbatim.
    Direct,
    /// `<kind><sep><id>`. The kind is kept, the id is remapped.
    Qualified { separator: char },
    /// `<prefix><sep><id>[<sep><anchorId>]`.
    ///
    /// The id resolves against the first applicable relation whose parent
    /// table is not the anchor table; the optional trailing id resolves
    /// against `anchor`.
    Segmented { separator: char, anchor: TableColumn },
}

/// A declared link `child.column -> parent.column`.
#[derive(Clone)]
pub struct RelationInfo {
    pub parent: TableColumn,
    pub child: TableColumn,
    /// Owning module; stamped by the registry when the module is added.
    pub module: String,
    pub predicate: Option<RowPredicate>,
    pub shape: ValueShape,
}

impl RelationInfo {
    pub fn new(
        parent_table: impl Into<String>,
        parent_column: impl Into<String>,
        child_table: impl Into<String>,
        child_column: impl Into<String>,
    ) -> Self {
        Self {
            parent: TableColumn::new(parent_table, parent_column),
            child: TableColumn::new(child_table, child_column),
            module: String::new(),
            predicate: None,
            shape: ValueShape::Direct,
        }
    }

    /// Restrict the relation to rows matching `predicate`.
    pub fn when(mut self, predicate: RowPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn qualified(mut self, separator: char) -> Self {
        self.shape = ValueShape::Qualified { separator };
        self
    }

    pub fn segmented(
        mut self,
        separator: char,
        anchor_table: impl Into<String>,
        anchor_column: impl Into<String>,
    ) -> Self {
        self.shape = ValueShape::Segmented {
            separator,
            anchor: TableColumn::new(anchor_table, anchor_column),
        };
        self
    }

    pub fn applies_to(&self, row: &DataRowInfo, helpers: &SchemaHelpers) -> bool {
        self.predicate.is_none_or(|p| p(row, helpers))
    }

    pub fn is_conditional(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn is_self_reference(&self) -> bool {
        self.parent.table == self.child.table
    }

    /// `true` for the anchor half of a segmented value: the relation that
    /// resolves the trailing id rather than the entity id.
    pub fn is_anchor(&self) -> bool {
        match &self.shape {
            ValueShape::Segmented { anchor, .. } => *anchor == self.parent,
            _ => false,
        }
    }
}

impl fmt::Debug for RelationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationInfo")
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("module", &self.module)
            .field("conditional", &self.predicate.is_some())
            .field("shape", &self.shape)
            .finish()
    }
}
