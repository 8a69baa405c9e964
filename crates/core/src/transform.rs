//! Relation-aware remapping of column values during restore.
//!
//! Composite formats and the relation each embedded id resolves against:
//!
//! - `Qualified` (`"Company|17"`): the kind is kept verbatim, the id resolves
//!   against the single applicable relation.
//! - `Segmented` (`"Task_3_9"`): the entity id (`3`) resolves against the
//!   first applicable relation whose parent table is not the anchor table,
//!   the trailing id (`9`) against the anchor column. A two-part value whose
//!   only applicable relation is the anchor itself (`"Project_9"`) resolves
//!   its id against the anchor.
//!
//! A composite value is remapped completely or not at all: one unresolved
//! segment drops the row.

use crate::error::SchemaError;
use crate::mapper::ColumnMapper;
use crate::registry::SchemaRegistry;
use crate::relation::{RelationInfo, ValueShape};
use crate::row::DataRowInfo;
use crate::schema::{TableColumn, TableInfo};
use crate::value::ColumnValue;

/// Outcome of transforming one column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    /// Not a reference for this row, or a sentinel: copy the value as is.
    Keep,
    /// Remapped value.
    Value(ColumnValue),
    /// The referenced entity was not restored; drop the row.
    Drop(String),
}

/// Applies the registry's relations to column values using one restore
/// session's mapper.
pub struct ColumnTransformer<'a> {
    registry: &'a SchemaRegistry,
    mapper: &'a ColumnMapper,
}

impl<'a> ColumnTransformer<'a> {
    pub fn new(registry: &'a SchemaRegistry, mapper: &'a ColumnMapper) -> Self {
        Self { registry, mapper }
    }

    /// Transform `table.column = value` of `row`.
    pub fn transform(
        &self,
        table: &TableInfo,
        column: &str,
        value: &ColumnValue,
        row: &DataRowInfo,
    ) -> Result<Transformed, SchemaError> {
        if value.is_no_reference() {
            return Ok(Transformed::Keep);
        }

        if table.is_user_column(column) {
            return Ok(self.resolve_identity(value));
        }

        let candidates = self.registry.applicable(&table.name, column, row)?;
        if candidates.is_empty() {
            return Ok(Transformed::Keep);
        }

        let primary = primary_relation(&candidates);
        let outcome = match &primary.shape {
            ValueShape::Direct => self.resolve_direct(&primary.parent, value),
            ValueShape::Qualified { separator } => {
                self.resolve_qualified(&primary.parent, *separator, value)
            }
            ValueShape::Segmented { separator, anchor } => {
                self.resolve_segmented(&primary.parent, *separator, anchor, value)
            }
        };
        Ok(outcome)
    }

    /// Identity columns resolve against the registry's identity sources in
    /// declaration order; sentinels are never looked up. Sources that are not
    /// part of this restore are skipped, and with none left the identity is
    /// portal-wide and kept.
    fn resolve_identity(&self, value: &ColumnValue) -> Transformed {
        if self.registry.helpers().is_sentinel_identity(value) {
            return Transformed::Keep;
        }
        let sources: Vec<&TableColumn> = self
            .registry
            .identity_sources()
            .iter()
            .filter(|s| self.mapper.is_restored(&s.table))
            .collect();
        if sources.is_empty() {
            return Transformed::Keep;
        }
        for source in sources {
            if let Some(new) = self.mapper.lookup(&source.table, &source.column, value) {
                return Transformed::Value(value.coerce_like(new));
            }
        }
        Transformed::Drop(format!("identity {value} was not restored"))
    }

    fn resolve_direct(&self, parent: &TableColumn, value: &ColumnValue) -> Transformed {
        match self.mapper.lookup(&parent.table, &parent.column, value) {
            Some(new) => Transformed::Value(value.coerce_like(new)),
            None => Transformed::Drop(format!("{parent} has no row {value}")),
        }
    }

    fn resolve_qualified(
        &self,
        parent: &TableColumn,
        separator: char,
        value: &ColumnValue,
    ) -> Transformed {
        let Some((kind, id)) = value.as_text().and_then(|s| s.split_once(separator)) else {
            return Transformed::Drop(format!("malformed qualified value {value}"));
        };
        match self.lookup_segment(parent, id) {
            Some(new_id) => Transformed::Value(ColumnValue::Text(format!("{kind}{separator}{new_id}"))),
            None => Transformed::Drop(format!("{parent} has no row {id}")),
        }
    }

    fn resolve_segmented(
        &self,
        parent: &TableColumn,
        separator: char,
        anchor: &TableColumn,
        value: &ColumnValue,
    ) -> Transformed {
        let Some(text) = value.as_text() else {
            return Transformed::Drop(format!("malformed segmented value {value}"));
        };
        let parts: Vec<&str> = text.split(separator).collect();
        let (prefix, id, anchor_id) = match parts.as_slice() {
            [prefix, id] => (*prefix, *id, None),
            [prefix, id, anchor_id] => (*prefix, *id, Some(*anchor_id)),
            _ => return Transformed::Drop(format!("malformed segmented value {value}")),
        };

        let Some(new_id) = self.lookup_segment(parent, id) else {
            return Transformed::Drop(format!("{parent} has no row {id}"));
        };
        let mut out = format!("{prefix}{separator}{new_id}");

        if let Some(anchor_id) = anchor_id {
            let Some(new_anchor) = self.lookup_segment(anchor, anchor_id) else {
                return Transformed::Drop(format!("{anchor} has no row {anchor_id}"));
            };
            out.push(separator);
            out.push_str(&new_anchor);
        }
        Transformed::Value(ColumnValue::Text(out))
    }

    /// Resolve one embedded id, returning the new id in key form.
    fn lookup_segment(&self, parent: &TableColumn, id: &str) -> Option<String> {
        let key = ColumnValue::Text(id.trim().to_string()).key()?;
        self.mapper
            .lookup_key(&parent.table, &parent.column, &key)
            .and_then(ColumnValue::key)
    }
}

/// The relation the value's main id resolves against: the first candidate
/// that is not the anchor half of a segmented value, or the anchor itself
/// when nothing else applies.
fn primary_relation<'r>(candidates: &[&'r RelationInfo]) -> &'r RelationInfo {
    candidates
        .iter()
        .find(|r| !r.is_anchor())
        .copied()
        .unwrap_or(candidates[0])
}
