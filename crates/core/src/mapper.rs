//! Session-scoped old-key to new-key mapping built during restore.

use std::collections::{HashMap, HashSet};

use crate::schema::TableColumn;
use crate::value::ColumnValue;

/// `(table, column, old value) -> new value` table.
///
/// Created fresh for every restore and owned by it. Committed entries are
/// never changed or removed. The row being restored stages its own key
/// first, so columns of the same row (self references) resolve against it;
/// the staged entry is committed once the row is inserted and discarded if
/// the row is dropped.
#[derive(Debug, Default)]
pub struct ColumnMapper {
    committed: HashMap<TableColumn, HashMap<String, ColumnValue>>,
    staged: Vec<(TableColumn, String, ColumnValue)>,
    /// Tables this session restores (or has restored).
    restored: HashSet<String>,
}

impl ColumnMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping directly as committed.
    ///
    /// Returns `false` when `old` has no key form (null, binary).
    pub fn insert(&mut self, table: &str, column: &str, old: &ColumnValue, new: ColumnValue) -> bool {
        let Some(key) = old.key() else {
            return false;
        };
        self.committed
            .entry(TableColumn::new(table, column))
            .or_default()
            .entry(key)
            .or_insert(new);
        true
    }

    /// Stage a mapping for the row currently being restored.
    pub fn stage(&mut self, table: &str, column: &str, old: &ColumnValue, new: ColumnValue) -> bool {
        let Some(key) = old.key() else {
            return false;
        };
        self.staged.push((TableColumn::new(table, column), key, new));
        true
    }

    /// Make the staged entries permanent (the row was inserted).
    pub fn commit_staged(&mut self) {
        for (tc, key, new) in self.staged.drain(..) {
            self.committed
                .entry(tc)
                .or_default()
                .entry(key)
                .or_insert(new);
        }
    }

    /// Forget the staged entries (the row was dropped).
    pub fn discard_staged(&mut self) {
        self.staged.clear();
    }

    /// Look up the new value for `old`, or `None` if the referenced row was
    /// not restored.
    pub fn lookup(&self, table: &str, column: &str, old: &ColumnValue) -> Option<&ColumnValue> {
        self.lookup_key(table, column, &old.key()?)
    }

    /// Look up by canonical key form (see [`ColumnValue::key`]).
    pub fn lookup_key(&self, table: &str, column: &str, key: &str) -> Option<&ColumnValue> {
        let staged = self
            .staged
            .iter()
            .find(|(tc, k, _)| tc.table == table && tc.column == column && k == key)
            .map(|(_, _, v)| v);
        staged.or_else(|| {
            self.committed
                .get(&TableColumn::new(table, column))
                .and_then(|m| m.get(key))
        })
    }

    /// Record that `table` is part of this restore, whether or not any of
    /// its rows survive.
    pub fn mark_restored(&mut self, table: &str) {
        self.restored.insert(table.to_string());
    }

    pub fn is_restored(&self, table: &str) -> bool {
        self.restored.contains(table)
    }

    /// Number of committed mappings.
    pub fn len(&self) -> usize {
        self.committed.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
