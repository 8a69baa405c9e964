//! In-memory snapshot of one table row.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::ColumnValue;

/// One source row: column values keyed by column name, in column order.
///
/// Used uniformly by dump extraction, relation predicates and restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRowInfo {
    values: IndexMap<String, ColumnValue>,
}

impl DataRowInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful in tests and module fixtures.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Value of `column`, or `None` if the row has no such column.
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.values.get(column)
    }

    /// Text value of `column`, if the column holds text.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(ColumnValue::as_text)
    }

    pub fn set(&mut self, column: impl Into<String>, value: ColumnValue) {
        self.values.insert(column.into(), value);
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, ColumnValue)> for DataRowInfo {
    fn from_iter<I: IntoIterator<Item = (String, ColumnValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_column_order() {
        let row = DataRowInfo::new()
            .with("tenant", 1)
            .with("subject", "abc")
            .with("object", "Company|17");
        let cols: Vec<_> = row.columns().collect();
        assert_eq!(cols, ["tenant", "subject", "object"]);
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut row = DataRowInfo::new().with("id", 1).with("name", "a");
        row.set("id", ColumnValue::Int(9));
        assert_eq!(row.get("id"), Some(&ColumnValue::Int(9)));
        assert_eq!(row.columns().next(), Some("id"));
    }
}
