use serde::{Deserialize, Serialize};

/// Row counters of one restored table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub table: String,
    pub restored: usize,
    /// Rows dropped because a referenced row was not restored.
    pub dropped: usize,
    pub rejected_by_hook: usize,
    pub duplicates_ignored: usize,
}

impl TableStats {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }
}

/// Outcome of a completed restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub tables: Vec<TableStats>,
}

impl RestoreReport {
    pub fn table(&self, name: &str) -> Option<&TableStats> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn total_restored(&self) -> usize {
        self.tables.iter().map(|t| t.restored).sum()
    }

    pub fn total_dropped(&self) -> usize {
        self.tables.iter().map(|t| t.dropped).sum()
    }

    /// Human-readable warnings for tables that lost rows.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        for t in &self.tables {
            if t.dropped > 0 {
                out.push(format!(
                    "{}: {} row(s) dropped for unresolved references",
                    t.table, t.dropped
                ));
            }
            if t.rejected_by_hook > 0 {
                out.push(format!("{}: {} row(s) rejected", t.table, t.rejected_by_hook));
            }
            if t.duplicates_ignored > 0 {
                out.push(format!(
                    "{}: {} duplicate row(s) skipped",
                    t.table, t.duplicates_ignored
                ));
            }
        }
        out
    }
}
