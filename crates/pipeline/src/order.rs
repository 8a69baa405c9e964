//! Row ordering inside a self-referencing table.

use std::collections::{BTreeSet, HashMap};

use tenvault_core::row::DataRowInfo;

/// Indices of `rows` ordered so every row follows the row its `parent_columns`
/// reference, keeping dump order where there is no constraint.
///
/// Rows caught in a reference cycle keep their dump order at the end; their
/// references cannot resolve and the rows are dropped on restore.
pub fn parents_first(rows: &[DataRowInfo], id_column: &str, parent_columns: &[&str]) -> Vec<usize> {
    if parent_columns.is_empty() {
        return (0..rows.len()).collect();
    }

    let by_key: HashMap<String, usize> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| Some((r.get(id_column)?.key()?, i)))
        .collect();

    let mut in_degree = vec![0usize; rows.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
    for (child, row) in rows.iter().enumerate() {
        for column in parent_columns {
            let Some(parent) = row
                .get(column)
                .filter(|v| !v.is_no_reference())
                .and_then(|v| v.key())
                .and_then(|k| by_key.get(&k).copied())
            else {
                continue;
            };
            if parent != child {
                in_degree[child] += 1;
                children[parent].push(child);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..rows.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(rows.len());
    let mut placed = vec![false; rows.len()];

    while let Some(next) = ready.pop_first() {
        order.push(next);
        placed[next] = true;
        for &child in &children[next] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.insert(child);
            }
        }
    }

    order.extend((0..rows.len()).filter(|&i| !placed[i]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: i64, parent: i64) -> DataRowInfo {
        DataRowInfo::new().with("id", id).with("parent_id", parent)
    }

    #[test]
    fn children_dumped_before_parents_are_reordered() {
        let rows = vec![folder(3, 2), folder(2, 1), folder(1, 0), folder(4, 0)];
        assert_eq!(parents_first(&rows, "id", &["parent_id"]), vec![2, 1, 0, 3]);
    }

    #[test]
    fn unconstrained_rows_keep_dump_order() {
        let rows = vec![folder(1, 0), folder(2, 0), folder(3, 0)];
        assert_eq!(parents_first(&rows, "id", &["parent_id"]), vec![0, 1, 2]);
    }

    #[test]
    fn cycles_go_last() {
        let rows = vec![folder(1, 2), folder(2, 1), folder(3, 0)];
        assert_eq!(parents_first(&rows, "id", &["parent_id"]), vec![2, 0, 1]);
    }

    #[test]
    fn self_parent_is_not_a_dependency() {
        let rows = vec![folder(1, 1)];
        assert_eq!(parents_first(&rows, "id", &["parent_id"]), vec![0]);
    }
}
