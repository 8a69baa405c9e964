//! Table schema registry and relation graph.
//!
//! Modules declare their tables, relations and hooks through
//! [`ModuleSpecifics`]. [`SchemaRegistryBuilder::build`] validates the whole
//! declaration once and computes the table processing order, so dump and
//! restore never discover schema mistakes half-way through a tenant.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use crate::error::SchemaError;
use crate::helpers::SchemaHelpers;
use crate::hooks::{HookSet, SelectCondition, TableHooks};
use crate::relation::RelationInfo;
use crate::row::DataRowInfo;
use crate::schema::{TableColumn, TableInfo};
use crate::types::TenantId;

static NO_HOOKS: LazyLock<HookSet> = LazyLock::new(HookSet::default);

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

/// Dump/restore declaration of one product module.
pub trait ModuleSpecifics: Send + Sync {
    /// Stable module name, e.g. `"crm"`.
    fn name(&self) -> &'static str;

    /// Every table the module writes, in declaration order.
    fn tables(&self) -> Vec<TableInfo>;

    /// Relations whose child table belongs to this module, or which this
    /// module owns on another module's table (e.g. ACL entries on CRM
    /// entities).
    fn relations(&self) -> Vec<RelationInfo>;

    /// Special cases, keyed by table name.
    fn hooks(&self) -> Vec<(&'static str, Arc<dyn TableHooks>)> {
        Vec::new()
    }

    /// Tables holding user/group identities referenced by identity columns.
    fn identity_sources(&self) -> Vec<TableColumn> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SchemaRegistryBuilder {
    modules: Vec<Box<dyn ModuleSpecifics>>,
    helpers: Option<SchemaHelpers>,
}

impl SchemaRegistryBuilder {
    pub fn module(mut self, module: impl ModuleSpecifics + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn helpers(mut self, helpers: SchemaHelpers) -> Self {
        self.helpers = Some(helpers);
        self
    }

    /// Validate the declarations and build the registry.
    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut modules = Vec::new();
        let mut tables: Vec<TableInfo> = Vec::new();
        let mut table_index = HashMap::new();
        let mut relations = Vec::new();
        let mut hook_decls = Vec::new();
        let mut identity_sources = Vec::new();

        for module in &self.modules {
            let name = module.name();
            modules.push(name.to_string());

            for mut table in module.tables() {
                table.validate()?;
                if table_index.contains_key(&table.name) {
                    return Err(SchemaError::DuplicateTable(table.name));
                }
                table.module = name.to_string();
                table_index.insert(table.name.clone(), tables.len());
                tables.push(table);
            }
            for mut relation in module.relations() {
                relation.module = name.to_string();
                relations.push(relation);
            }
            hook_decls.extend(module.hooks());
            identity_sources.extend(module.identity_sources());
        }

        let mut hooks: HashMap<String, HookSet> = HashMap::new();
        for (table, hook) in hook_decls {
            if !table_index.contains_key(table) {
                return Err(SchemaError::UnknownHookTable(table.to_string()));
            }
            hooks.entry(table.to_string()).or_default().push(hook);
        }

        validate_relations(&relations, &table_index)?;

        for source in &identity_sources {
            if !table_index.contains_key(&source.table) {
                return Err(SchemaError::UndeclaredTable {
                    child: "<identity>".into(),
                    column: source.column.clone(),
                    table: source.table.clone(),
                });
            }
        }

        for table in &tables {
            let set = hooks.get(&table.name).unwrap_or(&NO_HOOKS);
            if set.select_condition(table, 0).is_none() {
                return Err(SchemaError::UnscopedTable(table.name.clone()));
            }
        }

        let order = topological_order(&tables, &table_index, &relations, &identity_sources)?;

        let mut relations_by_child: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, r) in relations.iter().enumerate() {
            relations_by_child
                .entry(r.child.table.clone())
                .or_default()
                .push(i);
        }

        Ok(SchemaRegistry {
            modules,
            tables,
            table_index,
            relations,
            relations_by_child,
            hooks,
            identity_sources,
            helpers: self.helpers.unwrap_or_default(),
            order,
        })
    }
}

/// Every relation endpoint must be declared, and a child column may carry at
/// most one unconditional primary relation, and then no other.
fn validate_relations(
    relations: &[RelationInfo],
    table_index: &HashMap<String, usize>,
) -> Result<(), SchemaError> {
    let mut per_column: HashMap<(&str, &str), (usize, usize)> = HashMap::new();

    for r in relations {
        let mut referenced = vec![&r.parent.table, &r.child.table];
        if let crate::relation::ValueShape::Segmented { anchor, .. } = &r.shape {
            referenced.push(&anchor.table);
        }
        for table in referenced {
            if !table_index.contains_key(table) {
                return Err(SchemaError::UndeclaredTable {
                    child: r.child.table.clone(),
                    column: r.child.column.clone(),
                    table: table.clone(),
                });
            }
        }

        if r.is_anchor() {
            continue;
        }
        let entry = per_column
            .entry((r.child.table.as_str(), r.child.column.as_str()))
            .or_default();
        entry.0 += 1;
        if !r.is_conditional() {
            entry.1 += 1;
        }
    }

    for ((table, column), (total, unconditional)) in per_column {
        if unconditional > 0 && total > 1 {
            return Err(SchemaError::UnconditionalOverlap {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Kahn's algorithm over parent -> child edges, ties broken by declaration
/// order. Self references are ignored; identity sources precede every table
/// with identity columns.
fn topological_order(
    tables: &[TableInfo],
    table_index: &HashMap<String, usize>,
    relations: &[RelationInfo],
    identity_sources: &[TableColumn],
) -> Result<Vec<usize>, SchemaError> {
    let mut edges: HashSet<(usize, usize)> = HashSet::new();

    for r in relations {
        let parent = table_index[&r.parent.table];
        let child = table_index[&r.child.table];
        if parent != child {
            edges.insert((parent, child));
        }
    }
    for source in identity_sources {
        let parent = table_index[&source.table];
        for (child, table) in tables.iter().enumerate() {
            if child != parent && !table.user_columns.is_empty() {
                edges.insert((parent, child));
            }
        }
    }

    let mut in_degree = vec![0usize; tables.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];
    for &(parent, child) in &edges {
        in_degree[child] += 1;
        children[parent].push(child);
    }

    let mut ready: BTreeSet<usize> = (0..tables.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(tables.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &child in &children[next] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if order.len() != tables.len() {
        let cycle = (0..tables.len())
            .filter(|i| in_degree[*i] > 0)
            .map(|i| tables[i].name.clone())
            .collect();
        return Err(SchemaError::Cycle(cycle));
    }
    Ok(order)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Validated, immutable schema of every registered module.
pub struct SchemaRegistry {
    modules: Vec<String>,
    tables: Vec<TableInfo>,
    table_index: HashMap<String, usize>,
    relations: Vec<RelationInfo>,
    relations_by_child: HashMap<String, Vec<usize>>,
    hooks: HashMap<String, HookSet>,
    identity_sources: Vec<TableColumn>,
    helpers: SchemaHelpers,
    order: Vec<usize>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }

    /// Tables of `module` in declaration order.
    pub fn tables(&self, module: &str) -> Result<Vec<&TableInfo>, SchemaError> {
        if !self.has_module(module) {
            return Err(SchemaError::UnknownModule(module.to_string()));
        }
        Ok(self.tables.iter().filter(|t| t.module == module).collect())
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.table_index.get(name).map(|&i| &self.tables[i])
    }

    /// Relations whose child is `table`.
    pub fn relations(&self, table: &str) -> impl Iterator<Item = &RelationInfo> {
        self.relations_by_child
            .get(table)
            .into_iter()
            .flatten()
            .map(|&i| &self.relations[i])
    }

    /// Relations constraining `table.column`, applicable or not.
    pub fn relations_for(&self, table: &str, column: &str) -> Vec<&RelationInfo> {
        self.relations(table)
            .filter(|r| r.child.column == column)
            .collect()
    }

    /// Relations constraining `table.column` that apply to `row`.
    ///
    /// Fails when more than one primary (non-anchor) relation matches: the
    /// predicates of that column are not mutually exclusive.
    pub fn applicable(
        &self,
        table: &str,
        column: &str,
        row: &DataRowInfo,
    ) -> Result<Vec<&RelationInfo>, SchemaError> {
        let matched: Vec<&RelationInfo> = self
            .relations(table)
            .filter(|r| r.child.column == column && r.applies_to(row, &self.helpers))
            .collect();

        let primary = matched.iter().filter(|r| !r.is_anchor()).count();
        if primary > 1 {
            return Err(SchemaError::AmbiguousRelation {
                table: table.to_string(),
                column: column.to_string(),
                matched: primary,
            });
        }
        Ok(matched)
    }

    pub fn hooks(&self, table: &str) -> &HookSet {
        self.hooks.get(table).unwrap_or(&NO_HOOKS)
    }

    pub fn select_condition(
        &self,
        table: &TableInfo,
        tenant: TenantId,
    ) -> Result<SelectCondition, SchemaError> {
        self.hooks(&table.name)
            .select_condition(table, tenant)
            .ok_or_else(|| SchemaError::UnscopedTable(table.name.clone()))
    }

    pub fn identity_sources(&self) -> &[TableColumn] {
        &self.identity_sources
    }

    pub fn helpers(&self) -> &SchemaHelpers {
        &self.helpers
    }

    /// Tables of `modules` in processing order: parents before children.
    pub fn processing_order(&self, modules: &[String]) -> Result<Vec<&TableInfo>, SchemaError> {
        for m in modules {
            if !self.has_module(m) {
                return Err(SchemaError::UnknownModule(m.clone()));
            }
        }
        Ok(self
            .order
            .iter()
            .map(|&i| &self.tables[i])
            .filter(|t| modules.iter().any(|m| *m == t.module))
            .collect())
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("modules", &self.modules)
            .field("tables", &self.tables.len())
            .field("relations", &self.relations.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::schema::IdType;

    struct Fixture {
        tables: Vec<TableInfo>,
        relations: Vec<RelationInfo>,
    }

    impl ModuleSpecifics for Fixture {
        fn name(&self) -> &'static str {
            "fixture"
        }
        fn tables(&self) -> Vec<TableInfo> {
            self.tables.clone()
        }
        fn relations(&self) -> Vec<RelationInfo> {
            self.relations.clone()
        }
    }

    fn table(name: &str) -> TableInfo {
        TableInfo::new(name)
            .tenant_column("tenant_id")
            .id("id", IdType::Integer)
    }

    fn is_even(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
        row.get("kind").and_then(|v| v.as_int()).is_some_and(|k| k % 2 == 0)
    }

    fn is_odd(row: &DataRowInfo, h: &SchemaHelpers) -> bool {
        !is_even(row, h)
    }

    fn always(_: &DataRowInfo, _: &SchemaHelpers) -> bool {
        true
    }

    fn build(tables: Vec<TableInfo>, relations: Vec<RelationInfo>) -> Result<SchemaRegistry, SchemaError> {
        SchemaRegistry::builder()
            .module(Fixture { tables, relations })
            .build()
    }

    #[test]
    fn parents_are_ordered_before_children() {
        let registry = build(
            vec![table("child"), table("grandchild"), table("parent")],
            vec![
                RelationInfo::new("parent", "id", "child", "parent_id"),
                RelationInfo::new("child", "id", "grandchild", "child_id"),
            ],
        )
        .unwrap();
        let order: Vec<_> = registry
            .processing_order(&["fixture".into()])
            .unwrap()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(order, ["parent", "child", "grandchild"]);
    }

    #[test]
    fn independent_tables_keep_declaration_order() {
        let registry = build(vec![table("b"), table("a"), table("c")], vec![]).unwrap();
        let order: Vec<_> = registry
            .processing_order(&["fixture".into()])
            .unwrap()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(order, ["b", "a", "c"]);
    }

    #[test]
    fn self_reference_is_not_a_cycle() {
        let registry = build(
            vec![table("folder")],
            vec![RelationInfo::new("folder", "id", "folder", "parent_id")],
        );
        assert!(registry.is_ok());
    }

    #[test]
    fn cycle_is_rejected() {
        let err = build(
            vec![table("a"), table("b")],
            vec![
                RelationInfo::new("a", "id", "b", "a_id"),
                RelationInfo::new("b", "id", "a", "b_id"),
            ],
        )
        .unwrap_err();
        assert_matches!(err, SchemaError::Cycle(tables) if tables.len() == 2);
    }

    #[test]
    fn duplicate_table_is_rejected() {
        let err = build(vec![table("a"), table("a")], vec![]).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateTable("a".into()));
    }

    #[test]
    fn undeclared_parent_is_rejected() {
        let err = build(
            vec![table("a")],
            vec![RelationInfo::new("missing", "id", "a", "x")],
        )
        .unwrap_err();
        assert_matches!(err, SchemaError::UndeclaredTable { table, .. } if table == "missing");
    }

    #[test]
    fn unconditional_overlap_is_rejected() {
        let err = build(
            vec![table("a"), table("b"), table("c")],
            vec![
                RelationInfo::new("a", "id", "c", "ref"),
                RelationInfo::new("b", "id", "c", "ref").when(is_even),
            ],
        )
        .unwrap_err();
        assert_matches!(err, SchemaError::UnconditionalOverlap { .. });
    }

    #[test]
    fn unscoped_table_is_rejected() {
        let err = build(vec![TableInfo::new("loose")], vec![]).unwrap_err();
        assert_eq!(err, SchemaError::UnscopedTable("loose".into()));
    }

    #[test]
    fn disjoint_predicates_select_one_relation() {
        let registry = build(
            vec![table("a"), table("b"), table("c")],
            vec![
                RelationInfo::new("a", "id", "c", "ref").when(is_even),
                RelationInfo::new("b", "id", "c", "ref").when(is_odd),
            ],
        )
        .unwrap();
        let row = DataRowInfo::new().with("kind", 3).with("ref", 1);
        let rels = registry.applicable("c", "ref", &row).unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].parent.table, "b");
    }

    #[test]
    fn overlapping_predicates_fail_at_runtime() {
        let registry = build(
            vec![table("a"), table("b"), table("c")],
            vec![
                RelationInfo::new("a", "id", "c", "ref").when(is_even),
                RelationInfo::new("b", "id", "c", "ref").when(always),
            ],
        )
        .unwrap();
        let row = DataRowInfo::new().with("kind", 2);
        assert_matches!(
            registry.applicable("c", "ref", &row),
            Err(SchemaError::AmbiguousRelation { matched: 2, .. })
        );
    }

    #[test]
    fn unknown_module_is_rejected() {
        let registry = build(vec![table("a")], vec![]).unwrap();
        assert_eq!(
            registry.processing_order(&["nope".into()]).unwrap_err(),
            SchemaError::UnknownModule("nope".into())
        );
    }

    #[test]
    fn module_name_is_stamped() {
        let registry = build(
            vec![table("a"), table("b")],
            vec![RelationInfo::new("a", "id", "b", "a_id")],
        )
        .unwrap();
        assert_eq!(registry.table("a").unwrap().module, "fixture");
        assert_eq!(registry.relations("b").next().unwrap().module, "fixture");
    }
}
