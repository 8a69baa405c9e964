//! Documents: folders, files and the folder closure tree.

use std::sync::Arc;

use crate::helpers::SchemaHelpers;
use crate::hooks::{ScopeThroughParent, TableHooks, TouchOnRestore};
use crate::modules::has_prefix;
use crate::registry::ModuleSpecifics;
use crate::relation::RelationInfo;
use crate::row::DataRowInfo;
use crate::schema::{IdType, InsertMode, TableInfo};

pub struct FilesModule;

fn acl_on_folder(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    has_prefix(row, "object", "Folder|")
}

fn acl_on_file(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    has_prefix(row, "object", "File|")
}

impl ModuleSpecifics for FilesModule {
    fn name(&self) -> &'static str {
        "files"
    }

    fn tables(&self) -> Vec<TableInfo> {
        vec![
            TableInfo::new("files_folder")
                .tenant_column("tenant_id")
                .id("id", IdType::Integer)
                .user_columns(["create_by", "modified_by"])
                .utc_date("create_on")
                .utc_date("modified_on"),
            TableInfo::new("files_file")
                .tenant_column("tenant_id")
                .id("id", IdType::Integer)
                .user_columns(["create_by", "modified_by"])
                .utc_date("create_on")
                .utc_date("modified_on"),
            TableInfo::new("files_folder_tree").insert_mode(InsertMode::IgnoreDuplicate),
        ]
    }

    fn relations(&self) -> Vec<RelationInfo> {
        vec![
            RelationInfo::new("files_folder", "id", "files_folder", "parent_id"),
            RelationInfo::new("files_folder", "id", "files_file", "folder_id"),
            RelationInfo::new("files_folder", "id", "files_folder_tree", "folder_id"),
            RelationInfo::new("files_folder", "id", "files_folder_tree", "parent_id"),
            RelationInfo::new("files_folder", "id", "core_acl", "object")
                .qualified('|')
                .when(acl_on_folder),
            RelationInfo::new("files_file", "id", "core_acl", "object")
                .qualified('|')
                .when(acl_on_file),
        ]
    }

    fn hooks(&self) -> Vec<(&'static str, Arc<dyn TableHooks>)> {
        vec![
            (
                "files_folder",
                Arc::new(TouchOnRestore {
                    columns: vec!["modified_on".into()],
                }),
            ),
            (
                "files_folder_tree",
                Arc::new(ScopeThroughParent::new(
                    "folder_id",
                    "files_folder",
                    "id",
                    "tenant_id",
                )),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::default_registry;
    use crate::value::ColumnValue;

    #[test]
    fn folder_modification_time_is_touched() {
        let registry = default_registry(SchemaHelpers::new()).unwrap();
        let folder = registry.table("files_folder").unwrap();
        let out = registry
            .hooks("files_folder")
            .prepare_value(folder, "modified_on", &ColumnValue::Null, registry.helpers())
            .unwrap();
        assert!(matches!(out, Some(ColumnValue::DateTime(_))));
    }

    #[test]
    fn folder_parent_is_a_self_reference() {
        let registry = default_registry(SchemaHelpers::new()).unwrap();
        let rels = registry.relations_for("files_folder", "parent_id");
        assert_eq!(rels.len(), 1);
        assert!(rels[0].is_self_reference());
    }
}
