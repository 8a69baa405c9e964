//! Projects: projects, tasks, subtasks and participants.
//!
//! Subscriptions on project entities are stored as `"Task_<task>_<project>"`
//! and `"Project_<project>"`; both decompose against `projects_projects` as
//! the anchor.

use std::sync::Arc;

use crate::helpers::SchemaHelpers;
use crate::hooks::{ScopeThroughParent, TableHooks};
use crate::modules::has_prefix;
use crate::registry::ModuleSpecifics;
use crate::relation::RelationInfo;
use crate::row::DataRowInfo;
use crate::schema::{IdType, InsertMode, TableInfo};

pub struct ProjectsModule;

fn subscription_on_task(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    has_prefix(row, "object", "Task_")
}

fn subscription_on_project(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    has_prefix(row, "object", "Project_")
}

fn acl_on_project(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    has_prefix(row, "object", "Project|")
}

fn acl_on_task(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    has_prefix(row, "object", "Task|")
}

impl ModuleSpecifics for ProjectsModule {
    fn name(&self) -> &'static str {
        "projects"
    }

    fn tables(&self) -> Vec<TableInfo> {
        vec![
            TableInfo::new("projects_projects")
                .tenant_column("tenant_id")
                .id("id", IdType::Integer)
                .user_columns(["responsible_id", "create_by"])
                .utc_date("create_on"),
            TableInfo::new("projects_tasks")
                .tenant_column("tenant_id")
                .id("id", IdType::Integer)
                .user_columns(["create_by"])
                .local_date("deadline")
                .utc_date("create_on"),
            TableInfo::new("projects_subtasks")
                .id("id", IdType::Integer)
                .user_columns(["responsible_id"])
                .utc_date("create_on"),
            TableInfo::new("projects_project_participant")
                .tenant_column("tenant")
                .insert_mode(InsertMode::IgnoreDuplicate)
                .user_columns(["participant_id"]),
        ]
    }

    fn relations(&self) -> Vec<RelationInfo> {
        vec![
            RelationInfo::new("projects_projects", "id", "projects_tasks", "project_id"),
            RelationInfo::new("projects_tasks", "id", "projects_subtasks", "task_id"),
            RelationInfo::new(
                "projects_projects",
                "id",
                "projects_project_participant",
                "project_id",
            ),
            RelationInfo::new("projects_tasks", "id", "core_subscription", "object")
                .segmented('_', "projects_projects", "id")
                .when(subscription_on_task),
            RelationInfo::new("projects_projects", "id", "core_subscription", "object")
                .segmented('_', "projects_projects", "id")
                .when(subscription_on_task),
            RelationInfo::new("projects_projects", "id", "core_subscription", "object")
                .segmented('_', "projects_projects", "id")
                .when(subscription_on_project),
            RelationInfo::new("projects_projects", "id", "core_acl", "object")
                .qualified('|')
                .when(acl_on_project),
            RelationInfo::new("projects_tasks", "id", "core_acl", "object")
                .qualified('|')
                .when(acl_on_task),
        ]
    }

    fn hooks(&self) -> Vec<(&'static str, Arc<dyn TableHooks>)> {
        vec![(
            "projects_subtasks",
            Arc::new(ScopeThroughParent::new(
                "task_id",
                "projects_tasks",
                "id",
                "tenant_id",
            )),
        )]
    }
}
