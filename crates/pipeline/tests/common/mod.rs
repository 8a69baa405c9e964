//! Shared fixtures for executor integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tenvault_core::helpers::{FixedClock, SchemaHelpers};
use tenvault_core::modules::default_registry;
use tenvault_core::{DataRowInfo, SchemaRegistry};
use tenvault_db::MemoryTenantStore;
use tenvault_pipeline::{DumpContainer, DumpExecutor, RestoreExecutor};
use uuid::Uuid;

pub const SOURCE: i32 = 1;
pub const OTHER: i32 = 5;
pub const TARGET: i32 = 2;

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

pub fn restored_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 6, 30, 0).unwrap()
}

pub fn registry() -> Arc<SchemaRegistry> {
    let helpers = SchemaHelpers::new().with_clock(Arc::new(FixedClock(restored_at())));
    Arc::new(default_registry(helpers).unwrap())
}

pub async fn store(registry: &SchemaRegistry) -> Arc<MemoryTenantStore> {
    Arc::new(MemoryTenantStore::for_registry(registry).await)
}

pub fn dumper(registry: &Arc<SchemaRegistry>, store: &Arc<MemoryTenantStore>) -> DumpExecutor {
    DumpExecutor::new(Arc::clone(registry), store.clone())
}

pub fn restorer(registry: &Arc<SchemaRegistry>, store: &Arc<MemoryTenantStore>) -> RestoreExecutor {
    RestoreExecutor::new(Arc::clone(registry), store.clone())
}

pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 5, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn all_modules() -> Vec<String> {
    ["core", "crm", "projects", "files"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// A container holding every table of `modules`, empty unless listed in
/// `rows`.
pub fn container(
    registry: &SchemaRegistry,
    modules: &[&str],
    rows: Vec<(&str, Vec<DataRowInfo>)>,
) -> DumpContainer {
    let modules: Vec<String> = modules.iter().map(|m| m.to_string()).collect();
    let mut c = DumpContainer::new(SOURCE, modules.clone(), restored_at());
    for table in registry.processing_order(&modules).unwrap() {
        let table_rows = rows
            .iter()
            .find(|(name, _)| *name == table.name)
            .map(|(_, r)| r.clone())
            .unwrap_or_default();
        c.push_table(&table.name, &table.module, table_rows);
    }
    c
}

/// Fixed user identity of the source tenant.
pub fn alice() -> Uuid {
    Uuid::parse_str("7d3c1c5e-1111-4a7b-9e1a-0f0b7a5d0001").unwrap()
}

/// A small but complete source tenant, plus one row of another tenant per
/// table that must never leak into its dump.
pub async fn seed_source(store: &MemoryTenantStore) {
    let group = Uuid::parse_str("7d3c1c5e-2222-4a7b-9e1a-0f0b7a5d0002").unwrap();

    store
        .seed(
            "core_user",
            Some("id"),
            [
                DataRowInfo::new()
                    .with("tenant", SOURCE)
                    .with("id", alice())
                    .with("username", "alice")
                    .with("create_on", at(1, 9)),
                DataRowInfo::new()
                    .with("tenant", OTHER)
                    .with("id", Uuid::new_v4())
                    .with("username", "mallory")
                    .with("create_on", at(1, 9)),
            ],
        )
        .await
        .unwrap();
    store
        .seed(
            "core_group",
            Some("id"),
            [DataRowInfo::new()
                .with("tenant", SOURCE)
                .with("id", group)
                .with("name", "sales")],
        )
        .await
        .unwrap();
    store
        .seed(
            "core_usergroup",
            None,
            [DataRowInfo::new()
                .with("tenant", SOURCE)
                .with("userid", alice())
                .with("groupid", group)],
        )
        .await
        .unwrap();
    store
        .seed(
            "core_settings",
            None,
            [
                DataRowInfo::new()
                    .with("tenantid", SOURCE)
                    .with("id", "Theme")
                    .with("value", "dark"),
                DataRowInfo::new()
                    .with("tenantid", SOURCE)
                    .with("id", "LicenseKey")
                    .with("value", "secret"),
            ],
        )
        .await
        .unwrap();

    store
        .seed(
            "crm_contact",
            Some("id"),
            [
                DataRowInfo::new()
                    .with("id", 10)
                    .with("tenant_id", SOURCE)
                    .with("company_id", 0)
                    .with("display_name", "Acme")
                    .with("create_by", alice())
                    .with("create_on", at(2, 8)),
                DataRowInfo::new()
                    .with("id", 11)
                    .with("tenant_id", SOURCE)
                    .with("company_id", 10)
                    .with("display_name", "Wile E.")
                    .with("create_by", alice())
                    .with("create_on", at(2, 9)),
                DataRowInfo::new()
                    .with("id", 12)
                    .with("tenant_id", OTHER)
                    .with("company_id", 0)
                    .with("display_name", "Elsewhere Inc")
                    .with("create_by", Uuid::new_v4())
                    .with("create_on", at(2, 9)),
            ],
        )
        .await
        .unwrap();
    store
        .seed(
            "crm_deal",
            Some("id"),
            [DataRowInfo::new()
                .with("id", 20)
                .with("tenant_id", SOURCE)
                .with("contact_id", 11)
                .with("responsible_id", alice())
                .with("create_by", alice())
                .with("title", "Rockets")],
        )
        .await
        .unwrap();
    store
        .seed(
            "crm_task",
            Some("id"),
            [
                DataRowInfo::new()
                    .with("id", 30)
                    .with("tenant_id", SOURCE)
                    .with("contact_id", 0)
                    .with("entity_type", "opportunity")
                    .with("entity_id", 20)
                    .with("responsible_id", alice())
                    .with("create_by", alice())
                    .with("deadline", at(9, 17)),
                DataRowInfo::new()
                    .with("id", 31)
                    .with("tenant_id", SOURCE)
                    .with("contact_id", 10)
                    .with("entity_type", "contact")
                    .with("entity_id", 10)
                    .with("responsible_id", alice())
                    .with("create_by", alice())
                    .with("deadline", at(10, 17)),
            ],
        )
        .await
        .unwrap();

    store
        .seed(
            "projects_projects",
            Some("id"),
            [DataRowInfo::new()
                .with("id", 9)
                .with("tenant_id", SOURCE)
                .with("title", "Launch")
                .with("responsible_id", alice())
                .with("create_by", alice())],
        )
        .await
        .unwrap();
    store
        .seed(
            "projects_tasks",
            Some("id"),
            [DataRowInfo::new()
                .with("id", 3)
                .with("tenant_id", SOURCE)
                .with("project_id", 9)
                .with("title", "Fuel")
                .with("create_by", alice())],
        )
        .await
        .unwrap();
    store
        .seed(
            "projects_subtasks",
            Some("id"),
            [DataRowInfo::new()
                .with("id", 4)
                .with("task_id", 3)
                .with("title", "Buy fuel")
                .with("responsible_id", alice())],
        )
        .await
        .unwrap();
    store
        .seed(
            "projects_project_participant",
            None,
            [DataRowInfo::new()
                .with("tenant", SOURCE)
                .with("project_id", 9)
                .with("participant_id", alice())],
        )
        .await
        .unwrap();

    store
        .seed(
            "files_folder",
            Some("id"),
            [
                DataRowInfo::new()
                    .with("id", 101)
                    .with("tenant_id", SOURCE)
                    .with("parent_id", 100)
                    .with("title", "Invoices")
                    .with("create_by", alice())
                    .with("modified_by", alice())
                    .with("modified_on", at(3, 12)),
                DataRowInfo::new()
                    .with("id", 100)
                    .with("tenant_id", SOURCE)
                    .with("parent_id", 0)
                    .with("title", "Root")
                    .with("create_by", alice())
                    .with("modified_by", alice())
                    .with("modified_on", at(3, 12)),
            ],
        )
        .await
        .unwrap();
    store
        .seed(
            "files_file",
            Some("id"),
            [DataRowInfo::new()
                .with("id", 500)
                .with("tenant_id", SOURCE)
                .with("folder_id", 101)
                .with("title", "march.pdf")
                .with("create_by", alice())
                .with("modified_by", alice())],
        )
        .await
        .unwrap();
    store
        .seed(
            "files_folder_tree",
            None,
            [
                DataRowInfo::new()
                    .with("folder_id", 101)
                    .with("parent_id", 100)
                    .with("level", 1),
                DataRowInfo::new()
                    .with("folder_id", 100)
                    .with("parent_id", 100)
                    .with("level", 0),
            ],
        )
        .await
        .unwrap();

    store
        .seed(
            "core_acl",
            None,
            [
                DataRowInfo::new()
                    .with("tenant", SOURCE)
                    .with("subject", alice())
                    .with("object", "Company|10"),
                DataRowInfo::new()
                    .with("tenant", SOURCE)
                    .with("subject", alice())
                    .with("object", "Folder|101"),
            ],
        )
        .await
        .unwrap();
    store
        .seed(
            "core_subscription",
            None,
            [
                DataRowInfo::new()
                    .with("tenant", SOURCE)
                    .with("recipient", alice())
                    .with("object", "Task_3_9"),
                DataRowInfo::new()
                    .with("tenant", SOURCE)
                    .with("recipient", alice())
                    .with("object", "Project_9"),
            ],
        )
        .await
        .unwrap();
}
