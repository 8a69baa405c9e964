//! Restore edge cases: rejected rows, unresolved references, duplicates and
//! fatal errors.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::*;
use tenvault_core::helpers::{SchemaHelpers, CORE_SYSTEM_IDENTITY};
use tenvault_core::hooks::{HookError, TableHooks};
use tenvault_core::relation::RelationInfo;
use tenvault_core::schema::{IdType, TableInfo};
use tenvault_core::store::StoreError;
use tenvault_core::{ColumnValue, DataRowInfo, ModuleSpecifics, SchemaError, SchemaRegistry};
use tenvault_db::MemoryTenantStore;
use tenvault_pipeline::progress::{ProgressError, ProgressSink, ProgressUpdate};
use tenvault_pipeline::{ExecutorError, NoProgress, RestoreExecutor, RestoreRequest};
use tokio_util::sync::CancellationToken;

fn into_target(modules: Option<&[&str]>) -> RestoreRequest {
    RestoreRequest {
        target_tenant: TARGET,
        target_offset: utc(),
        modules: modules.map(|m| m.iter().map(|s| s.to_string()).collect()),
    }
}

// ---------------------------------------------------------------------------
// Test: ACL rows of the global tenant are never restored
// ---------------------------------------------------------------------------

#[tokio::test]
async fn global_acl_rows_are_rejected_and_system_subjects_kept() {
    let registry = registry();
    let target = store(&registry).await;
    let dump = container(
        &registry,
        &["core", "crm"],
        vec![
            (
                "crm_contact",
                vec![DataRowInfo::new()
                    .with("id", 17)
                    .with("tenant_id", SOURCE)
                    .with("company_id", 0)
                    .with("create_by", CORE_SYSTEM_IDENTITY)],
            ),
            (
                "core_acl",
                vec![
                    DataRowInfo::new()
                        .with("tenant", "-1")
                        .with("subject", CORE_SYSTEM_IDENTITY)
                        .with("object", "Company|17"),
                    DataRowInfo::new()
                        .with("tenant", SOURCE)
                        .with("subject", CORE_SYSTEM_IDENTITY)
                        .with("object", "Company|17"),
                ],
            ),
        ],
    );

    let report = restorer(&registry, &target)
        .restore(&dump, &into_target(None), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    let acl_stats = report.table("core_acl").unwrap();
    assert_eq!(acl_stats.rejected_by_hook, 1);
    assert_eq!(acl_stats.restored, 1);

    let contact_id = target.rows("crm_contact").await[0].get("id").cloned().unwrap();
    let acl = target.rows("core_acl").await;
    assert_eq!(acl.len(), 1);
    assert_eq!(acl[0].text("subject"), Some(CORE_SYSTEM_IDENTITY));
    assert_eq!(acl[0].get("tenant"), Some(&ColumnValue::Int(TARGET.into())));
    assert_eq!(
        acl[0].text("object"),
        Some(format!("Company|{}", contact_id.key().unwrap()).as_str())
    );
    assert!(report.warnings().iter().any(|w| w.starts_with("core_acl")));
}

// ---------------------------------------------------------------------------
// Test: subscription on an unrestored task is dropped as a whole
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscription_with_unresolved_segment_is_dropped() {
    let registry = registry();
    let target = store(&registry).await;
    let dump = container(
        &registry,
        &["core", "projects"],
        vec![
            (
                "projects_projects",
                vec![DataRowInfo::new().with("id", 9).with("tenant_id", SOURCE)],
            ),
            (
                "core_subscription",
                vec![
                    DataRowInfo::new()
                        .with("tenant", SOURCE)
                        .with("recipient", CORE_SYSTEM_IDENTITY)
                        .with("object", "Task_3_9"),
                    DataRowInfo::new()
                        .with("tenant", SOURCE)
                        .with("recipient", CORE_SYSTEM_IDENTITY)
                        .with("object", "Project_9"),
                ],
            ),
        ],
    );

    let report = restorer(&registry, &target)
        .restore(&dump, &into_target(None), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    let stats = report.table("core_subscription").unwrap();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.restored, 1);

    let project = target.rows("projects_projects").await[0].get("id").cloned().unwrap();
    let subs = target.rows("core_subscription").await;
    assert_eq!(subs.len(), 1);
    assert_eq!(
        subs[0].text("object"),
        Some(format!("Project_{}", project.key().unwrap()).as_str())
    );
}

// ---------------------------------------------------------------------------
// Test: identities of unrestored user tables are portal-wide and kept
// ---------------------------------------------------------------------------

#[tokio::test]
async fn module_subset_keeps_identities() {
    let registry = registry();
    let source = store(&registry).await;
    seed_source(&source).await;
    let dump = dumper(&registry, &source)
        .dump(
            &tenvault_pipeline::DumpRequest {
                tenant: SOURCE,
                offset: utc(),
                modules: all_modules(),
            },
            &CancellationToken::new(),
            &NoProgress,
        )
        .await
        .unwrap();

    let target = store(&registry).await;
    let report = restorer(&registry, &target)
        .restore(&dump, &into_target(Some(&["crm"])), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.tables.len(), 4);
    assert!(target.rows("core_user").await.is_empty());
    let deals = target.rows("crm_deal").await;
    assert_eq!(deals[0].get("responsible_id"), Some(&ColumnValue::Guid(alice())));
}

// ---------------------------------------------------------------------------
// Test: duplicates are skipped on IgnoreDuplicate tables
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_on_ignore_table_is_skipped() {
    let registry = registry();
    let target = store(&registry).await;
    target
        .add_unique("core_settings", &["tenantid", "id"])
        .await
        .unwrap();
    target
        .seed(
            "core_settings",
            None,
            [DataRowInfo::new()
                .with("tenantid", TARGET)
                .with("id", "Theme")
                .with("value", "light")],
        )
        .await
        .unwrap();

    let dump = container(
        &registry,
        &["core"],
        vec![(
            "core_settings",
            vec![
                DataRowInfo::new()
                    .with("tenantid", SOURCE)
                    .with("id", "Theme")
                    .with("value", "dark"),
                DataRowInfo::new()
                    .with("tenantid", SOURCE)
                    .with("id", "Language")
                    .with("value", "en"),
            ],
        )],
    );

    let report = restorer(&registry, &target)
        .restore(&dump, &into_target(None), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    let stats = report.table("core_settings").unwrap();
    assert_eq!(stats.duplicates_ignored, 1);
    assert_eq!(stats.restored, 1);
    assert_eq!(target.rows("core_settings").await.len(), 2);
}

// ---------------------------------------------------------------------------
// Test: an existing user keeps resolving references after a duplicate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_preserved_identity_still_resolves() {
    let registry = registry();
    let target = store(&registry).await;
    target
        .seed(
            "core_user",
            Some("id"),
            [DataRowInfo::new().with("tenant", TARGET).with("id", alice())],
        )
        .await
        .unwrap();

    let dump = container(
        &registry,
        &["core", "crm"],
        vec![
            (
                "core_user",
                vec![DataRowInfo::new().with("tenant", SOURCE).with("id", alice())],
            ),
            (
                "crm_contact",
                vec![DataRowInfo::new()
                    .with("id", 1)
                    .with("tenant_id", SOURCE)
                    .with("company_id", 0)
                    .with("create_by", alice())],
            ),
        ],
    );

    let report = restorer(&registry, &target)
        .restore(&dump, &into_target(None), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.table("core_user").unwrap().duplicates_ignored, 1);
    assert_eq!(report.table("crm_contact").unwrap().restored, 1);
    assert_eq!(
        target.rows("crm_contact").await[0].get("create_by"),
        Some(&ColumnValue::Guid(alice()))
    );
}

// ---------------------------------------------------------------------------
// Test: a unique violation on a plain insert table is fatal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_on_insert_table_aborts_and_rolls_back() {
    let registry = registry();
    let target = store(&registry).await;
    target.add_unique("crm_contact", &["email"]).await.unwrap();
    target
        .seed(
            "crm_contact",
            Some("id"),
            [DataRowInfo::new()
                .with("id", 1)
                .with("tenant_id", 8)
                .with("email", "taken@example.com")],
        )
        .await
        .unwrap();

    let dump = container(
        &registry,
        &["crm"],
        vec![(
            "crm_contact",
            vec![
                DataRowInfo::new()
                    .with("id", 5)
                    .with("tenant_id", SOURCE)
                    .with("email", "fresh@example.com"),
                DataRowInfo::new()
                    .with("id", 6)
                    .with("tenant_id", SOURCE)
                    .with("email", "taken@example.com"),
            ],
        )],
    );

    let err = restorer(&registry, &target)
        .restore(&dump, &into_target(None), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap_err();

    assert_matches!(err, ExecutorError::Store(StoreError::UniqueViolation { table, .. }) if table == "crm_contact");
    assert_eq!(target.rows("crm_contact").await.len(), 1);
}

// ---------------------------------------------------------------------------
// Test: a dump missing a requested table is rejected before writing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_table_is_rejected_up_front() {
    let registry = registry();
    let target = store(&registry).await;
    let mut dump = container(
        &registry,
        &["crm"],
        vec![(
            "crm_contact",
            vec![DataRowInfo::new().with("id", 5).with("tenant_id", SOURCE)],
        )],
    );
    dump.tables.shift_remove("crm_task");

    let err = restorer(&registry, &target)
        .restore(&dump, &into_target(None), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap_err();

    assert_matches!(err, ExecutorError::Schema(SchemaError::MissingTable(t)) if t == "crm_task");
    assert!(target.rows("crm_contact").await.is_empty());
}

// ---------------------------------------------------------------------------
// Test: unknown modules are rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_module_is_rejected() {
    let registry = registry();
    let target = store(&registry).await;
    let dump = container(&registry, &["crm"], vec![]);

    let err = restorer(&registry, &target)
        .restore(&dump, &into_target(Some(&["mail"])), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap_err();
    assert_matches!(err, ExecutorError::Schema(SchemaError::UnknownModule(m)) if m == "mail");
}

// ---------------------------------------------------------------------------
// Test: cancellation stops the restore before the next table
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_restore_writes_nothing() {
    let registry = registry();
    let target = store(&registry).await;
    let dump = container(
        &registry,
        &["crm"],
        vec![(
            "crm_contact",
            vec![DataRowInfo::new().with("id", 5).with("tenant_id", SOURCE)],
        )],
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = restorer(&registry, &target)
        .restore(&dump, &into_target(None), &cancel, &NoProgress)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(target.rows("crm_contact").await.is_empty());
}

/// Cancels its token after the first progress update.
struct CancelAfterFirst {
    cancel: CancellationToken,
    seen: AtomicUsize,
}

#[async_trait]
impl ProgressSink for CancelAfterFirst {
    async fn report(&self, _update: ProgressUpdate) -> Result<(), ProgressError> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
        Ok(())
    }
}

#[tokio::test]
async fn cancellation_is_observed_between_tables() {
    let registry = registry();
    let target = store(&registry).await;
    let dump = container(
        &registry,
        &["crm"],
        vec![
            (
                "crm_contact",
                vec![DataRowInfo::new().with("id", 5).with("tenant_id", SOURCE)],
            ),
            (
                "crm_deal",
                vec![DataRowInfo::new()
                    .with("id", 6)
                    .with("tenant_id", SOURCE)
                    .with("contact_id", 5)],
            ),
        ],
    );
    let cancel = CancellationToken::new();
    let sink = CancelAfterFirst {
        cancel: cancel.clone(),
        seen: AtomicUsize::new(0),
    };

    let err = restorer(&registry, &target)
        .restore(&dump, &into_target(None), &cancel, &sink)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(sink.seen.load(Ordering::SeqCst), 1);
    assert_eq!(target.rows("crm_contact").await.len(), 1);
    assert!(target.rows("crm_deal").await.is_empty());
}

// ---------------------------------------------------------------------------
// Test: progress publication failure aborts the restore
// ---------------------------------------------------------------------------

struct BrokenSink;

#[async_trait]
impl ProgressSink for BrokenSink {
    async fn report(&self, _update: ProgressUpdate) -> Result<(), ProgressError> {
        Err(ProgressError("status store unavailable".into()))
    }
}

#[tokio::test]
async fn progress_failure_is_fatal() {
    let registry = registry();
    let target = store(&registry).await;
    let dump = container(&registry, &["crm"], vec![]);

    let err = restorer(&registry, &target)
        .restore(&dump, &into_target(None), &CancellationToken::new(), &BrokenSink)
        .await
        .unwrap_err();
    assert_matches!(err, ExecutorError::Progress(_));
}

// ---------------------------------------------------------------------------
// Test: a failing hook stops the restore
// ---------------------------------------------------------------------------

struct Broken;

impl TableHooks for Broken {
    fn prepare_row(
        &self,
        _table: &TableInfo,
        _row: DataRowInfo,
        _helpers: &SchemaHelpers,
    ) -> Result<Option<DataRowInfo>, HookError> {
        Err(HookError("corrupt row".into()))
    }
}

struct Ledger;

impl ModuleSpecifics for Ledger {
    fn name(&self) -> &'static str {
        "ledger"
    }

    fn tables(&self) -> Vec<TableInfo> {
        vec![TableInfo::new("ledger_entry")
            .tenant_column("tenant_id")
            .id("id", IdType::Integer)]
    }

    fn relations(&self) -> Vec<RelationInfo> {
        Vec::new()
    }

    fn hooks(&self) -> Vec<(&'static str, Arc<dyn TableHooks>)> {
        vec![("ledger_entry", Arc::new(Broken))]
    }
}

#[tokio::test]
async fn hook_failure_is_fatal() {
    let registry = Arc::new(SchemaRegistry::builder().module(Ledger).build().unwrap());
    let target = Arc::new(MemoryTenantStore::for_registry(&registry).await);
    let dump = container(
        &registry,
        &["ledger"],
        vec![(
            "ledger_entry",
            vec![DataRowInfo::new().with("id", 1).with("tenant_id", SOURCE)],
        )],
    );

    let err = RestoreExecutor::new(Arc::clone(&registry), target.clone())
        .restore(&dump, &into_target(None), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ExecutorError::Schema(SchemaError::HookFailed { table, reason })
            if table == "ledger_entry" && reason == "corrupt row"
    );
    assert!(target.rows("ledger_entry").await.is_empty());
}
