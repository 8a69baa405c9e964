//! Portal core: users, groups, memberships, access entries, subscriptions
//! and tenant settings.

use std::sync::Arc;

use crate::hooks::{ExcludeRows, RejectGlobalTenantRows, TableHooks};
use crate::registry::ModuleSpecifics;
use crate::relation::RelationInfo;
use crate::schema::{IdType, InsertMode, TableColumn, TableInfo};
use crate::value::ColumnValue;

/// Settings entry holding the portal licence; never copied between tenants.
pub const RESERVED_SETTINGS_KEY: &str = "LicenseKey";

pub struct CoreModule;

impl ModuleSpecifics for CoreModule {
    fn name(&self) -> &'static str {
        "core"
    }

    fn tables(&self) -> Vec<TableInfo> {
        vec![
            TableInfo::new("core_user")
                .tenant_column("tenant")
                .id("id", IdType::Guid)
                .preserve_keys()
                .insert_mode(InsertMode::IgnoreDuplicate)
                .utc_date("create_on")
                .utc_date("last_modified"),
            TableInfo::new("core_group")
                .tenant_column("tenant")
                .id("id", IdType::Guid)
                .preserve_keys()
                .insert_mode(InsertMode::IgnoreDuplicate)
                .utc_date("last_modified"),
            TableInfo::new("core_usergroup")
                .tenant_column("tenant")
                .insert_mode(InsertMode::IgnoreDuplicate)
                .user_columns(["userid", "groupid"])
                .utc_date("last_modified"),
            TableInfo::new("core_acl")
                .tenant_column("tenant")
                .insert_mode(InsertMode::IgnoreDuplicate)
                .user_columns(["subject"]),
            TableInfo::new("core_subscription")
                .tenant_column("tenant")
                .insert_mode(InsertMode::IgnoreDuplicate)
                .user_columns(["recipient"]),
            TableInfo::new("core_settings")
                .tenant_column("tenantid")
                .insert_mode(InsertMode::IgnoreDuplicate)
                .utc_date("last_modified"),
        ]
    }

    fn relations(&self) -> Vec<RelationInfo> {
        Vec::new()
    }

    fn hooks(&self) -> Vec<(&'static str, Arc<dyn TableHooks>)> {
        vec![
            ("core_acl", Arc::new(RejectGlobalTenantRows)),
            ("core_subscription", Arc::new(RejectGlobalTenantRows)),
            (
                "core_settings",
                Arc::new(ExcludeRows {
                    column: "id".into(),
                    values: vec![ColumnValue::from(RESERVED_SETTINGS_KEY)],
                }),
            ),
        ]
    }

    fn identity_sources(&self) -> Vec<TableColumn> {
        vec![
            TableColumn::new("core_user", "id"),
            TableColumn::new("core_group", "id"),
        ]
    }
}
