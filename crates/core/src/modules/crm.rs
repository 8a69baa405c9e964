//! CRM: contacts (companies and persons), deals, cases and tasks.

use crate::helpers::SchemaHelpers;
use crate::modules::has_prefix;
use crate::registry::ModuleSpecifics;
use crate::relation::RelationInfo;
use crate::row::DataRowInfo;
use crate::schema::{IdType, TableInfo};

pub struct CrmModule;

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

fn entity_type_is(row: &DataRowInfo, expected: &str) -> bool {
    row.text("entity_type")
        .is_some_and(|t| t.eq_ignore_ascii_case(expected))
}

fn task_of_contact(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    entity_type_is(row, "contact")
}

fn task_of_deal(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    entity_type_is(row, "opportunity")
}

fn task_of_case(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    entity_type_is(row, "case")
}

fn acl_on_contact(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    has_prefix(row, "object", "Company|") || has_prefix(row, "object", "Person|")
}

fn acl_on_deal(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    has_prefix(row, "object", "Deal|")
}

fn acl_on_case(row: &DataRowInfo, _: &SchemaHelpers) -> bool {
    has_prefix(row, "object", "Case|")
}

impl ModuleSpecifics for CrmModule {
    fn name(&self) -> &'static str {
        "crm"
    }

    fn tables(&self) -> Vec<TableInfo> {
        vec![
            TableInfo::new("crm_contact")
                .tenant_column("tenant_id")
                .id("id", IdType::Integer)
                .user_columns(["create_by", "last_modifed_by"])
                .local_date("create_on")
                .utc_date("last_modifed_on"),
            TableInfo::new("crm_deal")
                .tenant_column("tenant_id")
                .id("id", IdType::Integer)
                .user_columns(["responsible_id", "create_by"])
                .local_date("expected_close_date")
                .local_date("create_on"),
            TableInfo::new("crm_case")
                .tenant_column("tenant_id")
                .id("id", IdType::Integer)
                .user_columns(["create_by"])
                .local_date("create_on"),
            TableInfo::new("crm_task")
                .tenant_column("tenant_id")
                .id("id", IdType::Integer)
                .user_columns(["responsible_id", "create_by"])
                .local_date("deadline")
                .local_date("create_on"),
        ]
    }

    fn relations(&self) -> Vec<RelationInfo> {
        vec![
            RelationInfo::new("crm_contact", "id", "crm_contact", "company_id"),
            RelationInfo::new("crm_contact", "id", "crm_deal", "contact_id"),
            RelationInfo::new("crm_contact", "id", "crm_task", "contact_id"),
            RelationInfo::new("crm_contact", "id", "crm_task", "entity_id").when(task_of_contact),
            RelationInfo::new("crm_deal", "id", "crm_task", "entity_id").when(task_of_deal),
            RelationInfo::new("crm_case", "id", "crm_task", "entity_id").when(task_of_case),
            RelationInfo::new("crm_contact", "id", "core_acl", "object")
                .qualified('|')
                .when(acl_on_contact),
            RelationInfo::new("crm_deal", "id", "core_acl", "object")
                .qualified('|')
                .when(acl_on_deal),
            RelationInfo::new("crm_case", "id", "core_acl", "object")
                .qualified('|')
                .when(acl_on_case),
        ]
    }
}
