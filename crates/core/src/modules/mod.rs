//! Dump/restore declarations of the product modules.
//!
//! Cross-module links (ACL entries and subscriptions on module entities) are
//! declared by the module owning the referenced entity, so the `core` module
//! never names another module's tables.

pub mod crm;
pub mod files;
pub mod portal;
pub mod projects;

use crate::error::SchemaError;
use crate::helpers::SchemaHelpers;
use crate::registry::SchemaRegistry;
use crate::row::DataRowInfo;

pub use self::crm::CrmModule;
pub use self::files::FilesModule;
pub use self::portal::CoreModule;
pub use self::projects::ProjectsModule;

/// Names of the shipped modules, in registration order.
pub const MODULE_NAMES: [&str; 4] = ["core", "crm", "projects", "files"];

/// Registry with every shipped module registered.
pub fn default_registry(helpers: SchemaHelpers) -> Result<SchemaRegistry, SchemaError> {
    SchemaRegistry::builder()
        .helpers(helpers)
        .module(CoreModule)
        .module(CrmModule)
        .module(ProjectsModule)
        .module(FilesModule)
        .build()
}

/// `true` if text column `column` of `row` starts with `prefix`.
pub(crate) fn has_prefix(row: &DataRowInfo, column: &str, prefix: &str) -> bool {
    row.text(column).is_some_and(|v| v.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(registry: &SchemaRegistry) -> Vec<String> {
        let modules: Vec<String> = MODULE_NAMES.iter().map(|m| m.to_string()).collect();
        registry
            .processing_order(&modules)
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    fn position(order: &[String], table: &str) -> usize {
        order
            .iter()
            .position(|t| t == table)
            .unwrap_or_else(|| panic!("{table} not in order"))
    }

    #[test]
    fn default_registry_builds() {
        let registry = default_registry(SchemaHelpers::new()).unwrap();
        assert_eq!(registry.modules(), MODULE_NAMES);
    }

    #[test]
    fn identities_are_restored_first() {
        let registry = default_registry(SchemaHelpers::new()).unwrap();
        let order = order(&registry);
        let users = position(&order, "core_user");
        let groups = position(&order, "core_group");
        for table in ["crm_contact", "projects_projects", "files_folder", "core_acl"] {
            assert!(users < position(&order, table), "{table}");
            assert!(groups < position(&order, table), "{table}");
        }
    }

    #[test]
    fn acl_and_subscriptions_follow_the_entities_they_reference() {
        let registry = default_registry(SchemaHelpers::new()).unwrap();
        let order = order(&registry);
        let acl = position(&order, "core_acl");
        let subscription = position(&order, "core_subscription");
        for parent in ["crm_contact", "projects_projects", "projects_tasks", "files_folder"] {
            assert!(position(&order, parent) < acl, "{parent}");
        }
        assert!(position(&order, "projects_tasks") < subscription);
    }

    #[test]
    fn every_table_belongs_to_a_module() {
        let registry = default_registry(SchemaHelpers::new()).unwrap();
        let total: usize = MODULE_NAMES
            .iter()
            .map(|m| registry.tables(m).unwrap().len())
            .sum();
        assert_eq!(total, order(&registry).len());
    }
}
