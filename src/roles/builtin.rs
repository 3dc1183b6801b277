//! Catalog of the built-in roles surfaced by the dashboard.
//! Built-ins are predefined by the database engine and act as inheritance
//! leaves: the directory never reports outgoing edges for them.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinCategory {
    Collection,
    Database,
    Global,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuiltinRole {
    pub role: &'static str,
    pub description: &'static str,
    pub category: BuiltinCategory,
}

const fn builtin(
    role: &'static str,
    description: &'static str,
    category: BuiltinCategory,
) -> BuiltinRole {
    BuiltinRole { role, description, category }
}

pub const BUILTIN_ROLES: &[BuiltinRole] = &[
    // Collection roles
    builtin("read", "Read data from all non-system collections", BuiltinCategory::Collection),
    builtin(
        "readWrite",
        "Read and write data to all non-system collections",
        BuiltinCategory::Collection,
    ),
    // Database roles
    builtin("dbAdmin", "Administrative privileges on the database", BuiltinCategory::Database),
    builtin("dbOwner", "Full privileges on the database", BuiltinCategory::Database),
    builtin(
        "userAdmin",
        "Create and modify roles and users on the database",
        BuiltinCategory::Database,
    ),
    // Cluster-wide and system roles
    builtin("clusterAdmin", "Full cluster administration access", BuiltinCategory::Global),
    builtin("clusterManager", "Manage and monitor cluster operations", BuiltinCategory::Global),
    builtin("clusterMonitor", "Read-only access to monitoring tools", BuiltinCategory::Global),
    builtin("hostManager", "Monitor and manage servers", BuiltinCategory::Global),
    builtin("backup", "Backup database data", BuiltinCategory::Global),
    builtin("restore", "Restore database data", BuiltinCategory::Global),
    builtin("readAnyDatabase", "Read data from all databases", BuiltinCategory::Global),
    builtin(
        "readWriteAnyDatabase",
        "Read and write data to all databases",
        BuiltinCategory::Global,
    ),
    builtin(
        "userAdminAnyDatabase",
        "User administration privileges on all databases",
        BuiltinCategory::Global,
    ),
    builtin(
        "dbAdminAnyDatabase",
        "Database administration privileges on all databases",
        BuiltinCategory::Global,
    ),
    builtin("root", "Full access to all operations and resources", BuiltinCategory::Global),
];

pub fn find(name: &str) -> Option<&'static BuiltinRole> {
    BUILTIN_ROLES.iter().find(|r| r.role == name)
}

pub fn is_builtin(name: &str) -> bool {
    find(name).is_some()
}

/// Catalog keyed by role name, as served by `GET /roles/builtin`.
pub fn catalog() -> BTreeMap<&'static str, &'static BuiltinRole> {
    BUILTIN_ROLES.iter().map(|r| (r.role, r)).collect()
}

#[derive(Debug, Serialize)]
pub struct GroupedBuiltinRoles {
    pub collection: Vec<&'static BuiltinRole>,
    pub database: Vec<&'static BuiltinRole>,
    pub global: Vec<&'static BuiltinRole>,
}

/// Catalog grouped by category, as served by `GET /roles/builtin/grouped`.
pub fn grouped() -> GroupedBuiltinRoles {
    let mut out = GroupedBuiltinRoles { collection: Vec::new(), database: Vec::new(), global: Vec::new() };
    for r in BUILTIN_ROLES {
        match r.category {
            BuiltinCategory::Collection => out.collection.push(r),
            BuiltinCategory::Database => out.database.push(r),
            BuiltinCategory::Global => out.global.push(r),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_grouping() {
        assert!(is_builtin("readWrite"));
        assert!(is_builtin("root"));
        assert!(!is_builtin("dataAnalyst"));

        let g = grouped();
        assert_eq!(g.collection.len(), 2);
        assert_eq!(g.database.len(), 3);
        assert_eq!(g.global.len(), BUILTIN_ROLES.len() - 5);
        assert!(g.global.iter().any(|r| r.role == "clusterAdmin"));
    }

    #[test]
    fn catalog_is_keyed_by_name() {
        let cat = catalog();
        assert_eq!(cat["read"].description, "Read data from all non-system collections");
        assert_eq!(cat.len(), BUILTIN_ROLES.len());
    }
}
