//! Role data model shared by the normalizer, validator and directory clients.
//! Mirrors the wire shapes of the `rolesInfo`/`createRole`/`updateRole`
//! administrative commands.

use serde::{Deserialize, Serialize};

/// Reference to a role scoped to a database. Two refs are the same edge iff
/// both fields match exactly; a role can legitimately be inherited once per
/// distinct db.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleRef {
    pub role: String,
    pub db: String,
}

impl RoleRef {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self { role: role.into(), db: db.into() }
    }

    /// Key used for existence lookups (`role@db`).
    pub fn key(&self) -> String {
        format!("{}@{}", self.role, self.db)
    }
}

/// Inherited-role entry as accepted from callers: either a bare role name
/// (db defaults to the operation's target database) or a `{role, db?}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoleRefInput {
    Name(String),
    Scoped {
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        db: Option<String>,
    },
}

/// Resource a privilege applies to. `db == ""` denotes any database;
/// `collection` empty or absent denotes any collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeResource {
    pub db: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

/// A grant of specific actions on a specific resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub resource: PrivilegeResource,
    pub actions: Vec<String>,
}

/// Role definition as returned by the directory (`rolesInfo`).
/// Built-in roles are opaque inheritance leaves: the directory never reports
/// inheritance edges for them, so `roles` is only populated for custom roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDoc {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
    #[serde(default)]
    pub privileges: Vec<Privilege>,
    #[serde(default)]
    pub roles: Vec<RoleRef>,
    #[serde(default, rename = "isCustom")]
    pub is_custom: bool,
}
