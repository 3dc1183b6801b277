//! Role directory abstraction.
//! The directory is the external store of user and role definitions, reached
//! through administrative commands. Handlers and services receive an explicit
//! client instance behind this trait, so the validator can be exercised
//! against an in-memory directory in tests and the real MongoDB client in
//! production.

mod memory;
mod mongo;

pub use memory::MemoryDirectory;
pub use mongo::MongoDirectory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::roles::model::{Privilege, RoleDoc, RoleRef};

/// User document as returned by `usersInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDoc {
    /// `<db>.<username>`, the canonical user id.
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub db: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleRef>,
    #[serde(default, rename = "inheritedRoles")]
    pub inherited_roles: Vec<RoleRef>,
    #[serde(default, rename = "customData")]
    pub custom_data: Option<bson::Document>,
}

impl UserDoc {
    /// Bare username. User documents carry both `user` and `_id` (`db.user`);
    /// temporary-user metadata is keyed by the bare username.
    pub fn username(&self) -> &str {
        match &self.user {
            Some(u) => u.as_str(),
            None => self.id.split_once('.').map(|(_, u)| u).unwrap_or(&self.id),
        }
    }

    pub fn created_at(&self) -> Option<bson::DateTime> {
        self.custom_data.as_ref()?.get_datetime("createdAt").ok().copied()
    }

    pub fn is_temporary(&self) -> bool {
        self.custom_data
            .as_ref()
            .and_then(|d| d.get_bool("isTemporary").ok())
            .unwrap_or(false)
    }

    pub fn temp_expires_at(&self) -> Option<bson::DateTime> {
        self.custom_data.as_ref()?.get_datetime("tempExpiresAt").ok().copied()
    }

    pub fn has_role(&self, role: &str, db: &str) -> bool {
        self.roles.iter().any(|r| r.role == role && r.db == db)
    }
}

/// Effective privileges for a user, direct and inherited. Privilege and
/// restriction payloads stay schemaless because built-in roles contribute
/// resource shapes (cluster, anyResource) the custom-role model never emits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePrivileges {
    pub id: String,
    pub db: String,
    pub roles: Vec<RoleRef>,
    pub inherited_roles: Vec<RoleRef>,
    pub privileges: serde_json::Value,
    pub custom_data: serde_json::Value,
    pub authentication_restrictions: serde_json::Value,
}

/// `customData` written onto user documents. `tempExpiresAt` lets a TTL index
/// on `system.users` remove expired temporary users automatically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCustomData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<bson::DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_temporary: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_expires_at: Option<bson::DateTime>,
}

#[derive(Debug, Clone)]
pub struct CreateUserSpec {
    pub name: String,
    pub password: String,
    pub roles: Vec<RoleRef>,
    pub custom_data: UserCustomData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempUserStatus {
    Active,
    Expired,
}

/// Audit row in the `tempUsers` collection, one per temporary user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempUserMeta {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub username: String,
    pub created_at: bson::DateTime,
    pub expires_at: bson::DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<bson::DateTime>,
    pub status: TempUserStatus,
    #[serde(default)]
    pub roles: Vec<RoleRef>,
}

/// The directory client: read and mutate user/role definitions via the
/// engine's administrative commands. All reads are idempotent; faults surface
/// as `AppError::Directory` and are never retried here.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Health probe against the underlying store.
    async fn ping(&self) -> AppResult<()>;

    /// Target database for unqualified role references (normally `admin`).
    fn database_name(&self) -> &str;

    /// Return the subset of `refs` that exist, built-in roles included.
    async fn find_roles(&self, refs: &[RoleRef]) -> AppResult<Vec<RoleRef>>;

    /// Every user-defined role with its own inherited `roles` populated.
    /// Must not include built-in roles.
    async fn list_custom_roles(&self) -> AppResult<Vec<RoleDoc>>;

    /// Atomically create (`is_update == false`) or patch the definition of
    /// one role; `None` fields are left untouched on update. Duplicate name on
    /// create and unknown name on update are underlying faults.
    async fn write_role(
        &self,
        name: &str,
        privileges: Option<&[Privilege]>,
        inherited: Option<&[RoleRef]>,
        is_update: bool,
    ) -> AppResult<()>;

    async fn drop_role(&self, name: &str) -> AppResult<()>;

    async fn list_users(&self) -> AppResult<Vec<UserDoc>>;

    async fn find_user(&self, name: &str) -> AppResult<Option<UserDoc>>;

    async fn user_effective_privileges(&self, name: &str)
        -> AppResult<Option<EffectivePrivileges>>;

    async fn create_user(&self, spec: &CreateUserSpec) -> AppResult<()>;

    /// Patch password and/or role assignments of an existing user.
    async fn update_user(
        &self,
        name: &str,
        password: Option<&str>,
        roles: Option<&[RoleRef]>,
    ) -> AppResult<()>;

    async fn drop_user(&self, name: &str) -> AppResult<()>;

    async fn insert_temp_user_meta(&self, meta: &TempUserMeta) -> AppResult<()>;

    async fn list_temp_user_meta(&self) -> AppResult<Vec<TempUserMeta>>;

    /// Flip active metadata rows whose expiry has passed to `expired`,
    /// stamping `expiredAt`. Returns how many rows were flipped. Dropping the
    /// actual database user is delegated to a TTL index on
    /// `system.users.customData.tempExpiresAt`.
    async fn expire_temp_user_meta(&self, now: bson::DateTime) -> AppResult<usize>;
}
