//! User administration over the directory: CRUD, dedicated password changes,
//! temporary users with expiry bookkeeping, and effective-privilege lookup.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

use crate::directory::{
    CreateUserSpec, Directory, EffectivePrivileges, TempUserMeta, TempUserStatus, UserCustomData,
};
use crate::error::{AppError, AppResult};
use crate::roles::model::RoleRef;

/// Built-in roles treated as mutually exclusive "default" choices when
/// assigning roles to a user. A user can hold at most one of these, plus any
/// number of custom roles.
const SINGLE_SELECT_BUILTIN_ROLES: &[&str] =
    &["clusterAdmin", "readWriteAnyDatabase", "readAnyDatabase"];

/// Users holding any of these cannot be deleted through the dashboard.
const PROTECTED_ADMIN_ROLES: &[&str] =
    &["root", "userAdminAnyDatabase", "dbAdminAnyDatabase", "clusterAdmin"];

/// User row as served to the dashboard, with temporary-user status merged in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub roles: Vec<RoleRef>,
    pub is_temporary: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

pub fn validate_password_characters(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Ok(());
    }
    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::validation(
            "Password may only contain letters and numbers (no special characters)",
        ));
    }
    Ok(())
}

pub fn validate_user_roles(roles: &[RoleRef]) -> AppResult<()> {
    let single_select =
        roles.iter().filter(|r| SINGLE_SELECT_BUILTIN_ROLES.contains(&r.role.as_str())).count();
    if single_select > 1 {
        return Err(AppError::validation(
            "Only one built-in default role (clusterAdmin, readWriteAnyDatabase, or \
             readAnyDatabase) may be assigned to a user",
        ));
    }
    Ok(())
}

/// User documents are addressed as `<db>.<username>`; temporary-user metadata
/// and the administrative commands key on the bare username.
fn username_from_id(id: &str) -> AppResult<&str> {
    match id.split_once('.') {
        Some((_, user)) if !user.is_empty() => Ok(user),
        _ => Err(AppError::validation("Invalid user ID format")),
    }
}

fn to_chrono(dt: bson::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
}

pub struct UserService {
    dir: Arc<dyn Directory>,
}

impl UserService {
    pub fn new(dir: Arc<dyn Directory>) -> Self {
        Self { dir }
    }

    /// Load all users with temporary-user metadata merged in. Expired
    /// temporary users are flipped to `expired` on each load, best-effort.
    /// The user document's own customData is the source of truth for
    /// temporary status and expiry; the `tempUsers` metadata is the fallback
    /// for records created before that field existed.
    pub async fn list_users(&self) -> AppResult<Vec<DashboardUser>> {
        if let Err(e) = self.dir.expire_temp_user_meta(bson::DateTime::now()).await {
            warn!("temporary users cleanup failed: {e}");
        }
        let temp_meta = match self.dir.list_temp_user_meta().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("failed to load temporary users metadata: {e}");
                Vec::new()
            }
        };
        let temp_by_name: HashMap<&str, &TempUserMeta> =
            temp_meta.iter().map(|m| (m.username.as_str(), m)).collect();

        let users = self.dir.list_users().await?;
        Ok(users
            .iter()
            .map(|u| {
                let name = u.username().to_string();
                let meta = temp_by_name.get(name.as_str());
                let is_temporary = u.is_temporary() || meta.is_some();
                let expires_at = u.temp_expires_at().or_else(|| meta.map(|m| m.expires_at));
                DashboardUser {
                    id: u.id.clone(),
                    name,
                    created_at: u.created_at().and_then(to_chrono),
                    roles: u.roles.clone(),
                    is_temporary,
                    expires_at: expires_at.and_then(to_chrono),
                }
            })
            .collect())
    }

    pub async fn create_user(
        &self,
        name: &str,
        password: &str,
        roles: Vec<RoleRef>,
    ) -> AppResult<()> {
        if name.is_empty() || password.is_empty() {
            return Err(AppError::validation("Name and password are required"));
        }
        validate_password_characters(password)?;
        validate_user_roles(&roles)?;

        if self.dir.find_user(name).await?.is_some() {
            return Err(AppError::conflict("User with this name already exists"));
        }

        // Default to readWrite on the target db when no roles are given.
        let roles = if roles.is_empty() {
            vec![RoleRef::new("readWrite", self.dir.database_name())]
        } else {
            roles
        };

        self.dir
            .create_user(&CreateUserSpec {
                name: name.to_string(),
                password: password.to_string(),
                roles,
                custom_data: UserCustomData {
                    created_at: Some(bson::DateTime::now()),
                    ..Default::default()
                },
            })
            .await
    }

    /// Create a user that expires `expires_in_hours` from now. The user
    /// document carries `isTemporary` and `tempExpiresAt` in customData so a
    /// TTL index on `system.users` can remove it; an audit row is kept in the
    /// `tempUsers` collection.
    pub async fn create_temporary_user(
        &self,
        name: &str,
        password: &str,
        roles: Vec<RoleRef>,
        expires_in_hours: f64,
    ) -> AppResult<()> {
        if name.is_empty() || password.is_empty() {
            return Err(AppError::validation("Name and password are required"));
        }
        validate_password_characters(password)?;
        if !expires_in_hours.is_finite() || expires_in_hours <= 0.0 {
            return Err(AppError::validation("expiresInHours must be a positive number"));
        }
        validate_user_roles(&roles)?;

        if self.dir.find_user(name).await?.is_some() {
            return Err(AppError::conflict("User with this name already exists"));
        }

        let now = Utc::now();
        let expires_at = now + Duration::milliseconds((expires_in_hours * 3_600_000.0) as i64);
        let now_bson = bson::DateTime::from_millis(now.timestamp_millis());
        let expires_bson = bson::DateTime::from_millis(expires_at.timestamp_millis());

        self.dir
            .create_user(&CreateUserSpec {
                name: name.to_string(),
                password: password.to_string(),
                roles: roles.clone(),
                custom_data: UserCustomData {
                    created_at: Some(now_bson),
                    is_temporary: Some(true),
                    temp_expires_at: Some(expires_bson),
                },
            })
            .await?;

        self.dir
            .insert_temp_user_meta(&TempUserMeta {
                id: None,
                username: name.to_string(),
                created_at: now_bson,
                expires_at: expires_bson,
                expired_at: None,
                status: TempUserStatus::Active,
                roles,
            })
            .await
    }

    /// Patch a user's password and/or role assignments. Root users may only
    /// change passwords through the dedicated action.
    pub async fn update_user(
        &self,
        id: &str,
        password: Option<String>,
        roles: Option<Vec<RoleRef>>,
    ) -> AppResult<()> {
        let username = username_from_id(id)?;

        let Some(user) = self.dir.find_user(username).await? else {
            return Err(AppError::not_found("User not found"));
        };
        if user.has_role("root", self.dir.database_name()) {
            return Err(AppError::validation(
                "Root users cannot be edited. Use the dedicated password change action instead.",
            ));
        }

        let password = password.filter(|p| !p.is_empty());
        if let Some(pw) = &password {
            validate_password_characters(pw)?;
        }
        if let Some(roles) = &roles {
            validate_user_roles(roles)?;
        }
        if password.is_none() && roles.is_none() {
            return Ok(());
        }

        self.dir.update_user(username, password.as_deref(), roles.as_deref()).await
    }

    pub async fn update_password(&self, id: &str, password: &str) -> AppResult<()> {
        if id.is_empty() || password.is_empty() {
            return Err(AppError::validation("User ID and password are required"));
        }
        validate_password_characters(password)?;
        let username = username_from_id(id)?;

        if self.dir.find_user(username).await?.is_none() {
            return Err(AppError::not_found("User not found"));
        }
        self.dir.update_user(username, Some(password), None).await
    }

    /// Delete a user. The last remaining user and users holding
    /// administrative roles are refused.
    pub async fn delete_user(&self, id: &str) -> AppResult<()> {
        let username = username_from_id(id)?;

        let users = self.dir.list_users().await?;
        if users.len() <= 1 {
            return Err(AppError::conflict(
                "Cannot delete the last user. At least one user must remain to access the \
                 database.",
            ));
        }

        let Some(user) = self.dir.find_user(username).await? else {
            return Err(AppError::not_found("User not found"));
        };
        if user.roles.iter().any(|r| PROTECTED_ADMIN_ROLES.contains(&r.role.as_str())) {
            return Err(AppError::conflict(
                "Root users and users with administrative privileges cannot be deleted for \
                 security reasons.",
            ));
        }

        self.dir.drop_user(username).await
    }

    pub async fn effective_privileges(&self, name: &str) -> AppResult<EffectivePrivileges> {
        if name.is_empty() {
            return Err(AppError::validation("User name is required"));
        }
        self.dir
            .user_effective_privileges(name)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }
}
