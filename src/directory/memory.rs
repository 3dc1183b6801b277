//! In-memory directory used by the test suite.
//! Behaves like a tiny role/user store: role names are unique, built-in roles
//! exist in every database and never expose inheritance edges, and
//! `inheritedRoles` on user documents is the transitive expansion through
//! custom roles.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CreateUserSpec, Directory, EffectivePrivileges, TempUserMeta, TempUserStatus, UserDoc};
use crate::error::{AppError, AppResult};
use crate::roles::builtin;
use crate::roles::model::{Privilege, RoleDoc, RoleRef};

#[derive(Debug, Clone)]
struct StoredRole {
    db: String,
    privileges: Vec<Privilege>,
    inherited: Vec<RoleRef>,
}

#[derive(Debug, Clone)]
struct StoredUser {
    password: String,
    roles: Vec<RoleRef>,
    custom_data: super::UserCustomData,
}

#[derive(Default)]
struct Inner {
    roles: BTreeMap<String, StoredRole>,
    users: BTreeMap<String, StoredUser>,
    temp_meta: Vec<TempUserMeta>,
}

pub struct MemoryDirectory {
    inner: Mutex<Inner>,
    db_name: String,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()), db_name: "admin".to_string() }
    }

    /// Seed a custom role without going through the validation gate.
    pub fn seed_custom_role(&self, name: &str, privileges: Vec<Privilege>, inherited: Vec<RoleRef>) {
        let mut inner = self.inner.lock();
        inner.roles.insert(
            name.to_string(),
            StoredRole { db: self.db_name.clone(), privileges, inherited },
        );
    }

    /// Seed a user without going through the user service checks.
    pub fn seed_user(&self, name: &str, roles: Vec<RoleRef>) {
        let mut inner = self.inner.lock();
        inner.users.insert(
            name.to_string(),
            StoredUser {
                password: "seeded".to_string(),
                roles,
                custom_data: super::UserCustomData::default(),
            },
        );
    }

    pub fn role_names(&self) -> Vec<String> {
        self.inner.lock().roles.keys().cloned().collect()
    }

    /// Stored credential, for asserting password updates in tests.
    pub fn password_of(&self, name: &str) -> Option<String> {
        self.inner.lock().users.get(name).map(|u| u.password.clone())
    }

    /// Transitive expansion of `direct` through custom-role edges. Built-ins
    /// have no entries in the role map and therefore terminate the walk.
    fn expand(roles: &BTreeMap<String, StoredRole>, direct: &[RoleRef]) -> Vec<RoleRef> {
        let mut seen: BTreeSet<String> = direct.iter().map(RoleRef::key).collect();
        let mut inherited: BTreeMap<String, RoleRef> = BTreeMap::new();
        let mut queue: Vec<RoleRef> = direct.to_vec();
        while let Some(current) = queue.pop() {
            if let Some(role) = roles.get(&current.role) {
                for child in &role.inherited {
                    if seen.insert(child.key()) {
                        inherited.insert(child.key(), child.clone());
                        queue.push(child.clone());
                    }
                }
            }
        }
        inherited.into_values().collect()
    }

    fn user_doc(&self, name: &str, user: &StoredUser, roles: &BTreeMap<String, StoredRole>) -> UserDoc {
        let custom_data = bson::to_document(&user.custom_data).ok().filter(|d| !d.is_empty());
        UserDoc {
            id: format!("{}.{}", self.db_name, name),
            user: Some(name.to_string()),
            db: Some(self.db_name.clone()),
            roles: user.roles.clone(),
            inherited_roles: Self::expand(roles, &user.roles),
            custom_data,
        }
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    fn database_name(&self) -> &str {
        &self.db_name
    }

    async fn find_roles(&self, refs: &[RoleRef]) -> AppResult<Vec<RoleRef>> {
        let inner = self.inner.lock();
        Ok(refs
            .iter()
            .filter(|r| {
                builtin::is_builtin(&r.role)
                    || inner.roles.get(&r.role).map(|s| s.db == r.db).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn list_custom_roles(&self) -> AppResult<Vec<RoleDoc>> {
        let inner = self.inner.lock();
        Ok(inner
            .roles
            .iter()
            .map(|(name, stored)| RoleDoc {
                role: name.clone(),
                db: Some(stored.db.clone()),
                privileges: stored.privileges.clone(),
                roles: stored.inherited.clone(),
                is_custom: true,
            })
            .collect())
    }

    async fn write_role(
        &self,
        name: &str,
        privileges: Option<&[Privilege]>,
        inherited: Option<&[RoleRef]>,
        is_update: bool,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock();
        if is_update {
            let Some(stored) = inner.roles.get_mut(name) else {
                return Err(AppError::directory(format!("No role named {name}@{}", self.db_name)));
            };
            if let Some(privileges) = privileges {
                stored.privileges = privileges.to_vec();
            }
            if let Some(inherited) = inherited {
                stored.inherited = inherited.to_vec();
            }
        } else {
            if inner.roles.contains_key(name) {
                return Err(AppError::directory(format!(
                    "Role {name}@{} already exists",
                    self.db_name
                )));
            }
            inner.roles.insert(
                name.to_string(),
                StoredRole {
                    db: self.db_name.clone(),
                    privileges: privileges.unwrap_or_default().to_vec(),
                    inherited: inherited.unwrap_or_default().to_vec(),
                },
            );
        }
        Ok(())
    }

    async fn drop_role(&self, name: &str) -> AppResult<()> {
        let mut inner = self.inner.lock();
        if inner.roles.remove(name).is_none() {
            return Err(AppError::directory(format!("No role named {name}@{}", self.db_name)));
        }
        Ok(())
    }

    async fn list_users(&self) -> AppResult<Vec<UserDoc>> {
        let inner = self.inner.lock();
        Ok(inner
            .users
            .iter()
            .map(|(name, user)| self.user_doc(name, user, &inner.roles))
            .collect())
    }

    async fn find_user(&self, name: &str) -> AppResult<Option<UserDoc>> {
        let inner = self.inner.lock();
        Ok(inner.users.get(name).map(|u| self.user_doc(name, u, &inner.roles)))
    }

    async fn user_effective_privileges(
        &self,
        name: &str,
    ) -> AppResult<Option<EffectivePrivileges>> {
        let inner = self.inner.lock();
        let Some(user) = inner.users.get(name) else {
            return Ok(None);
        };

        let inherited_roles = Self::expand(&inner.roles, &user.roles);
        // Collect privileges of every reachable custom role.
        let mut privileges: Vec<Privilege> = Vec::new();
        for r in user.roles.iter().chain(inherited_roles.iter()) {
            if let Some(stored) = inner.roles.get(&r.role) {
                privileges.extend(stored.privileges.iter().cloned());
            }
        }

        Ok(Some(EffectivePrivileges {
            id: format!("{}.{}", self.db_name, name),
            db: self.db_name.clone(),
            roles: user.roles.clone(),
            inherited_roles,
            privileges: serde_json::to_value(privileges).unwrap_or_default(),
            custom_data: bson::to_document(&user.custom_data)
                .ok()
                .map(|d| bson::Bson::Document(d).into_relaxed_extjson())
                .unwrap_or_else(|| serde_json::json!({})),
            authentication_restrictions: serde_json::json!([]),
        }))
    }

    async fn create_user(&self, spec: &CreateUserSpec) -> AppResult<()> {
        let mut inner = self.inner.lock();
        if inner.users.contains_key(&spec.name) {
            return Err(AppError::directory(format!("User \"{}\" already exists", spec.name)));
        }
        inner.users.insert(
            spec.name.clone(),
            StoredUser {
                password: spec.password.clone(),
                roles: spec.roles.clone(),
                custom_data: spec.custom_data.clone(),
            },
        );
        Ok(())
    }

    async fn update_user(
        &self,
        name: &str,
        password: Option<&str>,
        roles: Option<&[RoleRef]>,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock();
        let Some(user) = inner.users.get_mut(name) else {
            return Err(AppError::directory(format!("User \"{name}\" not found")));
        };
        if let Some(pw) = password {
            user.password = pw.to_string();
        }
        if let Some(roles) = roles {
            user.roles = roles.to_vec();
        }
        Ok(())
    }

    async fn drop_user(&self, name: &str) -> AppResult<()> {
        let mut inner = self.inner.lock();
        if inner.users.remove(name).is_none() {
            return Err(AppError::directory(format!("User \"{name}\" not found")));
        }
        Ok(())
    }

    async fn insert_temp_user_meta(&self, meta: &TempUserMeta) -> AppResult<()> {
        self.inner.lock().temp_meta.push(meta.clone());
        Ok(())
    }

    async fn list_temp_user_meta(&self) -> AppResult<Vec<TempUserMeta>> {
        Ok(self.inner.lock().temp_meta.clone())
    }

    async fn expire_temp_user_meta(&self, now: bson::DateTime) -> AppResult<usize> {
        let mut cleaned = 0;
        for meta in self.inner.lock().temp_meta.iter_mut() {
            if meta.status == TempUserStatus::Active && meta.expires_at <= now {
                meta.status = TempUserStatus::Expired;
                meta.expired_at = Some(now);
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }
}
