//! Custom-role administration service.
//! Orchestrates normalize -> validate -> commit for role mutations.
//!
//! The validator reads the directory and the commit writes it with no
//! transaction spanning the two, so two concurrent mutations could each pass
//! validation against a stale snapshot and together introduce a cycle. Role
//! mutations are therefore serialized through a single async mutex held
//! across validate+write, which makes the gate authoritative within this
//! process. Cross-process writers remain unserialized; the directory offers
//! no multi-document read-then-write primitive to close that gap.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::directory::Directory;
use crate::error::{AppError, AppResult};
use crate::roles::model::{Privilege, RoleDoc, RoleRefInput};
use crate::roles::{normalize, validate};

pub struct RoleService {
    dir: Arc<dyn Directory>,
    writes: Mutex<()>,
}

impl RoleService {
    pub fn new(dir: Arc<dyn Directory>) -> Self {
        Self { dir, writes: Mutex::new(()) }
    }

    pub async fn list_custom_roles(&self) -> AppResult<Vec<RoleDoc>> {
        self.dir.list_custom_roles().await
    }

    /// Create a custom role. The full gate runs before the write: privilege
    /// allow-list, inherited-role existence, cycle detection.
    pub async fn create_custom_role(
        &self,
        name: &str,
        privileges: Vec<Privilege>,
        inherited: Vec<RoleRefInput>,
    ) -> AppResult<()> {
        let name = normalize::normalize_role_name(name)?;
        let inherited = normalize::normalize_inherited_roles(&inherited, self.dir.database_name())?;

        let _guard = self.writes.lock().await;
        validate::validate_and_stage(&*self.dir, &name, &privileges, &inherited).await?;
        self.dir.write_role(&name, Some(&privileges), Some(&inherited), false).await?;
        info!(role = name.as_str(), "custom role created");
        Ok(())
    }

    /// Patch a custom role. Inheritance is re-validated only when the request
    /// carries an inherited-role set; a body with neither field is a no-op.
    pub async fn update_custom_role(
        &self,
        name: &str,
        privileges: Option<Vec<Privilege>>,
        inherited: Option<Vec<RoleRefInput>>,
    ) -> AppResult<()> {
        let name = normalize::normalize_role_name(name)?;

        if let Some(privileges) = &privileges {
            normalize::validate_privileges(privileges)?;
        }
        let inherited = match inherited {
            Some(inputs) => {
                Some(normalize::normalize_inherited_roles(&inputs, self.dir.database_name())?)
            }
            None => None,
        };

        if privileges.is_none() && inherited.is_none() {
            return Ok(());
        }

        let _guard = self.writes.lock().await;
        if let Some(refs) = &inherited {
            validate::assert_inherited_roles_exist(&*self.dir, refs).await?;
            validate::assert_no_cycle(&*self.dir, &name, refs).await?;
        }
        self.dir.write_role(&name, privileges.as_deref(), inherited.as_deref(), true).await?;
        info!(role = name.as_str(), "custom role updated");
        Ok(())
    }

    /// Drop a custom role, refused while any user still holds it directly or
    /// through inheritance.
    pub async fn delete_custom_role(&self, name: &str) -> AppResult<()> {
        let name = normalize::normalize_role_name(name)?;
        let db_name = self.dir.database_name().to_string();

        let _guard = self.writes.lock().await;
        let users = self.dir.list_users().await?;
        let consumers: Vec<&str> = users
            .iter()
            .filter(|u| {
                u.roles
                    .iter()
                    .chain(u.inherited_roles.iter())
                    .any(|r| r.role == name && r.db == db_name)
            })
            .map(|u| u.username())
            .collect();

        if !consumers.is_empty() {
            return Err(AppError::conflict(format!(
                "Cannot delete role \"{name}\" because it is still assigned to users: {}",
                consumers.join(", ")
            )));
        }

        self.dir.drop_role(&name).await?;
        info!(role = name.as_str(), "custom role deleted");
        Ok(())
    }
}
