//! MongoDB-backed directory client.
//! Thin wrappers over the native administrative commands (`usersInfo`,
//! `rolesInfo`, `createUser`, `createRole`, ...) issued against the `admin`
//! database, plus the `tempUsers` audit collection for temporary users.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{Client, Collection, Database};
use tracing::debug;

use super::{CreateUserSpec, Directory, EffectivePrivileges, TempUserMeta, UserDoc};
use crate::error::{AppError, AppResult};
use crate::roles::model::{Privilege, RoleDoc, RoleRef};

const ADMIN_DB: &str = "admin";
const TEMP_USERS_COLLECTION: &str = "tempUsers";

pub struct MongoDirectory {
    client: Client,
    db: Database,
}

impl MongoDirectory {
    /// Connect to the given (already validated) connection string and verify
    /// the server is reachable.
    pub async fn connect(uri: &str) -> AppResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(ADMIN_DB);
        let dir = Self { client, db };
        dir.ping().await?;
        Ok(dir)
    }

    /// Tear down the connection pool. The directory is unusable afterwards.
    pub async fn disconnect(self) {
        self.client.shutdown().await;
    }

    fn temp_users(&self) -> Collection<TempUserMeta> {
        self.db.collection::<TempUserMeta>(TEMP_USERS_COLLECTION)
    }

    fn parse_users(reply: &Document) -> AppResult<Vec<UserDoc>> {
        let raw = reply.get_array("users").ok().cloned().unwrap_or_default();
        raw.into_iter()
            .map(|item| bson::from_bson::<UserDoc>(item).map_err(AppError::from))
            .collect()
    }
}

#[async_trait]
impl Directory for MongoDirectory {
    async fn ping(&self) -> AppResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    fn database_name(&self) -> &str {
        self.db.name()
    }

    async fn find_roles(&self, refs: &[RoleRef]) -> AppResult<Vec<RoleRef>> {
        let lookups: Vec<Document> =
            refs.iter().map(|r| doc! { "role": r.role.as_str(), "db": r.db.as_str() }).collect();
        let reply = self
            .db
            .run_command(doc! {
                "rolesInfo": lookups,
                "showPrivileges": false,
                "showBuiltinRoles": true,
            })
            .await?;

        let mut found = Vec::new();
        for item in reply.get_array("roles").ok().into_iter().flatten() {
            if let Bson::Document(d) = item {
                if let (Ok(role), Ok(db)) = (d.get_str("role"), d.get_str("db")) {
                    found.push(RoleRef::new(role, db));
                }
            }
        }
        Ok(found)
    }

    async fn list_custom_roles(&self) -> AppResult<Vec<RoleDoc>> {
        let reply = self
            .db
            .run_command(doc! {
                "rolesInfo": 1,
                "showPrivileges": true,
                "showBuiltinRoles": false,
            })
            .await?;

        let raw = reply.get_array("roles").ok().cloned().unwrap_or_default();
        raw.into_iter()
            .map(|item| {
                let mut role = bson::from_bson::<RoleDoc>(item)?;
                role.is_custom = true;
                Ok(role)
            })
            .collect()
    }

    async fn write_role(
        &self,
        name: &str,
        privileges: Option<&[Privilege]>,
        inherited: Option<&[RoleRef]>,
        is_update: bool,
    ) -> AppResult<()> {
        let mut cmd = Document::new();
        cmd.insert(if is_update { "updateRole" } else { "createRole" }, name);
        if let Some(privileges) = privileges {
            cmd.insert("privileges", bson::to_bson(privileges)?);
        }
        if let Some(inherited) = inherited {
            cmd.insert("roles", bson::to_bson(inherited)?);
        }
        debug!(role = name, is_update, "writing role definition");
        self.db.run_command(cmd).await?;
        Ok(())
    }

    async fn drop_role(&self, name: &str) -> AppResult<()> {
        self.db.run_command(doc! { "dropRole": name }).await?;
        Ok(())
    }

    async fn list_users(&self) -> AppResult<Vec<UserDoc>> {
        let reply = self
            .db
            .run_command(doc! {
                "usersInfo": 1,
                "showCredentials": false,
                "showCustomData": true,
                "showPrivileges": false,
                "showAuthenticationRestrictions": false,
                "filter": {},
            })
            .await?;
        Self::parse_users(&reply)
    }

    async fn find_user(&self, name: &str) -> AppResult<Option<UserDoc>> {
        let reply = self
            .db
            .run_command(doc! {
                "usersInfo": { "user": name, "db": self.db.name() },
                "showCredentials": false,
                "showCustomData": true,
            })
            .await?;
        Ok(Self::parse_users(&reply)?.into_iter().next())
    }

    async fn user_effective_privileges(
        &self,
        name: &str,
    ) -> AppResult<Option<EffectivePrivileges>> {
        let reply = self
            .db
            .run_command(doc! {
                "usersInfo": { "user": name, "db": self.db.name() },
                "showCredentials": false,
                "showCustomData": true,
                "showPrivileges": true,
                "showAuthenticationRestrictions": true,
            })
            .await?;

        let users = reply.get_array("users").ok().cloned().unwrap_or_default();
        let Some(Bson::Document(user)) = users.into_iter().next() else {
            return Ok(None);
        };

        let roles = bson::from_bson::<Vec<RoleRef>>(Bson::Array(
            user.get_array("roles").ok().cloned().unwrap_or_default(),
        ))?;
        let inherited_roles = bson::from_bson::<Vec<RoleRef>>(Bson::Array(
            user.get_array("inheritedRoles").ok().cloned().unwrap_or_default(),
        ))?;

        // Inherited privileges are the fully expanded set; fall back to the
        // direct ones when the server does not report them.
        let privileges = user
            .get_array("inheritedPrivileges")
            .or_else(|_| user.get_array("privileges"))
            .ok()
            .cloned()
            .unwrap_or_default();

        Ok(Some(EffectivePrivileges {
            id: user.get_str("_id").unwrap_or_default().to_string(),
            db: user.get_str("db").unwrap_or(self.db.name()).to_string(),
            roles,
            inherited_roles,
            privileges: Bson::Array(privileges).into_relaxed_extjson(),
            custom_data: user
                .get_document("customData")
                .ok()
                .map(|d| Bson::Document(d.clone()).into_relaxed_extjson())
                .unwrap_or_else(|| serde_json::json!({})),
            authentication_restrictions: user
                .get_array("authenticationRestrictions")
                .ok()
                .map(|a| Bson::Array(a.clone()).into_relaxed_extjson())
                .unwrap_or_else(|| serde_json::json!([])),
        }))
    }

    async fn create_user(&self, spec: &CreateUserSpec) -> AppResult<()> {
        let mut cmd = Document::new();
        cmd.insert("createUser", spec.name.as_str());
        cmd.insert("pwd", spec.password.as_str());
        cmd.insert("roles", bson::to_bson(&spec.roles)?);
        cmd.insert("customData", bson::to_bson(&spec.custom_data)?);
        debug!(user = spec.name.as_str(), "creating user");
        self.db.run_command(cmd).await?;
        Ok(())
    }

    async fn update_user(
        &self,
        name: &str,
        password: Option<&str>,
        roles: Option<&[RoleRef]>,
    ) -> AppResult<()> {
        let mut cmd = Document::new();
        cmd.insert("updateUser", name);
        if let Some(pw) = password {
            cmd.insert("pwd", pw);
        }
        if let Some(roles) = roles {
            cmd.insert("roles", bson::to_bson(roles)?);
        }
        self.db.run_command(cmd).await?;
        Ok(())
    }

    async fn drop_user(&self, name: &str) -> AppResult<()> {
        self.db.run_command(doc! { "dropUser": name }).await?;
        Ok(())
    }

    async fn insert_temp_user_meta(&self, meta: &TempUserMeta) -> AppResult<()> {
        self.temp_users().insert_one(meta).await?;
        Ok(())
    }

    async fn list_temp_user_meta(&self) -> AppResult<Vec<TempUserMeta>> {
        let cursor = self.temp_users().find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn expire_temp_user_meta(&self, now: bson::DateTime) -> AppResult<usize> {
        let result = self
            .temp_users()
            .update_many(
                doc! { "status": "active", "expiresAt": { "$lte": now } },
                doc! { "$set": { "status": "expired", "expiredAt": now } },
            )
            .await?;
        Ok(result.modified_count as usize)
    }
}
