//!
//! mongard HTTP server
//! -------------------
//! This module defines the Axum-based HTTP API for administering MongoDB
//! users and roles.
//!
//! Responsibilities:
//! - User endpoints: listing with temporary-user status, create/update/delete,
//!   dedicated password changes, effective-privilege inspection.
//! - Custom-role endpoints gated by the inheritance validator.
//! - Static catalogs for the dashboard: actions tree and built-in roles.
//! - Connection-string validation.
//!
//! The directory client is injected through `AppState`; handlers never touch
//! a connection directly.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::directory::{Directory, EffectivePrivileges, MongoDirectory};
use crate::error::{AppError, AppResult};
use crate::roles::model::{Privilege, RoleRef, RoleRefInput};
use crate::roles::{actions, builtin, RoleService};
use crate::uri;
use crate::users::UserService;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub dir: Arc<dyn Directory>,
    pub roles: Arc<RoleService>,
    pub users: Arc<UserService>,
}

impl AppState {
    pub fn new(dir: Arc<dyn Directory>) -> Self {
        Self {
            roles: Arc::new(RoleService::new(dir.clone())),
            users: Arc::new(UserService::new(dir.clone())),
            dir,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/users", get(list_users))
        .route("/users", post(create_user))
        .route("/users/temporary", post(create_temporary_user))
        .route("/users/update", put(update_user))
        .route("/users/password", put(update_password))
        .route("/users/delete", delete(delete_user))
        .route("/users/{name}/effective-privileges", get(effective_privileges))
        .route("/roles/actions-tree", get(actions_tree))
        .route("/roles/builtin", get(builtin_roles))
        .route("/roles/builtin/grouped", get(builtin_roles_grouped))
        .route("/roles/custom", get(list_custom_roles).post(create_custom_role))
        .route("/roles/custom/{role_name}", put(update_custom_role).delete(delete_custom_role))
        .route("/validate-uri", post(validate_uri))
        .with_state(state)
}

/// Start the server against an already-connected directory.
pub async fn run_with_directory(http_port: u16, dir: Arc<dyn Directory>) -> anyhow::Result<()> {
    let app = router(AppState::new(dir));
    let addr: SocketAddr = format!("0.0.0.0:{http_port}").parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Normalize the connection string, connect the MongoDB directory client and
/// start the server.
pub async fn run_with_ports(http_port: u16, mongo_uri: &str) -> anyhow::Result<()> {
    let normalized = uri::validate_and_normalize(mongo_uri)?;
    let dir = MongoDirectory::connect(&normalized).await?;
    info!("Connected to MongoDB role directory");
    run_with_directory(http_port, Arc::new(dir)).await
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let connected = state.dir.ping().await.is_ok();
    Json(json!({ "status": "ok", "connected": connected }))
}

async fn list_users(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let users = state.users.list_users().await?;
    Ok(Json(json!({ "users": users })))
}

#[derive(Debug, Deserialize)]
struct CreateUserPayload {
    name: Option<String>,
    password: Option<String>,
    #[serde(default)]
    roles: Vec<RoleRef>,
}

async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserPayload>,
) -> AppResult<Json<Value>> {
    state
        .users
        .create_user(
            payload.name.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
            payload.roles,
        )
        .await?;
    Ok(Json(json!({ "success": true, "message": "User created successfully" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTemporaryUserPayload {
    name: Option<String>,
    password: Option<String>,
    #[serde(default)]
    roles: Vec<RoleRef>,
    expires_in_hours: Option<f64>,
}

async fn create_temporary_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateTemporaryUserPayload>,
) -> AppResult<Json<Value>> {
    state
        .users
        .create_temporary_user(
            payload.name.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
            payload.roles,
            payload.expires_in_hours.unwrap_or(0.0),
        )
        .await?;
    Ok(Json(json!({ "success": true, "message": "Temporary user created successfully" })))
}

#[derive(Debug, Deserialize)]
struct UpdateUserPayload {
    id: Option<String>,
    password: Option<String>,
    roles: Option<Vec<RoleRef>>,
}

async fn update_user(
    State(state): State<AppState>,
    Json(payload): Json<UpdateUserPayload>,
) -> AppResult<Json<Value>> {
    let id = payload.id.ok_or_else(|| AppError::validation("User ID is required"))?;
    state.users.update_user(&id, payload.password, payload.roles).await?;
    Ok(Json(json!({ "success": true, "message": "User updated successfully" })))
}

#[derive(Debug, Deserialize)]
struct PasswordPayload {
    id: Option<String>,
    password: Option<String>,
}

async fn update_password(
    State(state): State<AppState>,
    Json(payload): Json<PasswordPayload>,
) -> AppResult<Json<Value>> {
    state
        .users
        .update_password(
            payload.id.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(json!({ "success": true, "message": "Password updated successfully" })))
}

#[derive(Debug, Deserialize)]
struct DeleteUserPayload {
    id: Option<String>,
}

async fn delete_user(
    State(state): State<AppState>,
    Json(payload): Json<DeleteUserPayload>,
) -> AppResult<Json<Value>> {
    let id = payload.id.ok_or_else(|| AppError::validation("User ID is required"))?;
    state.users.delete_user(&id).await?;
    Ok(Json(json!({ "success": true, "message": "User deleted successfully" })))
}

async fn effective_privileges(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<EffectivePrivileges>> {
    Ok(Json(state.users.effective_privileges(&name).await?))
}

async fn actions_tree() -> Json<&'static [actions::ActionsNode]> {
    Json(actions::actions_tree())
}

async fn builtin_roles() -> Json<Value> {
    Json(json!({ "roles": builtin::catalog() }))
}

async fn builtin_roles_grouped() -> Json<Value> {
    Json(json!({ "roles": builtin::grouped() }))
}

async fn list_custom_roles(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let roles = state.roles.list_custom_roles().await?;
    Ok(Json(json!({ "roles": roles })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRolePayload {
    role_name: Option<String>,
    #[serde(default)]
    privileges: Vec<Privilege>,
    #[serde(default)]
    inherited_roles: Vec<RoleRefInput>,
}

async fn create_custom_role(
    State(state): State<AppState>,
    Json(payload): Json<CreateRolePayload>,
) -> AppResult<Json<Value>> {
    let name = payload.role_name.ok_or_else(|| AppError::validation("Role name is required"))?;
    state.roles.create_custom_role(&name, payload.privileges, payload.inherited_roles).await?;
    Ok(Json(json!({ "success": true, "message": "Custom role created successfully" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRolePayload {
    privileges: Option<Vec<Privilege>>,
    inherited_roles: Option<Vec<RoleRefInput>>,
}

async fn update_custom_role(
    State(state): State<AppState>,
    Path(role_name): Path<String>,
    Json(payload): Json<UpdateRolePayload>,
) -> AppResult<Json<Value>> {
    state
        .roles
        .update_custom_role(&role_name, payload.privileges, payload.inherited_roles)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Custom role updated successfully" })))
}

async fn delete_custom_role(
    State(state): State<AppState>,
    Path(role_name): Path<String>,
) -> AppResult<Json<Value>> {
    state.roles.delete_custom_role(&role_name).await?;
    Ok(Json(json!({ "success": true, "message": "Custom role deleted successfully" })))
}

#[derive(Debug, Deserialize)]
struct ValidateUriPayload {
    uri: Option<String>,
}

async fn validate_uri(Json(payload): Json<ValidateUriPayload>) -> Response {
    let Some(raw) = payload.uri.filter(|u| !u.is_empty()) else {
        return AppError::validation("MongoDB URI is required").into_response();
    };
    match uri::validate_and_normalize(&raw) {
        Ok(normalized) => {
            let was_modified = normalized != raw.trim();
            Json(json!({
                "valid": true,
                "originalUri": raw,
                "normalizedUri": normalized,
                "wasModified": was_modified,
            }))
            .into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "valid": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}
