//! Unified application error model and mapping helpers.
//! One error enum is shared by the normalizer, the inheritance validator, the
//! directory clients and the HTTP handlers, along with the HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::roles::model::RoleRef;

#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Malformed input: bad shape, disallowed action, blank role name.
    /// Recoverable by the caller correcting input; never retried.
    #[error("{message}")]
    Validation { message: String },

    /// One or more inherited roles do not exist in the directory.
    /// Carries every missing pair so the caller can fix them in one round trip.
    #[error("Inherited roles do not exist: {}", fmt_refs(.missing))]
    MissingRoles { missing: Vec<RoleRef> },

    /// The proposed inheritance edges would close a cycle at `role`.
    #[error("Circular role inheritance detected involving role \"{role}\"")]
    CircularInheritance { role: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Conflict { message: String },

    /// Underlying directory read/write failed (connectivity, permissions,
    /// concurrent modification). Surfaced as-is; the core never retries.
    #[error("{message}")]
    Directory { message: String },
}

fn fmt_refs(refs: &[RoleRef]) -> String {
    refs.iter()
        .map(|r| format!("{} (db: {})", r.role, r.db))
        .collect::<Vec<_>>()
        .join(", ")
}

impl AppError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        AppError::Validation { message: msg.into() }
    }
    pub fn missing_roles(missing: Vec<RoleRef>) -> Self {
        AppError::MissingRoles { missing }
    }
    pub fn circular<S: Into<String>>(role: S) -> Self {
        AppError::CircularInheritance { role: role.into() }
    }
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AppError::NotFound { message: msg.into() }
    }
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        AppError::Conflict { message: msg.into() }
    }
    pub fn directory<S: Into<String>>(msg: S) -> Self {
        AppError::Directory { message: msg.into() }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::MissingRoles { .. }
            | AppError::CircularInheritance { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Directory { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.http_status(), body).into_response()
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::Directory { message: err.to_string() }
    }
}

impl From<bson::ser::Error> for AppError {
    fn from(err: bson::ser::Error) -> Self {
        AppError::Directory { message: format!("BSON encode failed: {err}") }
    }
}

impl From<bson::de::Error> for AppError {
    fn from(err: bson::de::Error) -> Self {
        AppError::Directory { message: format!("BSON decode failed: {err}") }
    }
}

pub type AppResult<T> = Result<T, AppError>;
