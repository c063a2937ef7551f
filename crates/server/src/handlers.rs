//! Route handlers and their shared response plumbing.

pub(crate) mod auth;
pub(crate) mod logins;
pub(crate) mod passwords;
pub(crate) mod users;

use std::sync::Arc;

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use serde_json::json;

use crate::auth::CredentialVerifier;
use crate::storage::{StoreError, UserStore};

/// Shared handler dependencies.
#[derive(Clone)]
pub(crate) struct AppState {
    pub store: Arc<dyn UserStore>,
    /// Absent when no identity provider is configured; login endpoints then
    /// answer 503 instead of guessing.
    pub verifier: Option<Arc<dyn CredentialVerifier>>,
}

/// Wrap payloads the way every success response is shaped:
/// `{ "data": ..., "message": ... }`.
pub(crate) fn envelope<T: Serialize>(data: T, message: &str) -> Json<serde_json::Value> {
    Json(json!({ "data": data, "message": message }))
}

/// Listing responses additionally carry paging metadata.
pub(crate) fn listing<T: Serialize>(
    data: Vec<T>,
    limit: usize,
    offset: usize,
    message: &str,
) -> Json<serde_json::Value> {
    let count = data.len();
    Json(json!({
        "data": data,
        "count": count,
        "limit": limit,
        "offset": offset,
        "message": message,
    }))
}

/// Handler failures, mapped to the uniform `{ "error": ... }` JSON surface.
#[derive(Debug)]
pub(crate) enum ApiError {
    Validation(Vec<String>),
    NotFound,
    Conflict(&'static str),
    Unauthenticated,
    AuthDisabled,
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Duplicate { field } => ApiError::Conflict(field),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(problems) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "validation failed", "details": problems }),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "user not found" })),
            ApiError::Conflict(field) => (
                StatusCode::CONFLICT,
                json!({ "error": format!("a user with this {field} already exists") }),
            ),
            ApiError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, json!({ "error": "unauthorized" }))
            }
            ApiError::AuthDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "authentication is not configured" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// `GET /ping`
pub(crate) async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "message": "pong" }))
}
