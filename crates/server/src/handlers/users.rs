//! CRUD and lookup handlers over the user store.

use axum::Json;
use axum::extract::{Path, Query, State};
use http::StatusCode;
use serde::Deserialize;

use crate::model::{CreateUserRequest, LoginInfoRequest, UpdateUserRequest};
use crate::storage::{MAX_LIST_LIMIT, MAX_SEARCH_LIMIT};

use super::{ApiError, AppState, envelope, listing};

#[derive(Deserialize)]
pub(crate) struct ListParams {
    #[serde(default = "default_list_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_list_limit() -> usize {
    50
}

#[derive(Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    20
}

/// `POST /users`
pub(crate) async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    request.validate().map_err(ApiError::Validation)?;

    let user = state.store.create(request).await?;

    Ok((
        StatusCode::CREATED,
        envelope(user, "User created successfully"),
    ))
}

/// `GET /users/{id}`
pub(crate) async fn get(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.store.get(id).await?;
    Ok(envelope(user, "User retrieved successfully"))
}

/// `GET /users/subject/{subject}`
pub(crate) async fn get_by_subject(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.store.get_by_subject(&subject).await?;
    Ok(envelope(user, "User retrieved successfully"))
}

/// `GET /users/username/{username}`
pub(crate) async fn get_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.store.get_by_username(&username).await?;
    Ok(envelope(user, "User retrieved successfully"))
}

/// `GET /users/email/{email}`
pub(crate) async fn get_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.store.get_by_email(&email).await?;
    Ok(envelope(user, "User retrieved successfully"))
}

/// `GET /users`
pub(crate) async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = params.limit.min(MAX_LIST_LIMIT);
    let users = state.store.list(limit, params.offset).await?;

    Ok(listing(users, limit, params.offset, "Users retrieved successfully"))
}

/// `GET /users/search?q=`
pub(crate) async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if params.q.trim().is_empty() {
        return Err(ApiError::Validation(vec!["q is required".to_owned()]));
    }

    let limit = params.limit.min(MAX_SEARCH_LIMIT);
    let users = state.store.search(params.q.trim(), limit).await?;

    Ok(listing(users, limit, 0, "Search completed successfully"))
}

/// `GET /users/count`
pub(crate) async fn count(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.store.count().await?;
    Ok(envelope(
        serde_json::json!({ "count": count }),
        "User count retrieved successfully",
    ))
}

/// `GET /users/active`
pub(crate) async fn active(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let users = state.store.active().await?;
    let count = users.len();

    Ok(Json(serde_json::json!({
        "data": users,
        "count": count,
        "message": "Active users retrieved successfully",
    })))
}

/// `PUT /users/{id}`
pub(crate) async fn update(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate().map_err(ApiError::Validation)?;

    let user = state.store.update(id, request).await?;
    Ok(envelope(user, "User updated successfully"))
}

/// `DELETE /users/{id}`
pub(crate) async fn delete(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.delete(id).await?;
    Ok(envelope(serde_json::Value::Null, "User deleted successfully"))
}

/// `POST /users/{id}/login`
pub(crate) async fn record_login(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<LoginInfoRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate().map_err(ApiError::Validation)?;

    let user = state.store.record_login(id, request).await?;
    Ok(envelope(user, "Login recorded successfully"))
}
