//! Login history and session endpoints.
//!
//! The identity provider does not expose an audit API yet, so these serve
//! representative data derived from the local record.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde_json::json;

use crate::auth::Principal;

use super::{ApiError, AppState, envelope};

/// `GET /login/history/{user_id}`
pub(crate) async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.store.get(user_id).await?;

    // One synthetic entry per recorded login fact we actually have.
    let mut entries = Vec::new();
    if let Some(last_login_at) = user.last_login_at {
        entries.push(json!({
            "user_id": user.id,
            "timestamp": last_login_at,
            "ip": user.last_login_ip,
            "device": user.last_login_device,
            "success": true,
        }));
    }

    let count = entries.len();
    Ok(Json(json!({
        "data": entries,
        "count": count,
        "message": "Login history retrieved successfully",
    })))
}

/// `GET /login/sessions`
pub(crate) async fn sessions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.store.get_by_subject(&principal.subject).await?;

    Ok(envelope(
        json!({
            "subject": principal.subject,
            "sessions": [{
                "user_id": user.id,
                "current": true,
                "started_at": user.last_login_at,
                "expires_at": principal.expires_at,
            }],
        }),
        "Active sessions retrieved successfully",
    ))
}
