//! Admin endpoints — quota oversight and roster management.
//!
//! All routes here sit behind [`crate::api::auth::require_admin`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::api::api_error;
use crate::state::AppState;

/// `GET /v1/admin/quota` — today's usage for every active user,
/// heaviest first.
pub async fn all_quota_stats(State(state): State<AppState>) -> Response {
    match state.ledger.all_stats().await {
        Ok(stats) => {
            let count = stats.len();
            Json(serde_json::json!({
                "users": stats,
                "count": count,
            }))
            .into_response()
        }
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("quota stats unavailable: {e}"),
        ),
    }
}

/// `POST /v1/admin/quota/reset` — zero every user's counters for today.
pub async fn reset_all_quota(State(state): State<AppState>) -> Response {
    match state.ledger.reset_all().await {
        Ok(count) => Json(serde_json::json!({ "reset": count })).into_response(),
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("quota reset failed: {e}"),
        ),
    }
}

/// `POST /v1/admin/quota/:user_id/reset`
pub async fn reset_user_quota(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.ledger.reset(&user_id).await {
        Ok(existed) => Json(serde_json::json!({
            "user_id": user_id,
            "had_usage": existed,
        }))
        .into_response(),
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("quota reset failed: {e}"),
        ),
    }
}

/// `GET /v1/admin/admins`
pub async fn list_admins(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "admins": state.ledger.admins() }))
}

/// `PUT /v1/admin/admins/:user_id`
pub async fn add_admin(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let added = state.ledger.add_admin(&user_id);
    Json(serde_json::json!({ "user_id": user_id, "added": added }))
}

/// `DELETE /v1/admin/admins/:user_id`
pub async fn remove_admin(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let removed = state.ledger.remove_admin(&user_id);
    Json(serde_json::json!({ "user_id": user_id, "removed": removed }))
}
