//! Conversation history endpoints.
//!
//! - `GET    /v1/conversations`       — recent messages, oldest first
//! - `DELETE /v1/conversations`       — wipe the history
//! - `GET    /v1/conversations/stats` — message counts

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use axum::Extension;
use serde::Deserialize;

use crate::api::auth::SessionClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let messages = state.conversations.list(&claims.sub, query.limit).await;
    let count = messages.len();
    Json(serde_json::json!({
        "messages": messages,
        "count": count,
    }))
}

pub async fn clear(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> impl IntoResponse {
    let removed = state.conversations.clear(&claims.sub).await;
    Json(serde_json::json!({ "removed": removed }))
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> impl IntoResponse {
    Json(serde_json::json!(state.conversations.stats(&claims.sub).await))
}
