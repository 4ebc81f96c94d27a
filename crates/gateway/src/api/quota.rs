//! Quota introspection.
//!
//! `GET /v1/quota` — the caller's usage snapshot for today (JST).

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::Extension;

use crate::api::auth::SessionClaims;
use crate::state::AppState;

pub async fn status(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> impl IntoResponse {
    Json(serde_json::json!(state.ledger.status(&claims.sub).await))
}
