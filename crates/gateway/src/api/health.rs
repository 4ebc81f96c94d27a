//! Liveness / readiness probe.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// `GET /health` — reports which storage and quota backends are live.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "storage_backend": state.documents.backend(),
        "storage_ready": state.documents.is_ready().await,
        "quota_backend": state.ledger.backend_tag(),
    }))
}
