pub mod admin;
pub mod auth;
pub mod chat;
pub mod conversations;
pub mod health;
pub mod profile;
pub mod quota;
pub mod recipe;
pub mod vision;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Build the full API router.
///
/// Routes are split into **public** (health + credential exchange) and
/// **protected** (everything else, gated behind the session-token
/// middleware).  Admin routes carry a second layer that checks the
/// admin roster.
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/v1/auth/google", post(auth::login));

    let admin = Router::new()
        .route("/v1/admin/quota", get(admin::all_quota_stats))
        .route("/v1/admin/quota/reset", post(admin::reset_all_quota))
        .route("/v1/admin/quota/:user_id/reset", post(admin::reset_user_quota))
        .route("/v1/admin/admins", get(admin::list_admins))
        .route("/v1/admin/admins/:user_id", put(admin::add_admin))
        .route("/v1/admin/admins/:user_id", delete(admin::remove_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let protected = Router::new()
        // Who am I
        .route("/v1/auth/me", get(auth::me))
        // Chat (streaming pipeline)
        .route("/v1/chat/stream", post(chat::chat_stream))
        // Direct recipe generation
        .route("/v1/recipe/stream", post(recipe::recipe_stream))
        // Photo analysis without a chat turn
        .route("/v1/analyze", post(vision::analyze))
        // Quota
        .route("/v1/quota", get(quota::status))
        // Profile
        .route("/v1/profile", get(profile::get_profile))
        .route("/v1/profile", put(profile::update_profile))
        .route("/v1/profile/summary", get(profile::get_summary))
        .route("/v1/profile/stats", get(profile::get_stats))
        .route("/v1/profile/feedback", post(profile::record_feedback))
        .route("/v1/profile/sessions", post(profile::record_session))
        // Conversation history
        .route("/v1/conversations", get(conversations::list))
        .route("/v1/conversations", delete(conversations::clear))
        .route("/v1/conversations/stats", get(conversations::stats))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_session,
        ));

    public.merge(protected)
}
