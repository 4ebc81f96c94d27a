//! Standalone photo analysis.
//!
//! `POST /v1/analyze` — base64 photo in, detected ingredient list out.
//! The same extraction runs inside a chat turn when a photo is
//! attached; this endpoint exists for clients that want the list
//! before deciding what to ask for.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use base64::Engine as _;
use serde::Deserialize;

use crate::api::api_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Photo bytes, base64-encoded (a data-URL prefix is tolerated).
    pub image: String,
    #[serde(default = "d_image_mime")]
    pub image_mime_type: String,
}

fn d_image_mime() -> String {
    "image/jpeg".into()
}

pub async fn analyze(State(state): State<AppState>, Json(body): Json<AnalyzeRequest>) -> Response {
    let raw = body.image.rsplit(',').next().unwrap_or(&body.image);
    let data = match base64::engine::general_purpose::STANDARD.decode(raw.trim()) {
        Ok(d) => d,
        Err(_) => return api_error(StatusCode::BAD_REQUEST, "image must be valid base64"),
    };

    let ingredients = state
        .vision
        .extract_ingredients(&data, &body.image_mime_type)
        .await;
    let count = ingredients.len();
    Json(serde_json::json!({
        "ingredients": ingredients,
        "count": count,
    }))
    .into_response()
}
