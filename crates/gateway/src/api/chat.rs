//! Chat API — the primary streaming interface.
//!
//! `POST /v1/chat/stream` runs the full pipeline for one message and
//! streams [`TurnEvent`]s over SSE.  Quota is checked before any stage
//! runs; a rejected request gets a structured 429 with the remaining
//! counts and never reaches the pipeline.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use base64::Engine as _;
use futures_util::stream::Stream;
use serde::Deserialize;

use sous_domain::stream::TurnEvent;

use crate::api::auth::SessionClaims;
use crate::runtime::{run_turn, ImageAttachment, TurnInput};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// User message text.
    pub message: String,
    /// Attached photo, base64-encoded.
    #[serde(default)]
    pub image: Option<String>,
    /// MIME type of the attachment.
    #[serde(default = "d_image_mime")]
    pub image_mime_type: String,
    /// Generate per-step illustrations.
    #[serde(default)]
    pub with_images: bool,
    /// Run the nutrition analysis branch.
    #[serde(default = "d_true")]
    pub with_nutrition: bool,
}

fn d_image_mime() -> String {
    "image/jpeg".into()
}

fn d_true() -> bool {
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat/stream (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_stream(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(body): Json<ChatRequest>,
) -> Response {
    let user_id = claims.sub.clone();

    // Admission check before any pipeline stage runs.
    if let Err(resp) = check_quota(&state, &user_id, body.with_images).await {
        return resp;
    }

    let image = match decode_attachment(&body) {
        Ok(i) => i,
        Err(e) => return crate::api::api_error(StatusCode::BAD_REQUEST, e),
    };

    let input = TurnInput {
        user_id,
        message: body.message,
        image,
        with_images: body.with_images,
        with_nutrition: body.with_nutrition,
    };

    let rx = run_turn(state, input);
    Sse::new(make_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn decode_attachment(body: &ChatRequest) -> Result<Option<ImageAttachment>, String> {
    let Some(encoded) = &body.image else {
        return Ok(None);
    };
    // Tolerate data-URL prefixes from browser clients.
    let raw = encoded.rsplit(',').next().unwrap_or(encoded);
    let data = base64::engine::general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|_| "image must be valid base64".to_string())?;
    Ok(Some(ImageAttachment {
        data,
        mime_type: body.image_mime_type.clone(),
    }))
}

/// Shared admission check.  On rejection, builds the structured 429.
pub async fn check_quota(
    state: &AppState,
    user_id: &str,
    wants_image: bool,
) -> Result<(), Response> {
    let decision = state.ledger.check(user_id, wants_image).await;
    if decision.allowed {
        return Ok(());
    }
    Err((
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "daily_quota_exceeded",
            "remaining": decision.remaining,
            "next_reset": crate::runtime::quota::next_reset(chrono::Utc::now()),
        })),
    )
        .into_response())
}

/// Turn the pipeline's event channel into an SSE stream.  The stream
/// ends when the channel closes, i.e. after the terminal event.
pub fn make_sse_stream(
    mut rx: tokio::sync::mpsc::Receiver<TurnEvent>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().event(event.kind()).data(data));
        }
    }
}
