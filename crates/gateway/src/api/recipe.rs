//! Direct recipe generation.
//!
//! `POST /v1/recipe/stream` skips intent classification: the client
//! already knows it wants a recipe and supplies ingredients and/or a
//! dish name directly.  Events stream over SSE exactly as for chat.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use serde::Deserialize;

use sous_domain::recipe::RecipeOverrides;

use crate::api::auth::SessionClaims;
use crate::api::chat::{check_quota, make_sse_stream};
use crate::runtime::{run_recipe, RecipeInput};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecipeRequest {
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub dish_name: Option<String>,
    #[serde(default)]
    pub overrides: Option<RecipeOverrides>,
    #[serde(default)]
    pub with_images: bool,
    #[serde(default = "d_true")]
    pub with_nutrition: bool,
}

fn d_true() -> bool {
    true
}

pub async fn recipe_stream(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(body): Json<RecipeRequest>,
) -> Response {
    if body.ingredients.is_empty() && body.dish_name.is_none() {
        return crate::api::api_error(
            StatusCode::BAD_REQUEST,
            "ingredients or dish_name is required",
        );
    }

    let user_id = claims.sub.clone();
    if let Err(resp) = check_quota(&state, &user_id, body.with_images).await {
        return resp;
    }

    let input = RecipeInput {
        user_id,
        ingredients: body.ingredients,
        dish_name: body.dish_name,
        overrides: body.overrides,
        with_images: body.with_images,
        with_nutrition: body.with_nutrition,
    };

    let rx = run_recipe(state, input);
    Sse::new(make_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}
