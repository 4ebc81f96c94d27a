//! User profile endpoints.
//!
//! - `GET  /v1/profile`          — full stored profile
//! - `PUT  /v1/profile`          — explicit edits (replace provided fields)
//! - `GET  /v1/profile/summary`  — the preference summary used in prompts
//! - `GET  /v1/profile/stats`    — cooking history aggregates
//! - `POST /v1/profile/feedback` — record a recipe rating
//! - `POST /v1/profile/sessions` — record a cooking session

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use chrono::Utc;
use serde::Deserialize;

use sous_domain::profile::{
    Allergy, CookingSession, Cuisine, DietaryRestriction, HealthGoal, RecipeFeedback, SkillLevel,
};

use crate::api::api_error;
use crate::api::auth::SessionClaims;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An explicit profile edit.  Unlike extraction-driven merges, a
/// provided field REPLACES the stored value; absent fields are left
/// alone.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub dietary_restrictions: Option<Vec<DietaryRestriction>>,
    #[serde(default)]
    pub allergies: Option<Vec<Allergy>>,
    #[serde(default)]
    pub dislikes: Option<Vec<String>>,
    #[serde(default)]
    pub favorite_ingredients: Option<Vec<String>>,
    #[serde(default)]
    pub preferred_cuisines: Option<Vec<Cuisine>>,
    #[serde(default)]
    pub skill_level: Option<SkillLevel>,
    #[serde(default)]
    pub available_cooking_time: Option<u32>,
    #[serde(default)]
    pub family_size: Option<u32>,
    #[serde(default)]
    pub health_goals: Option<Vec<HealthGoal>>,
    #[serde(default)]
    pub spice_tolerance: Option<u8>,
    #[serde(default)]
    pub sweetness_preference: Option<u8>,
    #[serde(default)]
    pub kitchen_equipment: Option<Vec<String>>,
    #[serde(default)]
    pub daily_calorie_target: Option<u32>,
    #[serde(default)]
    pub protein_target: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub recipe_name: String,
    /// 1 ..= 5 stars.
    pub rating: u8,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub recipe_name: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub success: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> impl IntoResponse {
    Json(serde_json::json!(state.profiles.get_or_create(&claims.sub).await))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(body): Json<UpdateProfileRequest>,
) -> Response {
    // Numeric fields keep the extraction bounds; an explicit edit
    // outside them is a client error rather than a silent drop.
    if let Some(t) = body.available_cooking_time {
        if !(1..=180).contains(&t) {
            return api_error(StatusCode::BAD_REQUEST, "available_cooking_time must be 1-180");
        }
    }
    if let Some(n) = body.family_size {
        if !(1..=20).contains(&n) {
            return api_error(StatusCode::BAD_REQUEST, "family_size must be 1-20");
        }
    }
    for (value, field) in [
        (body.spice_tolerance, "spice_tolerance"),
        (body.sweetness_preference, "sweetness_preference"),
    ] {
        if let Some(v) = value {
            if !(1..=5).contains(&v) {
                return api_error(StatusCode::BAD_REQUEST, format!("{field} must be 1-5"));
            }
        }
    }
    if let Some(kcal) = body.daily_calorie_target {
        if !(800..=5000).contains(&kcal) {
            return api_error(StatusCode::BAD_REQUEST, "daily_calorie_target must be 800-5000");
        }
    }
    if let Some(grams) = body.protein_target {
        if !(10..=300).contains(&grams) {
            return api_error(StatusCode::BAD_REQUEST, "protein_target must be 10-300");
        }
    }

    let updated = state
        .profiles
        .update(&claims.sub, move |profile| {
            if let Some(v) = body.dietary_restrictions {
                profile.dietary_restrictions = v;
            }
            if let Some(v) = body.allergies {
                profile.allergies = v;
            }
            if let Some(v) = body.dislikes {
                profile.dislikes = v;
            }
            if let Some(v) = body.favorite_ingredients {
                profile.favorite_ingredients = v;
            }
            if let Some(v) = body.preferred_cuisines {
                profile.preferred_cuisines = v;
            }
            if let Some(v) = body.skill_level {
                profile.skill_level = Some(v);
            }
            if let Some(v) = body.available_cooking_time {
                profile.available_cooking_time = Some(v);
            }
            if let Some(v) = body.family_size {
                profile.family_size = Some(v);
            }
            if let Some(v) = body.health_goals {
                profile.health_goals = v;
            }
            if let Some(v) = body.spice_tolerance {
                profile.spice_tolerance = Some(v);
            }
            if let Some(v) = body.sweetness_preference {
                profile.sweetness_preference = Some(v);
            }
            if let Some(v) = body.kitchen_equipment {
                profile.kitchen_equipment = v;
            }
            if let Some(v) = body.daily_calorie_target {
                profile.daily_calorie_target = Some(v);
            }
            if let Some(v) = body.protein_target {
                profile.protein_target = Some(v);
            }
        })
        .await;

    match updated {
        Some(profile) => Json(serde_json::json!(profile)).into_response(),
        None => api_error(StatusCode::INTERNAL_SERVER_ERROR, "profile update failed"),
    }
}

pub async fn get_summary(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> impl IntoResponse {
    Json(serde_json::json!(state.profiles.summary(&claims.sub).await))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> impl IntoResponse {
    Json(serde_json::json!(state.profiles.stats(&claims.sub).await))
}

pub async fn record_feedback(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(body): Json<FeedbackRequest>,
) -> Response {
    if !(1..=5).contains(&body.rating) {
        return api_error(StatusCode::BAD_REQUEST, "rating must be 1-5");
    }

    let feedback = RecipeFeedback {
        recipe_name: body.recipe_name,
        rating: body.rating,
        comments: body.comments,
        recorded_at: Utc::now(),
    };
    if state.profiles.record_feedback(&claims.sub, feedback).await {
        Json(serde_json::json!({ "recorded": true })).into_response()
    } else {
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "could not record feedback")
    }
}

pub async fn record_session(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(body): Json<SessionRequest>,
) -> Response {
    let session = CookingSession {
        recipe_name: body.recipe_name,
        cooked_at: Utc::now(),
        duration_minutes: body.duration_minutes,
        success: body.success,
        notes: body.notes,
    };
    if state.profiles.record_session(&claims.sub, session).await {
        Json(serde_json::json!({ "recorded": true })).into_response()
    } else {
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "could not record session")
    }
}
