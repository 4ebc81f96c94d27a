//! Turn execution — the orchestrator that fans one user message out
//! into classification, recipe synthesis, nutrition analysis and
//! per-step image generation, streaming progress events as it goes.
//!
//! Entry points: [`run_turn`] for chat messages, [`run_recipe`] for
//! direct recipe requests that skip classification.  Both spawn the
//! pipeline and return a channel of [`TurnEvent`]s that always ends
//! with exactly one terminal event (`complete` or `error`).

use futures_util::future::join_all;
use tokio::sync::mpsc;

use sous_domain::error::Result;
use sous_domain::intent::{ExtractedData, IntentKind, IntentResult};
use sous_domain::nutrition::NutritionEstimate;
use sous_domain::recipe::{RecipeOverrides, StepImage};
use sous_domain::stream::TurnEvent;
use sous_storage::ConversationMessage;

use crate::state::AppState;

/// Buffered events before the pipeline back-pressures on the client.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The merge threshold is strict: a patch at exactly this confidence
/// is discarded.
const PROFILE_MERGE_THRESHOLD: f64 = 0.7;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inputs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An image the user attached to a message.
pub struct ImageAttachment {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Input to a single chat turn.
pub struct TurnInput {
    pub user_id: String,
    pub message: String,
    pub image: Option<ImageAttachment>,
    pub with_images: bool,
    pub with_nutrition: bool,
}

/// Input to a direct recipe request (no intent classification).
pub struct RecipeInput {
    pub user_id: String,
    pub ingredients: Vec<String>,
    pub dish_name: Option<String>,
    pub overrides: Option<RecipeOverrides>,
    pub with_images: bool,
    pub with_nutrition: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry points
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Spawn the chat pipeline for one admitted message and return its
/// event stream.  Admission (quota check) must happen before this
/// call; the quota increment fires here once the turn reaches a
/// terminal event.
pub fn run_turn(state: AppState, input: TurnInput) -> mpsc::Receiver<TurnEvent> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let user_id = input.user_id.clone();
        let wants_image = input.with_images;
        finish(&tx, execute_chat(&state, input, &tx).await, &user_id).await;
        state.ledger.increment(&user_id, wants_image).await;
    });
    rx
}

/// Spawn the pipeline for a direct recipe request.
pub fn run_recipe(state: AppState, input: RecipeInput) -> mpsc::Receiver<TurnEvent> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let user_id = input.user_id.clone();
        let wants_image = input.with_images;
        finish(&tx, execute_recipe(&state, input, &tx).await, &user_id).await;
        state.ledger.increment(&user_id, wants_image).await;
    });
    rx
}

/// Emit the single terminal event for a finished pipeline.
async fn finish(tx: &mpsc::Sender<TurnEvent>, outcome: Result<()>, user_id: &str) {
    match outcome {
        Ok(()) => {
            let _ = tx.send(TurnEvent::Complete).await;
        }
        Err(e) => {
            tracing::error!(user = user_id, error = %e, "turn failed");
            let _ = tx
                .send(TurnEvent::Error {
                    message:
                        "申し訳ありません、処理中にエラーが発生しました。もう一度お試しください。"
                            .to_owned(),
                    detail: e.to_string(),
                })
                .await;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn execute_chat(
    state: &AppState,
    input: TurnInput,
    tx: &mpsc::Sender<TurnEvent>,
) -> Result<()> {
    let user_id = input.user_id.as_str();
    let has_image = input.image.is_some();

    state
        .conversations
        .append(user_id, &ConversationMessage::new("user", &input.message))
        .await;

    // ── Intent ───────────────────────────────────────────────────────
    send(tx, TurnEvent::Status { stage: "analyzing_intent".into() }).await;

    let mut result = state.classifier.classify(&input.message, has_image).await;

    // A photo replaces the text as the ingredient source.
    if let Some(attachment) = &input.image {
        let found = state
            .vision
            .extract_ingredients(&attachment.data, &attachment.mime_type)
            .await;
        if !found.is_empty() {
            tracing::info!(user = user_id, count = found.len(), "ingredients recognized from photo");
            result.extracted.ingredients = found;
        }
    }

    send(
        tx,
        TurnEvent::Intent {
            intent: result.intent,
            confidence: result.confidence,
            response_type: result.response_type,
        },
    )
    .await;

    // ── Profile merge (fire and forget) ──────────────────────────────
    spawn_profile_merge(state.clone(), user_id.to_owned(), input.message.clone());

    // ── Chat response ────────────────────────────────────────────────
    let chat_message =
        sous_agents::IntentClassifier::canned_response(result.intent, &result.extracted);
    send(tx, TurnEvent::ChatResponse { message: chat_message.clone() }).await;

    // ── Recipe branch ────────────────────────────────────────────────
    let ingredients_from_photo =
        result.intent == IntentKind::ImageRequest && !result.extracted.ingredients.is_empty();
    if !result.intent.wants_recipe() && !ingredients_from_photo {
        return Ok(());
    }

    send(tx, TurnEvent::Status { stage: "generating_recipe".into() }).await;
    let recipe_text = synthesize_from_intent(state, user_id, &result).await?;
    send(tx, TurnEvent::Recipe { recipe: recipe_text.clone() }).await;

    let (nutrition, images) = fan_out(
        state,
        tx,
        &recipe_text,
        &result.extracted.ingredients,
        input.with_nutrition,
        input.with_images,
    )
    .await;

    record_assistant_turn(state, user_id, &chat_message, recipe_text, nutrition, &images).await;
    Ok(())
}

/// Pick the synthesis entry point from what classification extracted.
async fn synthesize_from_intent(
    state: &AppState,
    user_id: &str,
    result: &IntentResult,
) -> Result<String> {
    let summary = state.profiles.summary(user_id).await;
    let preferences = Some(&summary);
    let ingredients = &result.extracted.ingredients;
    let overrides = overrides_from_extracted(&result.extracted);
    let overrides = overrides.as_ref();

    match (&result.extracted.dish_name, ingredients.is_empty()) {
        (Some(dish), false) => {
            state
                .recipes
                .from_both(dish, ingredients, overrides, preferences)
                .await
        }
        (Some(dish), true) => {
            state
                .recipes
                .from_dish_name(dish, overrides, preferences)
                .await
        }
        (None, _) => state.recipes.from_ingredients(ingredients, preferences).await,
    }
}

/// Turn the classifier's free-text extraction into per-request
/// synthesis overrides.
fn overrides_from_extracted(extracted: &ExtractedData) -> Option<RecipeOverrides> {
    let overrides = RecipeOverrides {
        time_constraint: extracted
            .time_constraint
            .as_deref()
            .and_then(minutes_from_text),
        difficulty: extracted.difficulty_level.clone(),
        cooking_method: extracted.cooking_method.clone(),
    };
    (!overrides.is_empty()).then_some(overrides)
}

/// Pull a minute count out of free text like "30分以内".  Only counts
/// in 1..=180 qualify; anything else stays a non-constraint.
fn minutes_from_text(text: &str) -> Option<u32> {
    if !text.contains('分') {
        return None;
    }
    let head = text.split('分').next()?;
    let reversed: String = head.chars().rev().take_while(char::is_ascii_digit).collect();
    let minutes: u32 = reversed.chars().rev().collect::<String>().parse().ok()?;
    (1..=180).contains(&minutes).then_some(minutes)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Direct recipe pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn execute_recipe(
    state: &AppState,
    input: RecipeInput,
    tx: &mpsc::Sender<TurnEvent>,
) -> Result<()> {
    let user_id = input.user_id.as_str();

    send(tx, TurnEvent::Status { stage: "generating_recipe".into() }).await;

    let summary = state.profiles.summary(user_id).await;
    let preferences = Some(&summary);
    let overrides = input.overrides.as_ref();

    let recipe_text = match (&input.dish_name, input.ingredients.is_empty()) {
        (Some(dish), false) => {
            state
                .recipes
                .from_both(dish, &input.ingredients, overrides, preferences)
                .await?
        }
        (Some(dish), true) => {
            state
                .recipes
                .from_dish_name(dish, overrides, preferences)
                .await?
        }
        (None, _) => {
            state
                .recipes
                .from_ingredients(&input.ingredients, preferences)
                .await?
        }
    };
    send(tx, TurnEvent::Recipe { recipe: recipe_text.clone() }).await;

    let (nutrition, images) = fan_out(
        state,
        tx,
        &recipe_text,
        &input.ingredients,
        input.with_nutrition,
        input.with_images,
    )
    .await;

    let summary_line = input
        .dish_name
        .clone()
        .unwrap_or_else(|| "レシピを生成しました".to_owned());
    record_assistant_turn(state, user_id, &summary_line, recipe_text, nutrition, &images).await;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared stages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the nutrition and image branches concurrently after recipe
/// synthesis.  Each branch emits its own events; the fan-in happens
/// here before the terminal event.
async fn fan_out(
    state: &AppState,
    tx: &mpsc::Sender<TurnEvent>,
    recipe_text: &str,
    ingredients: &[String],
    with_nutrition: bool,
    with_images: bool,
) -> (Option<NutritionEstimate>, Vec<StepImage>) {
    let steps = sous_agents::steps::extract_steps(recipe_text);

    let nutrition_branch = async {
        if !with_nutrition {
            return None;
        }
        send(tx, TurnEvent::Status { stage: "analyzing_nutrition".into() }).await;
        let estimate = state.nutrition.analyze(recipe_text, ingredients).await;
        send(tx, TurnEvent::Nutrition { nutrition: estimate.clone() }).await;
        Some(estimate)
    };

    let image_branch = async {
        if !with_images || steps.is_empty() {
            return Vec::new();
        }
        // Each step announces itself right before its own render, so
        // progress stays interleaved with results on the stream.
        let renders = steps.iter().enumerate().map(|(index, step)| async move {
            send(
                tx,
                TurnEvent::GeneratingImage {
                    step_index: index,
                    step_text: step.clone(),
                },
            )
            .await;
            match state.images.generate_one(step).await {
                Ok(url) => {
                    send(
                        tx,
                        TurnEvent::Image {
                            step_index: index,
                            url: url.clone(),
                        },
                    )
                    .await;
                    StepImage {
                        index,
                        step_text: step.clone(),
                        url: Some(url),
                        error: None,
                    }
                }
                Err(message) => {
                    send(
                        tx,
                        TurnEvent::ImageError {
                            step_index: index,
                            message: message.clone(),
                        },
                    )
                    .await;
                    StepImage {
                        index,
                        step_text: step.clone(),
                        url: None,
                        error: Some(message),
                    }
                }
            }
        });
        join_all(renders).await
    };

    tokio::join!(nutrition_branch, image_branch)
}

async fn record_assistant_turn(
    state: &AppState,
    user_id: &str,
    content: &str,
    recipe_text: String,
    nutrition: Option<NutritionEstimate>,
    images: &[StepImage],
) {
    let mut record = ConversationMessage::new("assistant", content);
    record.recipe = Some(recipe_text);
    record.nutrition = nutrition;
    record.images = images.iter().filter_map(|i| i.url.clone()).collect();
    state.conversations.append(user_id, &record).await;
}

/// Mine the message for durable preferences off the hot path.  The
/// stream never waits on this task and its failure stays internal.
fn spawn_profile_merge(state: AppState, user_id: String, message: String) {
    tokio::spawn(async move {
        let patch = state.extractor.extract(&message).await;
        if patch.is_empty() || patch.confidence <= PROFILE_MERGE_THRESHOLD {
            return;
        }
        if state.profiles.merge_patch(&user_id, &patch).await {
            tracing::info!(user = %user_id, confidence = patch.confidence, "profile patch merged");
        }
    });
}

async fn send(tx: &mpsc::Sender<TurnEvent>, event: TurnEvent) {
    // A closed channel means the client went away; the pipeline keeps
    // running to completion regardless.
    let _ = tx.send(event).await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
