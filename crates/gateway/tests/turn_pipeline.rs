//! End-to-end pipeline tests over in-memory stores and scripted models.
//!
//! Each test hand-builds an `AppState`, runs a turn through the real
//! orchestrator, and asserts on the resulting event stream.

use std::sync::Arc;
use std::time::Duration;

use sous_agents::{
    ImageSynthesizer, IngredientVision, IntentClassifier, NutritionAnalyzer, ProfileExtractor,
    RecipeSynthesizer,
};
use sous_domain::config::Config;
use sous_domain::error::{Error, Result};
use sous_domain::intent::IntentKind;
use sous_domain::stream::TurnEvent;
use sous_providers::{
    GeneratedImage, IdentityVerifier, ImageModel, TextModel, VerifiedIdentity, VisionModel,
};
use sous_storage::{ConversationStore, MemoryStore, ProfileStore};

use sous_gateway::api::auth::SessionKeyring;
use sous_gateway::api::chat::check_quota;
use sous_gateway::runtime::quota::MemoryBackend;
use sous_gateway::runtime::{run_recipe, run_turn, QuotaLedger, RecipeInput, TurnInput};
use sous_gateway::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted collaborators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Text model that always replies with the same string.
struct FixedText(String);

#[async_trait::async_trait]
impl TextModel for FixedText {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.clone())
    }
    fn model_id(&self) -> &str {
        "fixed"
    }
}

/// Text model that is always down.
struct DownText;

#[async_trait::async_trait]
impl TextModel for DownText {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::Http("connection refused".into()))
    }
    fn model_id(&self) -> &str {
        "down"
    }
}

/// Text model that records every prompt it receives.
struct RecordingText {
    prompts: parking_lot::Mutex<Vec<String>>,
    reply: String,
}

#[async_trait::async_trait]
impl TextModel for RecordingText {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_owned());
        Ok(self.reply.clone())
    }
    fn model_id(&self) -> &str {
        "recording"
    }
}

/// Image model returning a tiny PNG for every prompt.
struct TinyImage;

#[async_trait::async_trait]
impl ImageModel for TinyImage {
    async fn render(&self, _prompt: &str) -> Result<GeneratedImage> {
        Ok(GeneratedImage {
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
            mime_type: "image/png".into(),
        })
    }
    fn model_id(&self) -> &str {
        "tiny"
    }
}

/// Image model that never answers.
struct HangingImage;

#[async_trait::async_trait]
impl ImageModel for HangingImage {
    async fn render(&self, _prompt: &str) -> Result<GeneratedImage> {
        std::future::pending().await
    }
    fn model_id(&self) -> &str {
        "hanging"
    }
}

struct FixedVision(String);

#[async_trait::async_trait]
impl VisionModel for FixedVision {
    async fn describe(&self, _image: &[u8], _mime: &str, _prompt: &str) -> Result<String> {
        Ok(self.0.clone())
    }
    fn model_id(&self) -> &str {
        "fixed-vision"
    }
}

struct StaticVerifier;

#[async_trait::async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, _credential: &str) -> Result<VerifiedIdentity> {
        Ok(VerifiedIdentity {
            subject: "tester".into(),
            email: None,
            name: None,
            picture: None,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixture
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const CLASSIFIER_REPLY: &str =
    r#"{"intent": "text_ingredients", "confidence": 0.9, "ingredients": ["鶏肉", "玉ねぎ"], "dish_name": null}"#;

const RECIPE_REPLY: &str = "鶏肉と玉ねぎの炒め物\n\n材料:\n- 鶏肉\n- 玉ねぎ\n\n作り方:\n1. 鶏肉を一口大に切る\n2. 玉ねぎと一緒に炒める";

const NUTRITION_REPLY: &str = r#"{"calories_per_serving": 520, "servings": 2, "macronutrients": {"protein_g": 30.0, "carbs_g": 10.0, "fat_g": 20.0, "fiber_g": 2.0}, "health_score": 8, "balance_score": 7}"#;

fn build_state(
    classifier_model: Arc<dyn TextModel>,
    recipe_model: Arc<dyn TextModel>,
    images: ImageSynthesizer,
) -> AppState {
    let documents: Arc<dyn sous_storage::DocumentStore> = Arc::new(MemoryStore::new());
    let ledger = Arc::new(QuotaLedger::new(
        Arc::new(MemoryBackend::new()),
        Vec::<String>::new(),
    ));

    AppState {
        config: Arc::new(Config::default()),
        documents: documents.clone(),
        ledger,
        profiles: Arc::new(ProfileStore::new(documents.clone())),
        conversations: Arc::new(ConversationStore::new(documents)),
        classifier: Arc::new(IntentClassifier::new(classifier_model)),
        extractor: Arc::new(ProfileExtractor::new(Arc::new(DownText))),
        recipes: Arc::new(RecipeSynthesizer::new(recipe_model)),
        nutrition: Arc::new(NutritionAnalyzer::new(Arc::new(FixedText(
            NUTRITION_REPLY.into(),
        )))),
        images: Arc::new(images),
        vision: Arc::new(IngredientVision::new(Arc::new(FixedVision(
            "鶏肉、にんじん".into(),
        )))),
        verifier: Arc::new(StaticVerifier),
        sessions: Arc::new(SessionKeyring::new(b"test-secret".to_vec(), 1)),
    }
}

fn default_state() -> AppState {
    build_state(
        Arc::new(FixedText(CLASSIFIER_REPLY.into())),
        Arc::new(FixedText(RECIPE_REPLY.into())),
        ImageSynthesizer::new(Arc::new(TinyImage)),
    )
}

async fn collect(mut rx: tokio::sync::mpsc::Receiver<TurnEvent>) -> Vec<TurnEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn chat_input(message: &str, with_images: bool) -> TurnInput {
    TurnInput {
        user_id: "tester".into(),
        message: message.into(),
        image: None,
        with_images,
        with_nutrition: true,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn full_turn_streams_ordered_events() {
    let state = default_state();
    let events = collect(run_turn(state, chat_input("鶏肉と玉ねぎで何か作って", true))).await;

    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();

    // The sequential prefix is fixed; the nutrition and image branches
    // interleave after the recipe event.
    assert_eq!(
        &kinds[..5],
        &["status", "intent", "chat_response", "status", "recipe"]
    );

    // The recipe has two numbered steps, so two of each image event.
    let count = |k: &str| kinds.iter().filter(|x| **x == k).count();
    assert_eq!(count("generating_image"), 2);
    assert_eq!(count("image"), 2);
    assert_eq!(count("nutrition"), 1);
    assert_eq!(count("image_error"), 0);

    // Exactly one terminal event, and it is last.
    assert!(matches!(events.last(), Some(TurnEvent::Complete)));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn intent_event_carries_model_classification() {
    let state = default_state();
    let events = collect(run_turn(state, chat_input("鶏肉と玉ねぎで何か作って", false))).await;

    let intent = events
        .iter()
        .find_map(|e| match e {
            TurnEvent::Intent { intent, confidence, .. } => Some((*intent, *confidence)),
            _ => None,
        })
        .unwrap();
    assert_eq!(intent, (IntentKind::TextIngredients, 0.9));

    // Nutrition is validated from the scripted reply, not defaulted.
    let calories = events
        .iter()
        .find_map(|e| match e {
            TurnEvent::Nutrition { nutrition } => Some(nutrition.calories_per_serving),
            _ => None,
        })
        .unwrap();
    assert_eq!(calories, 520);
}

#[tokio::test]
async fn model_outage_still_yields_a_recipe_via_fallback() {
    let state = build_state(
        Arc::new(DownText),
        Arc::new(FixedText(RECIPE_REPLY.into())),
        ImageSynthesizer::new(Arc::new(TinyImage)),
    );
    let events = collect(run_turn(state, chat_input("鶏肉でなにか作りたい", false))).await;

    let intent = events
        .iter()
        .find_map(|e| match e {
            TurnEvent::Intent { intent, confidence, .. } => Some((*intent, *confidence)),
            _ => None,
        })
        .unwrap();
    assert_eq!(intent, (IntentKind::TextIngredients, 0.7));

    assert!(events.iter().any(|e| matches!(e, TurnEvent::Recipe { .. })));
    assert!(matches!(events.last(), Some(TurnEvent::Complete)));
}

#[tokio::test]
async fn casual_chat_skips_the_recipe_stage() {
    let state = build_state(
        Arc::new(FixedText(
            r#"{"intent": "casual_chat", "confidence": 0.95}"#.into(),
        )),
        Arc::new(FixedText(RECIPE_REPLY.into())),
        ImageSynthesizer::new(Arc::new(TinyImage)),
    );
    let events = collect(run_turn(state, chat_input("こんにちは", true))).await;

    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["status", "intent", "chat_response", "complete"]);
}

#[tokio::test]
async fn image_timeout_isolates_per_step_and_completes() {
    let state = build_state(
        Arc::new(FixedText(CLASSIFIER_REPLY.into())),
        Arc::new(FixedText(RECIPE_REPLY.into())),
        ImageSynthesizer::with_timeout(Arc::new(HangingImage), Duration::from_millis(50)),
    );
    let events = collect(run_turn(state, chat_input("鶏肉と玉ねぎで何か作って", true))).await;

    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
    let count = |k: &str| kinds.iter().filter(|x| **x == k).count();

    // Both steps time out, yet the recipe and nutrition still arrive
    // and the stream completes normally.
    assert_eq!(count("image_error"), 2);
    assert_eq!(count("image"), 0);
    assert_eq!(count("recipe"), 1);
    assert_eq!(count("nutrition"), 1);
    assert!(matches!(events.last(), Some(TurnEvent::Complete)));
}

#[tokio::test]
async fn pipeline_failure_emits_single_error_terminal() {
    let state = build_state(
        Arc::new(FixedText(CLASSIFIER_REPLY.into())),
        Arc::new(DownText),
        ImageSynthesizer::new(Arc::new(TinyImage)),
    );
    let events = collect(run_turn(state.clone(), chat_input("鶏肉で何か作って", false))).await;

    assert!(matches!(events.last(), Some(TurnEvent::Error { .. })));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    // A failed turn still consumed one unit of the daily quota.
    let status = state.ledger.status("tester").await;
    assert_eq!(status.total_used, 1);
}

#[tokio::test]
async fn completed_turn_increments_the_ledger() {
    let state = default_state();
    let events = collect(run_turn(
        state.clone(),
        chat_input("鶏肉と玉ねぎで何か作って", true),
    ))
    .await;
    assert!(matches!(events.last(), Some(TurnEvent::Complete)));

    let status = state.ledger.status("tester").await;
    assert_eq!(status.total_used, 1);
    assert_eq!(status.image_used, 1);
}

#[tokio::test]
async fn exhausted_quota_is_rejected_before_any_stage() {
    let state = default_state();
    for _ in 0..10 {
        state.ledger.increment("tester", false).await;
    }

    let rejection = check_quota(&state, "tester", false).await;
    let resp = rejection.expect_err("eleventh request must be rejected");
    assert_eq!(resp.status(), axum::http::StatusCode::TOO_MANY_REQUESTS);

    // Another user is unaffected.
    assert!(check_quota(&state, "someone-else", false).await.is_ok());
}

#[tokio::test]
async fn direct_recipe_request_skips_classification() {
    let state = default_state();
    let events = collect(run_recipe(
        state,
        RecipeInput {
            user_id: "tester".into(),
            ingredients: vec!["鶏肉".into(), "玉ねぎ".into()],
            dish_name: None,
            overrides: None,
            with_images: false,
            with_nutrition: true,
        },
    ))
    .await;

    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
    assert!(!kinds.contains(&"intent"));
    assert!(!kinds.contains(&"chat_response"));
    assert_eq!(&kinds[..2], &["status", "recipe"]);
    assert!(matches!(events.last(), Some(TurnEvent::Complete)));
}

#[tokio::test]
async fn chat_extraction_constrains_the_recipe_prompt() {
    let recipe_model = Arc::new(RecordingText {
        prompts: parking_lot::Mutex::new(Vec::new()),
        reply: RECIPE_REPLY.into(),
    });
    let classifier_reply = r#"{"intent": "recipe_request", "confidence": 0.9, "ingredients": [], "dish_name": "カレー", "cooking_method": "煮込む", "time_constraint": "30分以内", "difficulty_level": "簡単"}"#;
    let state = build_state(
        Arc::new(FixedText(classifier_reply.into())),
        recipe_model.clone(),
        ImageSynthesizer::new(Arc::new(TinyImage)),
    );

    let events = collect(run_turn(
        state,
        chat_input("カレーを30分以内で簡単に煮込みたい", false),
    ))
    .await;
    assert!(matches!(events.last(), Some(TurnEvent::Complete)));

    // The classifier's free-text extraction lands in the synthesis prompt.
    let prompt = recipe_model.prompts.lock().last().cloned().unwrap();
    assert!(prompt.contains("カレー"));
    assert!(prompt.contains("今回は30分以内で作れること"));
    assert!(prompt.contains("調理法の希望: 煮込む"));
    assert!(prompt.contains("難易度の希望: 簡単"));

    // And the interim chat response acknowledges it.
    let chat = events
        .iter()
        .find_map(|e| match e {
            TurnEvent::ChatResponse { message } => Some(message.clone()),
            _ => None,
        })
        .unwrap();
    assert!(chat.contains("煮込むで調理する方向"));
    assert!(chat.contains("30分以内を考慮"));
}

#[tokio::test]
async fn each_step_announcement_precedes_its_own_image() {
    let state = default_state();
    let events = collect(run_recipe(
        state,
        RecipeInput {
            user_id: "tester".into(),
            ingredients: vec!["鶏肉".into(), "玉ねぎ".into()],
            dish_name: None,
            overrides: None,
            with_images: true,
            with_nutrition: false,
        },
    ))
    .await;

    // Keep only the image pipeline, as (kind, step_index) pairs.
    let flow: Vec<(&str, usize)> = events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::GeneratingImage { step_index, .. } => Some(("generating", *step_index)),
            TurnEvent::Image { step_index, .. } => Some(("image", *step_index)),
            TurnEvent::ImageError { step_index, .. } => Some(("error", *step_index)),
            _ => None,
        })
        .collect();

    // Announcements interleave with results instead of all arriving
    // up front.
    assert_eq!(
        flow,
        vec![("generating", 0), ("image", 0), ("generating", 1), ("image", 1)]
    );
}

#[tokio::test]
async fn profile_targets_are_bounded_and_stored() {
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::{Extension, Json};
    use sous_gateway::api::auth::SessionClaims;
    use sous_gateway::api::profile::{update_profile, UpdateProfileRequest};

    let state = default_state();
    let claims = SessionClaims {
        sub: "tester".into(),
        email: None,
        name: None,
        exp: i64::MAX,
    };

    // Out-of-range targets are client errors, not silent drops.
    let resp = update_profile(
        State(state.clone()),
        Extension(claims.clone()),
        Json(UpdateProfileRequest {
            daily_calorie_target: Some(200),
            ..Default::default()
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = update_profile(
        State(state.clone()),
        Extension(claims.clone()),
        Json(UpdateProfileRequest {
            protein_target: Some(999),
            ..Default::default()
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // In-range targets persist and feed the preference summary.
    let resp = update_profile(
        State(state.clone()),
        Extension(claims),
        Json(UpdateProfileRequest {
            daily_calorie_target: Some(1800),
            protein_target: Some(90),
            ..Default::default()
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let summary = state.profiles.summary("tester").await;
    assert_eq!(summary.daily_calorie_target, Some(1800));
    assert_eq!(summary.protein_target, Some(90));
}

#[tokio::test]
async fn turn_is_recorded_in_the_conversation_log() {
    let state = default_state();
    let events = collect(run_turn(
        state.clone(),
        chat_input("鶏肉と玉ねぎで何か作って", false),
    ))
    .await;
    assert!(matches!(events.last(), Some(TurnEvent::Complete)));

    let messages = state.conversations.list("tester", 10).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[1].role, "assistant");
    assert!(messages[1].recipe.is_some());
}
