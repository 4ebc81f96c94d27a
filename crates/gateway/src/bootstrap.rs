//! Startup wiring: config validation, model clients, stores, ledger.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use sous_agents::{
    ImageSynthesizer, IngredientVision, IntentClassifier, NutritionAnalyzer, ProfileExtractor,
    RecipeSynthesizer,
};
use sous_domain::config::{Config, ConfigSeverity, StorageBackend};
use sous_providers::gemini::{GeminiImage, GeminiText, GeminiVision};
use sous_providers::identity::GoogleVerifier;
use sous_storage::{ConversationStore, DocumentStore, FirestoreStore, MemoryStore, ProfileStore};

use crate::api::auth::SessionKeyring;
use crate::runtime::quota::{DurableBackend, MemoryBackend};
use crate::runtime::QuotaLedger;
use crate::state::AppState;

/// Build the shared [`AppState`] from a validated configuration.
///
/// Fails fast on config errors; warnings are logged and startup
/// continues.  A Firestore backend that never becomes ready degrades to
/// the in-memory store for the life of the process.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ─────────────────────────────────────────────
    let mut fatal = false;
    for issue in config.validate() {
        match issue.severity {
            ConfigSeverity::Error => {
                fatal = true;
                tracing::error!(field = %issue.field, "{}", issue.message);
            }
            ConfigSeverity::Warning => {
                tracing::warn!(field = %issue.field, "{}", issue.message);
            }
        }
    }
    if fatal {
        anyhow::bail!("configuration has errors, refusing to start");
    }

    // ── Model clients ─────────────────────────────────────────────────
    let api_key = std::env::var(&config.llm.api_key_env).unwrap_or_default();

    let text_model = Arc::new(
        GeminiText::new(&config.llm, api_key.clone()).context("text model client")?,
    );
    let vision_model = Arc::new(
        GeminiVision::new(&config.llm, api_key.clone()).context("vision model client")?,
    );
    let image_model =
        Arc::new(GeminiImage::new(&config.llm, api_key).context("image model client")?);
    tracing::info!(
        text = %config.llm.text_model,
        vision = %config.llm.vision_model,
        image = %config.llm.image_model,
        "model clients ready"
    );

    // ── Document store ────────────────────────────────────────────────
    let documents = build_document_store(&config).await?;
    tracing::info!(backend = documents.backend(), "document store ready");

    // ── Quota ledger ──────────────────────────────────────────────────
    // The durable ledger rides on the document store; if storage fell
    // back to memory, the ledger does too.
    let ledger = if documents.backend() == "firestore" {
        Arc::new(QuotaLedger::new(
            Arc::new(DurableBackend::new(documents.clone())),
            config.limits.admins.iter().cloned(),
        ))
    } else {
        Arc::new(QuotaLedger::new(
            Arc::new(MemoryBackend::new()),
            config.limits.admins.iter().cloned(),
        ))
    };
    tracing::info!(
        backend = ledger.backend_tag(),
        admins = config.limits.admins.len(),
        "quota ledger ready"
    );

    // ── Auth ──────────────────────────────────────────────────────────
    let secret = match std::env::var(&config.auth.secret_env) {
        Ok(s) if !s.is_empty() => s.into_bytes(),
        _ => {
            tracing::warn!(
                env = %config.auth.secret_env,
                "session secret env unset — using a random per-process secret, \
                 sessions will not survive a restart"
            );
            let mut secret = uuid::Uuid::new_v4().as_bytes().to_vec();
            secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
            secret
        }
    };
    let sessions = Arc::new(SessionKeyring::new(
        secret,
        config.auth.session_ttl_hours as u32,
    ));
    let verifier = Arc::new(
        GoogleVerifier::new(config.auth.google_client_id.clone()).context("identity verifier")?,
    );

    Ok(AppState {
        config: config.clone(),
        documents: documents.clone(),
        ledger,
        profiles: Arc::new(ProfileStore::new(documents.clone())),
        conversations: Arc::new(ConversationStore::new(documents)),
        classifier: Arc::new(IntentClassifier::new(text_model.clone())),
        extractor: Arc::new(ProfileExtractor::new(text_model.clone())),
        recipes: Arc::new(RecipeSynthesizer::new(text_model.clone())),
        nutrition: Arc::new(NutritionAnalyzer::new(text_model)),
        images: Arc::new(ImageSynthesizer::new(image_model)),
        vision: Arc::new(IngredientVision::new(vision_model)),
        verifier,
        sessions,
    })
}

/// Pick the document store.  Firestore is polled for readiness; if it
/// never answers, the process runs on the in-memory store instead.
async fn build_document_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if config.storage.backend != StorageBackend::Firestore {
        return Ok(Arc::new(MemoryStore::new()));
    }

    let firestore = Arc::new(FirestoreStore::new(&config.storage).context("firestore client")?);
    let interval = Duration::from_millis(config.storage.readiness_interval_ms);

    for attempt in 1..=config.storage.readiness_attempts {
        if firestore.is_ready().await {
            return Ok(firestore);
        }
        tracing::warn!(
            attempt,
            of = config.storage.readiness_attempts,
            "firestore not ready"
        );
        tokio::time::sleep(interval).await;
    }

    tracing::warn!("firestore never became ready — falling back to the in-memory store");
    Ok(Arc::new(MemoryStore::new()))
}
