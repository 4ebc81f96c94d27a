use std::sync::Arc;

use sous_agents::{
    ImageSynthesizer, IngredientVision, IntentClassifier, NutritionAnalyzer, ProfileExtractor,
    RecipeSynthesizer,
};
use sous_domain::config::Config;
use sous_providers::IdentityVerifier;
use sous_storage::{ConversationStore, DocumentStore, ProfileStore};

use crate::api::auth::SessionKeyring;
use crate::runtime::QuotaLedger;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core** — config and the document store backing everything durable
/// - **Stores** — quota ledger, profiles, conversation log
/// - **Pipeline stages** — one service per turn stage
/// - **Auth** — identity verification and session tokens
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub documents: Arc<dyn DocumentStore>,

    // ── Stores ────────────────────────────────────────────────────────
    pub ledger: Arc<QuotaLedger>,
    pub profiles: Arc<ProfileStore>,
    pub conversations: Arc<ConversationStore>,

    // ── Pipeline stages ───────────────────────────────────────────────
    pub classifier: Arc<IntentClassifier>,
    pub extractor: Arc<ProfileExtractor>,
    pub recipes: Arc<RecipeSynthesizer>,
    pub nutrition: Arc<NutritionAnalyzer>,
    pub images: Arc<ImageSynthesizer>,
    pub vision: Arc<IngredientVision>,

    // ── Auth ──────────────────────────────────────────────────────────
    pub verifier: Arc<dyn IdentityVerifier>,
    pub sessions: Arc<SessionKeyring>,
}
