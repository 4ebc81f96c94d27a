use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model adapters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the Gemini REST adapters.
///
/// The API key is always read from an env var, never from the config
/// file itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Env var holding the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Model used for classification, recipes, and nutrition.
    #[serde(default = "d_text_model")]
    pub text_model: String,
    /// Model used for ingredient extraction from photos.
    #[serde(default = "d_vision_model")]
    pub vision_model: String,
    /// Model used for step illustrations.
    #[serde(default = "d_image_model")]
    pub image_model: String,
    /// Request timeout for text/vision calls, in milliseconds.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            text_model: d_text_model(),
            vision_model: d_vision_model(),
            image_model: d_image_model(),
            timeout_ms: 30_000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn d_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn d_text_model() -> String {
    "gemini-2.0-flash".into()
}
fn d_vision_model() -> String {
    "gemini-2.0-flash".into()
}
fn d_image_model() -> String {
    "gemini-2.0-flash-exp-image-generation".into()
}
fn d_timeout_ms() -> u64 {
    30_000
}
