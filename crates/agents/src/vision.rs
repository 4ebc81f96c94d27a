//! Ingredient recognition from photos.

use std::sync::Arc;

use sous_providers::VisionModel;

pub struct IngredientVision {
    model: Arc<dyn VisionModel>,
}

impl IngredientVision {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    /// List the ingredients visible in a photo.  Best-effort; failures
    /// come back as an empty list.
    pub async fn extract_ingredients(&self, image: &[u8], mime_type: &str) -> Vec<String> {
        let reply = match self.model.describe(image, mime_type, EXTRACTION_PROMPT).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "ingredient vision call failed");
                return Vec::new();
            }
        };
        parse_ingredient_list(&reply)
    }
}

const EXTRACTION_PROMPT: &str =
    "この写真に写っている食材をすべて挙げてください。食材名だけを読点区切りで出力し、\
     説明文は付けないでください。例: 鶏肉、玉ねぎ、にんじん";

/// Split a comma-separated ingredient reply, trimming and deduplicating
/// while preserving first-seen order.
pub fn parse_ingredient_list(reply: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for part in reply.split(['、', ',', '，', '\n']) {
        let name = part.trim().trim_end_matches('。');
        if name.is_empty() {
            continue;
        }
        if !seen.iter().any(|s| s == name) {
            seen.push(name.to_owned());
        }
    }
    seen
}
