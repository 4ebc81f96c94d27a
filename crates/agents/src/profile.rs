//! Preference extraction from conversation.
//!
//! Each message may yield a [`ProfilePatch`].  A cheap pre-filter skips
//! the model call for messages that cannot carry preferences, and the
//! model reply is filtered against the closed vocabularies before a
//! patch is built.  Out-of-range numeric values are DROPPED, not
//! clamped: "20人前" is probably real, "200人前" is probably a typo,
//! and writing a clamped guess into the profile would be worse than
//! writing nothing.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use sous_domain::profile::{
    Allergy, Cuisine, DietaryRestriction, HealthGoal, ProfilePatch, SkillLevel,
};
use sous_providers::extract::first_json_object;
use sous_providers::TextModel;

/// Messages shorter than this can't carry a preference worth a call.
const MIN_MESSAGE_CHARS: usize = 10;

/// Bare acknowledgements, matched after trimming.
const ACK_PHRASES: &[&str] = &[
    "ありがとう",
    "ありがとうございます",
    "ありがとうございました",
    "わかった",
    "わかりました",
    "了解",
    "了解です",
    "はい",
    "うん",
    "OK",
    "ok",
    "オッケー",
    "いいね",
    "そうですね",
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model reply shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Unvalidated extraction as the model produced it.  Numeric fields
/// arrive as raw JSON values so int/float/string sloppiness can be
/// coerced in one place.
#[derive(Debug, Default, Deserialize)]
pub struct RawExtraction {
    #[serde(default)]
    dietary_restrictions: Vec<String>,
    #[serde(default)]
    allergies: Vec<String>,
    #[serde(default)]
    dislikes: Vec<String>,
    #[serde(default)]
    favorite_ingredients: Vec<String>,
    #[serde(default)]
    preferred_cuisines: Vec<String>,
    #[serde(default)]
    skill_level: Option<String>,
    #[serde(default)]
    available_cooking_time: Option<Value>,
    #[serde(default)]
    family_size: Option<Value>,
    #[serde(default)]
    health_goals: Vec<String>,
    #[serde(default)]
    spice_tolerance: Option<Value>,
    #[serde(default)]
    sweetness_preference: Option<Value>,
    #[serde(default)]
    kitchen_equipment: Vec<String>,
    #[serde(default)]
    confidence: f64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Extractor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ProfileExtractor {
    model: Arc<dyn TextModel>,
}

impl ProfileExtractor {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Extract a validated patch from one message.  All failure modes
    /// yield an empty patch; this path never errors.
    pub async fn extract(&self, message: &str) -> ProfilePatch {
        if !worth_extracting(message) {
            return ProfilePatch::default();
        }

        let reply = match self.model.generate(&extraction_prompt(message)).await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "profile extraction call failed");
                return ProfilePatch::default();
            }
        };

        let raw = match first_json_object(&reply)
            .and_then(|json| serde_json::from_str::<RawExtraction>(json).ok())
        {
            Some(raw) => raw,
            None => {
                tracing::debug!("unparseable profile extraction reply");
                return ProfilePatch::default();
            }
        };

        validate(raw)
    }
}

/// Pre-filter: skip trivially preference-free messages.
pub fn worth_extracting(message: &str) -> bool {
    let trimmed = message.trim();
    if trimmed.chars().count() < MIN_MESSAGE_CHARS {
        return false;
    }
    !ACK_PHRASES.contains(&trimmed)
}

fn extraction_prompt(message: &str) -> String {
    format!(
        "次のメッセージから料理の好みに関する情報だけを抽出してください。\
         推測はせず、明示されたものだけを拾うこと。\n\n\
         使える値:\n\
         dietary_restrictions: vegan, vegetarian, pescatarian, halal, kosher, gluten_free, dairy_free, low_carb, keto\n\
         allergies: nuts, shellfish, dairy, eggs, soy, gluten, fish\n\
         skill_level: beginner, intermediate, advanced\n\
         preferred_cuisines: japanese, italian, chinese, french, korean, thai, indian\n\
         health_goals: diet, muscle_gain, low_sodium, high_protein\n\n\
         次のJSONだけを出力してください(該当なしのフィールドは省略):\n\
         {{\"dietary_restrictions\": [], \"allergies\": [], \"dislikes\": [], \
         \"favorite_ingredients\": [], \"preferred_cuisines\": [], \"skill_level\": null, \
         \"available_cooking_time\": null, \"family_size\": null, \"health_goals\": [], \
         \"spice_tolerance\": null, \"sweetness_preference\": null, \
         \"kitchen_equipment\": [], \"confidence\": 0.0}}\n\n\
         メッセージ: {message}"
    )
}

/// Filter a raw extraction down to the closed vocabularies and valid
/// numeric ranges.
pub fn validate(raw: RawExtraction) -> ProfilePatch {
    ProfilePatch {
        dietary_restrictions: raw
            .dietary_restrictions
            .iter()
            .filter_map(|t| DietaryRestriction::from_tag(t))
            .collect(),
        allergies: raw.allergies.iter().filter_map(|t| Allergy::from_tag(t)).collect(),
        dislikes: clean_strings(raw.dislikes),
        favorite_ingredients: clean_strings(raw.favorite_ingredients),
        preferred_cuisines: raw
            .preferred_cuisines
            .iter()
            .filter_map(|t| Cuisine::from_tag(t))
            .collect(),
        skill_level: raw.skill_level.as_deref().and_then(SkillLevel::from_tag),
        available_cooking_time: int_in_range(raw.available_cooking_time.as_ref(), 1, 180)
            .map(|v| v as u32),
        family_size: int_in_range(raw.family_size.as_ref(), 1, 20).map(|v| v as u32),
        health_goals: raw
            .health_goals
            .iter()
            .filter_map(|t| HealthGoal::from_tag(t))
            .collect(),
        spice_tolerance: int_in_range(raw.spice_tolerance.as_ref(), 1, 5).map(|v| v as u8),
        sweetness_preference: int_in_range(raw.sweetness_preference.as_ref(), 1, 5)
            .map(|v| v as u8),
        kitchen_equipment: clean_strings(raw.kitchen_equipment),
        confidence: raw.confidence.clamp(0.0, 1.0),
    }
}

/// Coerce a JSON value to an integer and keep it only when in range.
fn int_in_range(v: Option<&Value>, min: i64, max: i64) -> Option<i64> {
    let n = v?;
    let n = n
        .as_i64()
        .or_else(|| n.as_f64().map(|f| f as i64))
        .or_else(|| n.as_str().and_then(|s| s.trim().parse().ok()))?;
    (min..=max).contains(&n).then_some(n)
}

fn clean_strings(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sous_domain::error::{Error, Result};

    struct CountingModel {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TextModel for CountingModel {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(Error::Http("down".into()))
        }
        fn model_id(&self) -> &str {
            "counting"
        }
    }

    fn raw_from(json: serde_json::Value) -> RawExtraction {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn short_and_ack_messages_skip_the_model() {
        let model = Arc::new(CountingModel {
            calls: Default::default(),
        });
        let extractor = ProfileExtractor::new(model.clone());

        assert!(extractor.extract("はい").await.is_empty());
        assert!(extractor.extract("ありがとうございます").await.is_empty());
        assert_eq!(model.calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        // A long message does reach the model (which fails, so the
        // patch is still empty).
        assert!(extractor.extract("うちは4人家族で辛いものが好きです").await.is_empty());
        assert_eq!(model.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn prefilter_boundary() {
        assert!(!worth_extracting("123456789")); // 9 chars
        assert!(worth_extracting("1234567890")); // 10 chars
        assert!(!worth_extracting("  はい  "));
    }

    #[test]
    fn out_of_range_values_are_dropped_not_clamped() {
        let patch = validate(raw_from(json!({
            "family_size": 25,
            "available_cooking_time": 200,
            "spice_tolerance": 9,
            "confidence": 0.9,
        })));
        assert_eq!(patch.family_size, None);
        assert_eq!(patch.available_cooking_time, None);
        assert_eq!(patch.spice_tolerance, None);
        assert!(patch.is_empty());
    }

    #[test]
    fn in_range_values_survive() {
        let patch = validate(raw_from(json!({
            "family_size": 20,
            "available_cooking_time": 1,
            "spice_tolerance": 5,
            "sweetness_preference": 1,
            "confidence": 0.9,
        })));
        assert_eq!(patch.family_size, Some(20));
        assert_eq!(patch.available_cooking_time, Some(1));
        assert_eq!(patch.spice_tolerance, Some(5));
        assert_eq!(patch.sweetness_preference, Some(1));
    }

    #[test]
    fn numeric_coercion_accepts_floats_and_strings() {
        let patch = validate(raw_from(json!({
            "family_size": 4.0,
            "available_cooking_time": "30",
        })));
        assert_eq!(patch.family_size, Some(4));
        assert_eq!(patch.available_cooking_time, Some(30));
    }

    #[test]
    fn unknown_vocabulary_entries_are_filtered() {
        let patch = validate(raw_from(json!({
            "dietary_restrictions": ["vegan", "breatharian"],
            "allergies": ["nuts", "sunlight"],
            "preferred_cuisines": ["thai", "martian"],
            "skill_level": "wizard",
            "health_goals": ["diet", "immortality"],
            "confidence": 0.8,
        })));
        assert_eq!(patch.dietary_restrictions, vec![DietaryRestriction::Vegan]);
        assert_eq!(patch.allergies, vec![Allergy::Nuts]);
        assert_eq!(patch.preferred_cuisines, vec![Cuisine::Thai]);
        assert_eq!(patch.skill_level, None);
        assert_eq!(patch.health_goals, vec![HealthGoal::Diet]);
    }

    #[test]
    fn free_text_lists_are_trimmed() {
        let patch = validate(raw_from(json!({
            "dislikes": ["  セロリ ", "", "  "],
            "favorite_ingredients": ["鶏肉"],
        })));
        assert_eq!(patch.dislikes, vec!["セロリ".to_string()]);
        assert_eq!(patch.favorite_ingredients, vec!["鶏肉".to_string()]);
    }

    #[test]
    fn confidence_is_clamped() {
        let patch = validate(raw_from(json!({ "confidence": 5.0 })));
        assert_eq!(patch.confidence, 1.0);
    }
}
