//! Nutrition estimation.
//!
//! The model reply is untrusted: every numeric field is coerced and
//! clamped, list fields are truncated, and anything missing falls back
//! to the fixed defaults.  The caller always gets a well-formed
//! estimate, never an error.

use std::sync::Arc;

use serde_json::Value;

use sous_domain::nutrition::{defaults, NutritionEstimate, TotalNutrition};
use sous_providers::extract::first_json_object;
use sous_providers::TextModel;

const MAX_VITAMINS: usize = 5;
const MAX_BENEFITS: usize = 5;
const MAX_TAGS: usize = 3;
const MAX_RECOMMENDATIONS: usize = 3;

pub struct NutritionAnalyzer {
    model: Arc<dyn TextModel>,
}

impl NutritionAnalyzer {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Estimate nutrition for a recipe.  Model or parse failure yields
    /// the default estimate.
    pub async fn analyze(&self, recipe_text: &str, ingredients: &[String]) -> NutritionEstimate {
        let reply = match self
            .model
            .generate(&analysis_prompt(recipe_text, ingredients))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "nutrition analysis call failed, using defaults");
                return NutritionEstimate::default();
            }
        };

        match first_json_object(&reply).and_then(|json| serde_json::from_str::<Value>(json).ok()) {
            Some(value) => validate(&value),
            None => {
                tracing::warn!("unparseable nutrition reply, using defaults");
                NutritionEstimate::default()
            }
        }
    }
}

fn analysis_prompt(recipe_text: &str, ingredients: &[String]) -> String {
    format!(
        "次のレシピの栄養を推定してください。\n\n\
         材料: {}\n\nレシピ:\n{}\n\n\
         次のJSONだけを出力してください:\n\
         {{\"calories_per_serving\": 0, \"servings\": 0, \
         \"macronutrients\": {{\"protein_g\": 0.0, \"carbs_g\": 0.0, \"fat_g\": 0.0, \"fiber_g\": 0.0}}, \
         \"health_score\": 0, \"balance_score\": 0, \
         \"vitamins\": [], \"benefits\": [], \"dietary_tags\": [], \"recommendations\": []}}",
        ingredients.join("、"),
        recipe_text,
    )
}

/// Validate a raw model estimate into a well-formed one.
///
/// Scores clamp into 1..=10, macros come from the `macronutrients`
/// object (missing key means all-default macros), lists truncate to
/// their maximums.
pub fn validate(raw: &Value) -> NutritionEstimate {
    let macros = raw.get("macronutrients");
    NutritionEstimate {
        calories_per_serving: as_u32(raw.get("calories_per_serving"))
            .unwrap_or(defaults::CALORIES),
        servings: as_u32(raw.get("servings"))
            .filter(|&s| s >= 1)
            .unwrap_or(defaults::SERVINGS),
        protein_g: macro_field(macros, "protein_g", defaults::PROTEIN_G),
        carbs_g: macro_field(macros, "carbs_g", defaults::CARBS_G),
        fat_g: macro_field(macros, "fat_g", defaults::FAT_G),
        fiber_g: macro_field(macros, "fiber_g", defaults::FIBER_G),
        health_score: score(raw.get("health_score")),
        balance_score: score(raw.get("balance_score")),
        vitamins: string_list(raw.get("vitamins"), MAX_VITAMINS),
        benefits: string_list(raw.get("benefits"), MAX_BENEFITS),
        dietary_tags: string_list(raw.get("dietary_tags"), MAX_TAGS),
        recommendations: string_list(raw.get("recommendations"), MAX_RECOMMENDATIONS),
    }
}

/// Whole-recipe totals.  Pure arithmetic, no rounding beyond the
/// stored types.
pub fn total_nutrition(estimate: &NutritionEstimate) -> TotalNutrition {
    let servings = estimate.servings;
    TotalNutrition {
        calories: estimate.calories_per_serving * servings,
        protein_g: estimate.protein_g * servings as f64,
        carbs_g: estimate.carbs_g * servings as f64,
        fat_g: estimate.fat_g * servings as f64,
        fiber_g: estimate.fiber_g * servings as f64,
    }
}

/// Rule-based serving tips when the model offered none.
pub fn recommendations_for(estimate: &NutritionEstimate) -> Vec<String> {
    let mut tips = Vec::new();
    if estimate.protein_g < 15.0 {
        tips.push("タンパク質が少なめです。豆腐や卵を一品足すとバランスが良くなります。".to_owned());
    }
    if estimate.fiber_g < 3.0 {
        tips.push("食物繊維が不足気味です。野菜やきのこを添えてみてください。".to_owned());
    }
    if estimate.calories_per_serving > 700 {
        tips.push("一人前のカロリーが高めです。分量を調整するか副菜を軽くしてください。".to_owned());
    }
    if estimate.fat_g > 30.0 {
        tips.push("脂質が多めです。油の量を減らす調理法も検討してください。".to_owned());
    }
    tips.truncate(MAX_RECOMMENDATIONS);
    tips
}

fn as_u32(v: Option<&Value>) -> Option<u32> {
    let v = v?;
    v.as_u64()
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .and_then(|n| u32::try_from(n).ok())
}

fn as_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn macro_field(macros: Option<&Value>, key: &str, default: f64) -> f64 {
    as_f64(macros.and_then(|m| m.get(key)))
        .filter(|f| f.is_finite() && *f >= 0.0)
        .unwrap_or(default)
}

fn score(v: Option<&Value>) -> u8 {
    match as_f64(v) {
        Some(n) => (n.round() as i64).clamp(1, 10) as u8,
        None => defaults::SCORE,
    }
}

fn string_list(v: Option<&Value>, max: usize) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str())
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .take(max)
                .collect()
        })
        .unwrap_or_default()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
