//! Recipe synthesis.
//!
//! Builds a Japanese instruction for the text model from either an
//! ingredient set or a dish name, then appends a constraints block
//! assembled from the user's stored preferences.  Unlike the other
//! stages this one has no fallback: a model failure here is fatal to
//! the turn and the error propagates to the caller.

use std::sync::Arc;

use sous_domain::error::Result;
use sous_domain::profile::{HealthGoal, PreferenceSummary, SkillLevel};
use sous_domain::recipe::RecipeOverrides;
use sous_providers::TextModel;

/// Soft inclusions are capped to bound prompt size.
const MAX_FAVORITES_IN_PROMPT: usize = 3;
const MAX_CUISINES_IN_PROMPT: usize = 2;

pub struct RecipeSynthesizer {
    model: Arc<dyn TextModel>,
}

impl RecipeSynthesizer {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Synthesize a recipe from a set of available ingredients.
    pub async fn from_ingredients(
        &self,
        ingredients: &[String],
        preferences: Option<&PreferenceSummary>,
    ) -> Result<String> {
        let prompt = format!(
            "{}を使ったレシピを1つ提案してください。{}\n{}",
            ingredients.join("、"),
            FORMAT_DIRECTIVE,
            constraints_block(preferences, None),
        );
        self.model.generate(&prompt).await
    }

    /// Synthesize a recipe for a named dish.
    pub async fn from_dish_name(
        &self,
        dish: &str,
        overrides: Option<&RecipeOverrides>,
        preferences: Option<&PreferenceSummary>,
    ) -> Result<String> {
        let prompt = format!(
            "{dish}のレシピを教えてください。{}\n{}",
            FORMAT_DIRECTIVE,
            constraints_block(preferences, overrides),
        );
        self.model.generate(&prompt).await
    }

    /// Synthesize a named dish built around specific ingredients.
    pub async fn from_both(
        &self,
        dish: &str,
        ingredients: &[String],
        overrides: Option<&RecipeOverrides>,
        preferences: Option<&PreferenceSummary>,
    ) -> Result<String> {
        let prompt = format!(
            "{}を使って{dish}を作るレシピを教えてください。{}\n{}",
            ingredients.join("、"),
            FORMAT_DIRECTIVE,
            constraints_block(preferences, overrides),
        );
        self.model.generate(&prompt).await
    }
}

/// Downstream step extraction depends on numbered steps, so every
/// prompt carries this.
const FORMAT_DIRECTIVE: &str =
    "手順は必ず「1. 」「2. 」のように行頭の番号付きで書いてください。材料リストも含めてください。";

/// Render preferences and per-request overrides as prompt constraints.
///
/// Restrictions, allergies and dislikes are hard exclusions; favorites
/// and cuisines are soft inclusions, capped.
pub fn constraints_block(
    preferences: Option<&PreferenceSummary>,
    overrides: Option<&RecipeOverrides>,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(p) = preferences {
        if !p.dietary_restrictions.is_empty() {
            let tags: Vec<&str> = p.dietary_restrictions.iter().map(|r| r.tag()).collect();
            lines.push(format!("次の食事制限を必ず守ること: {}", tags.join(", ")));
        }
        if !p.allergies.is_empty() {
            let tags: Vec<&str> = p.allergies.iter().map(|a| a.tag()).collect();
            lines.push(format!(
                "アレルギーのため次の食材は絶対に使わないこと: {}",
                tags.join(", ")
            ));
        }
        if !p.dislikes.is_empty() {
            lines.push(format!("次の食材は使わないこと: {}", p.dislikes.join("、")));
        }
        if !p.favorite_ingredients.is_empty() {
            let picks: Vec<&str> = p
                .favorite_ingredients
                .iter()
                .take(MAX_FAVORITES_IN_PROMPT)
                .map(String::as_str)
                .collect();
            lines.push(format!("できれば次の食材を活かすこと: {}", picks.join("、")));
        }
        if !p.preferred_cuisines.is_empty() {
            let tags: Vec<&str> = p
                .preferred_cuisines
                .iter()
                .take(MAX_CUISINES_IN_PROMPT)
                .map(|c| c.tag())
                .collect();
            lines.push(format!("好みのジャンル: {}", tags.join(", ")));
        }
        if let Some(skill) = p.skill_level {
            lines.push(skill_directive(skill).to_owned());
        }
        if let Some(minutes) = p.available_cooking_time {
            lines.push(format!("調理時間は{minutes}分以内に収めること"));
        }
        if let Some(size) = p.family_size {
            lines.push(format!("{size}人分の分量にすること"));
        }
        for goal in &p.health_goals {
            lines.push(goal_directive(*goal).to_owned());
        }
        if let Some(spice) = p.spice_tolerance {
            if spice <= 2 {
                lines.push("辛さは控えめにすること".to_owned());
            } else if spice >= 4 {
                lines.push("辛めの味付けも歓迎".to_owned());
            }
        }
        if let Some(kcal) = p.daily_calorie_target {
            lines.push(format!("1日{kcal}kcalの目標カロリーを意識すること"));
        }
        if let Some(grams) = p.protein_target {
            lines.push(format!("1日{grams}gのタンパク質目標を意識すること"));
        }
    }

    if let Some(o) = overrides {
        if let Some(minutes) = o.time_constraint {
            lines.push(format!("今回は{minutes}分以内で作れること"));
        }
        if let Some(difficulty) = &o.difficulty {
            lines.push(format!("難易度の希望: {difficulty}"));
        }
        if let Some(method) = &o.cooking_method {
            lines.push(format!("調理法の希望: {method}"));
        }
    }

    if lines.is_empty() {
        return String::new();
    }
    let mut block = String::from("条件:\n");
    for line in &lines {
        block.push_str("- ");
        block.push_str(line);
        block.push('\n');
    }
    block
}

fn skill_directive(skill: SkillLevel) -> &'static str {
    match skill {
        SkillLevel::Beginner => "初心者向けに、工程を少なく簡単にすること",
        SkillLevel::Intermediate => "一般的な家庭料理の難易度でよい",
        SkillLevel::Advanced => "多少手の込んだ工程があってもよい",
    }
}

fn goal_directive(goal: HealthGoal) -> &'static str {
    match goal {
        HealthGoal::Diet => "カロリーを抑えること",
        HealthGoal::MuscleGain => "タンパク質を多めにすること",
        HealthGoal::LowSodium => "塩分を控えめにすること",
        HealthGoal::HighProtein => "高タンパクな食材を中心にすること",
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use sous_domain::profile::{Allergy, Cuisine, DietaryRestriction};

    struct RecordingModel {
        last_prompt: Mutex<String>,
    }

    #[async_trait::async_trait]
    impl TextModel for RecordingModel {
        async fn generate(&self, prompt: &str) -> Result<String> {
            *self.last_prompt.lock() = prompt.to_owned();
            Ok("# レシピ\n1. 切る\n2. 炒める".to_owned())
        }
        fn model_id(&self) -> &str {
            "recording"
        }
    }

    fn summary() -> PreferenceSummary {
        PreferenceSummary {
            dietary_restrictions: vec![DietaryRestriction::Vegetarian],
            allergies: vec![Allergy::Nuts],
            dislikes: vec!["セロリ".into()],
            favorite_ingredients: vec!["豆腐".into(), "なす".into(), "トマト".into(), "卵".into()],
            preferred_cuisines: vec![Cuisine::Japanese, Cuisine::Italian, Cuisine::Thai],
            skill_level: Some(SkillLevel::Beginner),
            available_cooking_time: Some(30),
            family_size: Some(4),
            health_goals: vec![HealthGoal::Diet],
            spice_tolerance: Some(1),
            kitchen_equipment: vec![],
            daily_calorie_target: Some(1800),
            protein_target: Some(90),
        }
    }

    #[test]
    fn empty_preferences_yield_empty_block() {
        assert!(constraints_block(None, None).is_empty());
        assert!(constraints_block(Some(&PreferenceSummary::default()), None).is_empty());
    }

    #[test]
    fn hard_exclusions_and_numeric_constraints_appear() {
        let block = constraints_block(Some(&summary()), None);
        assert!(block.contains("vegetarian"));
        assert!(block.contains("nuts"));
        assert!(block.contains("セロリ"));
        assert!(block.contains("30分以内"));
        assert!(block.contains("4人分"));
        assert!(block.contains("カロリーを抑える"));
        assert!(block.contains("辛さは控えめ"));
    }

    #[test]
    fn nutrition_targets_appear_in_the_block() {
        let block = constraints_block(Some(&summary()), None);
        assert!(block.contains("1日1800kcal"));
        assert!(block.contains("1日90g"));

        // No targets, no lines.
        let block = constraints_block(Some(&PreferenceSummary::default()), None);
        assert!(!block.contains("kcal"));
    }

    #[test]
    fn soft_inclusions_are_capped() {
        let block = constraints_block(Some(&summary()), None);
        // Fourth favorite and third cuisine fall off.
        assert!(block.contains("トマト"));
        assert!(!block.contains("卵"));
        assert!(block.contains("italian"));
        assert!(!block.contains("thai"));
    }

    #[test]
    fn overrides_are_appended() {
        let overrides = RecipeOverrides {
            time_constraint: Some(15),
            difficulty: Some("簡単に".into()),
            cooking_method: Some("レンジ".into()),
        };
        let block = constraints_block(None, Some(&overrides));
        assert!(block.contains("15分以内"));
        assert!(block.contains("簡単に"));
        assert!(block.contains("レンジ"));
    }

    #[tokio::test]
    async fn prompt_requests_numbered_steps() {
        let model = Arc::new(RecordingModel {
            last_prompt: Mutex::new(String::new()),
        });
        let synth = RecipeSynthesizer::new(model.clone());

        synth
            .from_ingredients(&["鶏肉".into(), "ネギ".into()], None)
            .await
            .unwrap();
        let prompt = model.last_prompt.lock().clone();
        assert!(prompt.contains("鶏肉、ネギ"));
        assert!(prompt.contains("番号付き"));

        synth
            .from_both("親子丼", &["鶏肉".into()], None, Some(&summary()))
            .await
            .unwrap();
        let prompt = model.last_prompt.lock().clone();
        assert!(prompt.contains("親子丼"));
        assert!(prompt.contains("条件:"));
    }
}
