//! User taste profile model.
//!
//! Profiles are built up incrementally from conversation: the extractor
//! produces a [`ProfilePatch`] per message, and patches above the
//! confidence threshold are merged into the stored [`UserProfile`].
//! Enumerable attributes use closed vocabularies so that a free-text
//! model reply can never write garbage into storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Closed vocabularies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietaryRestriction {
    Vegan,
    Vegetarian,
    Pescatarian,
    Halal,
    Kosher,
    GlutenFree,
    DairyFree,
    LowCarb,
    Keto,
}

impl DietaryRestriction {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "vegan" => Some(Self::Vegan),
            "vegetarian" => Some(Self::Vegetarian),
            "pescatarian" => Some(Self::Pescatarian),
            "halal" => Some(Self::Halal),
            "kosher" => Some(Self::Kosher),
            "gluten_free" => Some(Self::GlutenFree),
            "dairy_free" => Some(Self::DairyFree),
            "low_carb" => Some(Self::LowCarb),
            "keto" => Some(Self::Keto),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Vegan => "vegan",
            Self::Vegetarian => "vegetarian",
            Self::Pescatarian => "pescatarian",
            Self::Halal => "halal",
            Self::Kosher => "kosher",
            Self::GlutenFree => "gluten_free",
            Self::DairyFree => "dairy_free",
            Self::LowCarb => "low_carb",
            Self::Keto => "keto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allergy {
    Nuts,
    Shellfish,
    Dairy,
    Eggs,
    Soy,
    Gluten,
    Fish,
}

impl Allergy {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "nuts" => Some(Self::Nuts),
            "shellfish" => Some(Self::Shellfish),
            "dairy" => Some(Self::Dairy),
            "eggs" => Some(Self::Eggs),
            "soy" => Some(Self::Soy),
            "gluten" => Some(Self::Gluten),
            "fish" => Some(Self::Fish),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Nuts => "nuts",
            Self::Shellfish => "shellfish",
            Self::Dairy => "dairy",
            Self::Eggs => "eggs",
            Self::Soy => "soy",
            Self::Gluten => "gluten",
            Self::Fish => "fish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cuisine {
    Japanese,
    Italian,
    Chinese,
    French,
    Korean,
    Thai,
    Indian,
}

impl Cuisine {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "japanese" => Some(Self::Japanese),
            "italian" => Some(Self::Italian),
            "chinese" => Some(Self::Chinese),
            "french" => Some(Self::French),
            "korean" => Some(Self::Korean),
            "thai" => Some(Self::Thai),
            "indian" => Some(Self::Indian),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Japanese => "japanese",
            Self::Italian => "italian",
            Self::Chinese => "chinese",
            Self::French => "french",
            Self::Korean => "korean",
            Self::Thai => "thai",
            Self::Indian => "indian",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthGoal {
    Diet,
    MuscleGain,
    LowSodium,
    HighProtein,
}

impl HealthGoal {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "diet" => Some(Self::Diet),
            "muscle_gain" => Some(Self::MuscleGain),
            "low_sodium" => Some(Self::LowSodium),
            "high_protein" => Some(Self::HighProtein),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Diet => "diet",
            Self::MuscleGain => "muscle_gain",
            Self::LowSodium => "low_sodium",
            Self::HighProtein => "high_protein",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UserProfile
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The stored per-user taste profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,

    // Core attributes.
    #[serde(default)]
    pub dietary_restrictions: Vec<DietaryRestriction>,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    #[serde(default)]
    pub favorite_ingredients: Vec<String>,
    #[serde(default)]
    pub preferred_cuisines: Vec<Cuisine>,
    #[serde(default)]
    pub skill_level: Option<SkillLevel>,
    /// Minutes the user typically has for cooking. Valid range 1..=180.
    #[serde(default)]
    pub available_cooking_time: Option<u32>,
    /// People cooked for. Valid range 1..=20.
    #[serde(default)]
    pub family_size: Option<u32>,

    // Extended attributes.
    #[serde(default)]
    pub health_goals: Vec<HealthGoal>,
    /// 1 (mild) ..= 5 (very spicy).
    #[serde(default)]
    pub spice_tolerance: Option<u8>,
    /// 1 (not sweet) ..= 5 (very sweet).
    #[serde(default)]
    pub sweetness_preference: Option<u8>,
    #[serde(default)]
    pub kitchen_equipment: Vec<String>,
    /// Daily calorie target in kcal. Valid range 800..=5000.
    #[serde(default)]
    pub daily_calorie_target: Option<u32>,
    /// Daily protein target in grams. Valid range 10..=300.
    #[serde(default)]
    pub protein_target: Option<u32>,

    // Recent history mirrors (full history lives in subcollections).
    #[serde(default)]
    pub recent_feedback: Vec<RecipeFeedback>,
    #[serde(default)]
    pub recent_sessions: Vec<CookingSession>,

    /// Incremented on every write.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_owned(),
            dietary_restrictions: Vec::new(),
            allergies: Vec::new(),
            dislikes: Vec::new(),
            favorite_ingredients: Vec::new(),
            preferred_cuisines: Vec::new(),
            skill_level: None,
            available_cooking_time: None,
            family_size: None,
            health_goals: Vec::new(),
            spice_tolerance: None,
            sweetness_preference: None,
            kitchen_equipment: Vec::new(),
            daily_calorie_target: None,
            protein_target: None,
            recent_feedback: Vec::new(),
            recent_sessions: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Project the profile into the summary the recipe synthesizer uses.
    pub fn preference_summary(&self) -> PreferenceSummary {
        PreferenceSummary {
            dietary_restrictions: self.dietary_restrictions.clone(),
            allergies: self.allergies.clone(),
            dislikes: self.dislikes.clone(),
            favorite_ingredients: self.favorite_ingredients.clone(),
            preferred_cuisines: self.preferred_cuisines.clone(),
            skill_level: self.skill_level,
            available_cooking_time: self.available_cooking_time,
            family_size: self.family_size,
            health_goals: self.health_goals.clone(),
            spice_tolerance: self.spice_tolerance,
            kitchen_equipment: self.kitchen_equipment.clone(),
            daily_calorie_target: self.daily_calorie_target,
            protein_target: self.protein_target,
        }
    }
}

/// The subset of the profile that constrains recipe synthesis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceSummary {
    pub dietary_restrictions: Vec<DietaryRestriction>,
    pub allergies: Vec<Allergy>,
    pub dislikes: Vec<String>,
    pub favorite_ingredients: Vec<String>,
    pub preferred_cuisines: Vec<Cuisine>,
    pub skill_level: Option<SkillLevel>,
    pub available_cooking_time: Option<u32>,
    pub family_size: Option<u32>,
    pub health_goals: Vec<HealthGoal>,
    pub spice_tolerance: Option<u8>,
    pub kitchen_equipment: Vec<String>,
    pub daily_calorie_target: Option<u32>,
    pub protein_target: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProfilePatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A validated, possibly-empty profile delta extracted from one message.
///
/// List fields are merged by set union; scalar fields overwrite only
/// when present.  Out-of-range numeric values never reach a patch (the
/// extractor drops them instead of clamping).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub dietary_restrictions: Vec<DietaryRestriction>,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    #[serde(default)]
    pub favorite_ingredients: Vec<String>,
    #[serde(default)]
    pub preferred_cuisines: Vec<Cuisine>,
    #[serde(default)]
    pub skill_level: Option<SkillLevel>,
    #[serde(default)]
    pub available_cooking_time: Option<u32>,
    #[serde(default)]
    pub family_size: Option<u32>,
    #[serde(default)]
    pub health_goals: Vec<HealthGoal>,
    #[serde(default)]
    pub spice_tolerance: Option<u8>,
    #[serde(default)]
    pub sweetness_preference: Option<u8>,
    #[serde(default)]
    pub kitchen_equipment: Vec<String>,
    /// Extractor's confidence that the patch reflects a real preference.
    #[serde(default)]
    pub confidence: f64,
}

impl ProfilePatch {
    /// `true` when the patch carries no fields worth merging.
    pub fn is_empty(&self) -> bool {
        self.dietary_restrictions.is_empty()
            && self.allergies.is_empty()
            && self.dislikes.is_empty()
            && self.favorite_ingredients.is_empty()
            && self.preferred_cuisines.is_empty()
            && self.skill_level.is_none()
            && self.available_cooking_time.is_none()
            && self.family_size.is_none()
            && self.health_goals.is_empty()
            && self.spice_tolerance.is_none()
            && self.sweetness_preference.is_none()
            && self.kitchen_equipment.is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// History records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A user's rating of a generated recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeFeedback {
    pub recipe_name: String,
    /// 1 ..= 5 stars.
    pub rating: u8,
    #[serde(default)]
    pub comments: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A completed (or attempted) cooking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookingSession {
    pub recipe_name: String,
    pub cooked_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub success: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
