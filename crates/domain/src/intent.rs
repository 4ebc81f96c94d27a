//! Intent classification types.
//!
//! Every inbound chat message is classified into exactly one
//! [`IntentKind`], which in turn determines the [`ResponseType`] the
//! client should render.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IntentKind
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The closed set of conversation intents.
///
/// Unknown tags coming back from a model are mapped to
/// [`IntentKind::Clarification`] rather than failing the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// The user wants to photograph ingredients (e.g. the fridge).
    ImageRequest,
    /// The user listed ingredients as text and wants a recipe from them.
    TextIngredients,
    /// The user named a dish and wants its recipe.
    RecipeRequest,
    /// Questions about nutrition or diet.
    NutritionAdvice,
    /// Questions about technique, substitutions, equipment.
    CookingAdvice,
    /// Small talk.
    CasualChat,
    /// The message is ambiguous and needs a follow-up question.
    Clarification,
}

impl IntentKind {
    /// Parse a model-produced intent tag.  Returns `None` for anything
    /// outside the closed set.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "image_request" => Some(Self::ImageRequest),
            "text_ingredients" => Some(Self::TextIngredients),
            "recipe_request" => Some(Self::RecipeRequest),
            "nutrition_advice" => Some(Self::NutritionAdvice),
            "cooking_advice" => Some(Self::CookingAdvice),
            "casual_chat" => Some(Self::CasualChat),
            "clarification" => Some(Self::Clarification),
            _ => None,
        }
    }

    /// The fixed intent → response-type mapping.
    pub fn response_type(self) -> ResponseType {
        match self {
            Self::ImageRequest => ResponseType::RequestImage,
            Self::TextIngredients | Self::RecipeRequest => ResponseType::GenerateRecipe,
            Self::NutritionAdvice => ResponseType::NutritionConsultation,
            Self::CookingAdvice => ResponseType::CookingConsultation,
            Self::CasualChat => ResponseType::CasualResponse,
            Self::Clarification => ResponseType::AskClarification,
        }
    }

    /// `true` when this intent leads to recipe synthesis.
    pub fn wants_recipe(self) -> bool {
        matches!(self, Self::TextIngredients | Self::RecipeRequest)
    }
}

/// What the client should do with the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    RequestImage,
    GenerateRecipe,
    NutritionConsultation,
    CookingConsultation,
    CasualResponse,
    AskClarification,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classification result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Structured data pulled out of the message during classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedData {
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub dish_name: Option<String>,
    /// Requested technique, e.g. "炒める".
    #[serde(default)]
    pub cooking_method: Option<String>,
    /// Stated dietary wishes, e.g. "減塩".
    #[serde(default)]
    pub dietary_needs: Option<String>,
    /// Free-text time bound, e.g. "30分以内".
    #[serde(default)]
    pub time_constraint: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<String>,
    /// Anything else worth carrying, e.g. "平日の夕食".
    #[serde(default)]
    pub context_info: Option<String>,
}

/// Outcome of classifying one message.
#[derive(Debug, Clone, Serialize)]
pub struct IntentResult {
    pub intent: IntentKind,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
    pub extracted: ExtractedData,
    pub response_type: ResponseType,
    /// The model's stated justification.  Empty on the fallback and
    /// short-circuit paths.
    pub reasoning: String,
}

impl IntentResult {
    pub fn new(intent: IntentKind, confidence: f64, extracted: ExtractedData) -> Self {
        Self {
            intent,
            confidence: confidence.clamp(0.0, 1.0),
            extracted,
            response_type: intent.response_type(),
            reasoning: String::new(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
