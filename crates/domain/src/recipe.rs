//! Recipe request and result types.

use serde::{Deserialize, Serialize};

/// Per-request tweaks applied on top of the stored profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeOverrides {
    /// Hard cap on cooking time, in minutes.
    #[serde(default)]
    pub time_constraint: Option<u32>,
    /// Free-form difficulty request (e.g. "簡単に").
    #[serde(default)]
    pub difficulty: Option<String>,
    /// Preferred cooking method (e.g. "炒める", "オーブン").
    #[serde(default)]
    pub cooking_method: Option<String>,
}

impl RecipeOverrides {
    pub fn is_empty(&self) -> bool {
        self.time_constraint.is_none() && self.difficulty.is_none() && self.cooking_method.is_none()
    }
}

/// Outcome of generating an illustration for one recipe step.
///
/// `index` matches the position of the step in the extracted step list,
/// regardless of completion order.
#[derive(Debug, Clone, Serialize)]
pub struct StepImage {
    pub index: usize,
    pub step_text: String,
    /// `data:` URL when generation succeeded.
    pub url: Option<String>,
    /// Failure description when it did not.
    pub error: Option<String>,
}

/// How involved a recipe is, estimated from its step list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Easy,
    Medium,
    Hard,
}

/// Step-count and time estimate for a recipe.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeComplexity {
    pub steps: usize,
    /// Capped at 180.
    pub estimated_minutes: u32,
    pub level: ComplexityLevel,
}
