//! Nutrition estimate model.
//!
//! Estimates come back from a language model and are validated field by
//! field; anything missing or malformed falls back to the defaults
//! below, so an estimate is always well-formed.

use serde::{Deserialize, Serialize};

/// Default per-serving values used when a field is missing or invalid.
pub mod defaults {
    pub const CALORIES: u32 = 400;
    pub const SERVINGS: u32 = 2;
    pub const PROTEIN_G: f64 = 20.0;
    pub const CARBS_G: f64 = 40.0;
    pub const FAT_G: f64 = 15.0;
    pub const FIBER_G: f64 = 5.0;
    pub const SCORE: u8 = 7;
}

/// A validated per-serving nutrition estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NutritionEstimate {
    pub calories_per_serving: u32,
    pub servings: u32,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    /// Overall healthiness, 1 ..= 10.
    pub health_score: u8,
    /// Macro balance, 1 ..= 10.
    pub balance_score: u8,
    /// At most 5 entries.
    #[serde(default)]
    pub vitamins: Vec<String>,
    /// At most 5 entries.
    #[serde(default)]
    pub benefits: Vec<String>,
    /// At most 3 entries.
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    /// At most 3 entries.
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl Default for NutritionEstimate {
    fn default() -> Self {
        Self {
            calories_per_serving: defaults::CALORIES,
            servings: defaults::SERVINGS,
            protein_g: defaults::PROTEIN_G,
            carbs_g: defaults::CARBS_G,
            fat_g: defaults::FAT_G,
            fiber_g: defaults::FIBER_G,
            health_score: defaults::SCORE,
            balance_score: defaults::SCORE,
            vitamins: Vec::new(),
            benefits: Vec::new(),
            dietary_tags: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Whole-recipe totals (per-serving values multiplied by servings).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TotalNutrition {
    pub calories: u32,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_estimate_uses_fixed_values() {
        let e = NutritionEstimate::default();
        assert_eq!(e.calories_per_serving, 400);
        assert_eq!(e.servings, 2);
        assert_eq!(e.health_score, 7);
        assert_eq!(e.balance_score, 7);
        assert!(e.vitamins.is_empty());
    }
}
