//! Numbered-step extraction from recipe text.
//!
//! Pure and deterministic.  The synthesis prompt asks the model for a
//! numbered step section, and this module is the other half of that
//! formatting contract.

use sous_domain::recipe::{ComplexityLevel, RecipeComplexity};

const MAX_ESTIMATED_MINUTES: u32 = 30 * 6;

/// Minutes added per step when a keyword below matches its text.
const TIME_KEYWORDS: &[(&str, u32)] = &[
    ("漬け込", 60),
    ("オーブン", 40),
    ("煮込", 30),
    ("炊", 30),
    ("蒸", 20),
    ("揚げ", 15),
];

/// Minutes assumed for a step with no time keyword.
const BASE_STEP_MINUTES: u32 = 5;

/// Pull the ordered instruction steps out of recipe text.
///
/// A line counts as a step when it starts with an integer, a period
/// and whitespace.  The numeric prefix is stripped; lines that are
/// empty after stripping are discarded.  Zero steps is a valid result.
pub fn extract_steps(recipe_text: &str) -> Vec<String> {
    recipe_text
        .lines()
        .filter_map(|line| strip_step_prefix(line.trim_start()))
        .filter(|step| !step.is_empty())
        .collect()
}

fn strip_step_prefix(line: &str) -> Option<String> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest.strip_prefix('.')?;
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }
    Some(rest.trim().to_owned())
}

/// Estimate how involved a recipe is from its extracted steps.
pub fn analyze_complexity(steps: &[String]) -> RecipeComplexity {
    let estimated: u32 = steps
        .iter()
        .map(|step| {
            TIME_KEYWORDS
                .iter()
                .find(|(kw, _)| step.contains(kw))
                .map(|(_, minutes)| *minutes)
                .unwrap_or(BASE_STEP_MINUTES)
        })
        .sum();

    let level = match steps.len() {
        0..=3 => ComplexityLevel::Easy,
        4..=6 => ComplexityLevel::Medium,
        _ => ComplexityLevel::Hard,
    };

    RecipeComplexity {
        steps: steps.len(),
        estimated_minutes: estimated.min(MAX_ESTIMATED_MINUTES),
        level,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
