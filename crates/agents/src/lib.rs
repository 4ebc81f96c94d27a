pub mod image;
pub mod intent;
pub mod nutrition;
pub mod profile;
pub mod recipe;
pub mod steps;
pub mod vision;

pub use image::ImageSynthesizer;
pub use intent::IntentClassifier;
pub use nutrition::NutritionAnalyzer;
pub use profile::ProfileExtractor;
pub use recipe::RecipeSynthesizer;
pub use vision::IngredientVision;
