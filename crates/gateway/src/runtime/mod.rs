pub mod quota;
pub mod turn;

pub use quota::{QuotaLedger, DAILY_IMAGE_LIMIT, DAILY_TOTAL_LIMIT};
pub use turn::{run_recipe, run_turn, ImageAttachment, RecipeInput, TurnInput};
