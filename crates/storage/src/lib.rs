pub mod conversations;
pub mod document;
pub mod firestore;
pub mod memory;
pub mod profiles;

pub use conversations::{ConversationMessage, ConversationStats, ConversationStore};
pub use document::{DocumentStore, UpdateFn};
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use profiles::{CookingStats, ProfileStore};
