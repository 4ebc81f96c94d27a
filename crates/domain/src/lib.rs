pub mod config;
pub mod error;
pub mod intent;
pub mod nutrition;
pub mod profile;
pub mod recipe;
pub mod stream;
