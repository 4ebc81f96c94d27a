pub mod extract;
pub mod gemini;
pub mod identity;
pub mod traits;

pub use traits::{
    GeneratedImage, IdentityVerifier, ImageModel, TextModel, VerifiedIdentity, VisionModel,
};
