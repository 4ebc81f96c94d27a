//! Boundary collaborator traits.
//!
//! Every external service the pipeline talks to sits behind one of
//! these traits so the orchestrator can be exercised with in-test
//! fakes.  Implementations live in [`crate::gemini`] and
//! [`crate::identity`].

use sous_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A text-in, text-out language model.
#[async_trait::async_trait]
pub trait TextModel: Send + Sync {
    /// Run one prompt and wait for the full reply.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Identifier of the underlying model (for logs and errors).
    fn model_id(&self) -> &str;
}

/// Raw image bytes produced by an image model.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    /// e.g. `"image/png"`.
    pub mime_type: String,
}

impl GeneratedImage {
    /// Encode as a `data:` URL suitable for inlining in a JSON event.
    pub fn to_data_url(&self) -> String {
        use base64::Engine as _;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.mime_type, b64)
    }
}

/// A prompt-to-image model.
#[async_trait::async_trait]
pub trait ImageModel: Send + Sync {
    async fn render(&self, prompt: &str) -> Result<GeneratedImage>;

    fn model_id(&self) -> &str;
}

/// A model that answers questions about an image.
#[async_trait::async_trait]
pub trait VisionModel: Send + Sync {
    /// Run a prompt against the given image bytes.
    async fn describe(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String>;

    fn model_id(&self) -> &str;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identity verification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The identity attested by an external credential.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Stable subject identifier (used as the user ID).
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Verifies an externally-issued identity credential.
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_encodes_mime_and_payload() {
        let img = GeneratedImage {
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
            mime_type: "image/png".into(),
        };
        let url = img.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > "data:image/png;base64,".len());
    }
}
