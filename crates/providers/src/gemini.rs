//! Gemini REST adapters for the model traits.
//!
//! All three adapters speak the `generateContent` endpoint.  Requests
//! carry the API key as a query parameter; responses are dug out of the
//! `candidates[0].content.parts` array.

use std::time::Duration;

use serde_json::{json, Value};

use sous_domain::config::LlmConfig;
use sous_domain::error::{Error, Result};

use crate::traits::{GeneratedImage, ImageModel, TextModel, VisionModel};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared plumbing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
struct GeminiEndpoint {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiEndpoint {
    fn new(config: &LlmConfig, model: &str, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: model.to_owned(),
        })
    }

    async fn generate_content(&self, body: Value) -> Result<Value> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("{}: {e}", self.model))
                } else {
                    Error::Http(format!("generateContent request failed: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(Error::Model {
                model: self.model.clone(),
                message: format!("HTTP {status}: {body_text}"),
            });
        }

        resp.json()
            .await
            .map_err(|e| Error::Http(format!("failed to parse generateContent response: {e}")))
    }
}

/// Collect the text parts of the first candidate.
fn first_candidate_text(model: &str, reply: &Value) -> Result<String> {
    let parts = reply
        .pointer("/candidates/0/content/parts")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Model {
            model: model.to_owned(),
            message: "response has no candidates".into(),
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(Error::Model {
            model: model.to_owned(),
            message: "response candidate contains no text".into(),
        });
    }
    Ok(text)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Text
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GeminiText {
    endpoint: GeminiEndpoint,
}

impl GeminiText {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            endpoint: GeminiEndpoint::new(config, &config.text_model, api_key)?,
        })
    }
}

#[async_trait::async_trait]
impl TextModel for GeminiText {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        let reply = self.endpoint.generate_content(body).await?;
        first_candidate_text(&self.endpoint.model, &reply)
    }

    fn model_id(&self) -> &str {
        &self.endpoint.model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Vision
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GeminiVision {
    endpoint: GeminiEndpoint,
}

impl GeminiVision {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            endpoint: GeminiEndpoint::new(config, &config.vision_model, api_key)?,
        })
    }
}

#[async_trait::async_trait]
impl VisionModel for GeminiVision {
    async fn describe(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String> {
        use base64::Engine as _;
        let data = base64::engine::general_purpose::STANDARD.encode(image);

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    { "inline_data": { "mime_type": mime_type, "data": data } },
                ],
            }],
        });
        let reply = self.endpoint.generate_content(body).await?;
        first_candidate_text(&self.endpoint.model, &reply)
    }

    fn model_id(&self) -> &str {
        &self.endpoint.model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Image generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GeminiImage {
    endpoint: GeminiEndpoint,
}

impl GeminiImage {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            endpoint: GeminiEndpoint::new(config, &config.image_model, api_key)?,
        })
    }
}

#[async_trait::async_trait]
impl ImageModel for GeminiImage {
    async fn render(&self, prompt: &str) -> Result<GeneratedImage> {
        use base64::Engine as _;

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        });
        let reply = self.endpoint.generate_content(body).await?;

        let parts = reply
            .pointer("/candidates/0/content/parts")
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::Model {
                model: self.endpoint.model.clone(),
                message: "response has no candidates".into(),
            })?;

        // The image part is the first part carrying inline data; text
        // parts (captions) are skipped.
        for part in parts {
            if let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) {
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("image/png")
                    .to_owned();
                let data = inline
                    .get("data")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data)
                    .map_err(|e| Error::Model {
                        model: self.endpoint.model.clone(),
                        message: format!("invalid base64 image payload: {e}"),
                    })?;
                return Ok(GeneratedImage { bytes, mime_type });
            }
        }

        Err(Error::Model {
            model: self.endpoint.model.clone(),
            message: "response contains no image part".into(),
        })
    }

    fn model_id(&self) -> &str {
        &self.endpoint.model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_text_joins_parts() {
        let reply = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] }
            }]
        });
        assert_eq!(first_candidate_text("m", &reply).unwrap(), "Hello world");
    }

    #[test]
    fn missing_candidates_is_a_model_error() {
        let reply = json!({ "promptFeedback": {} });
        let err = first_candidate_text("m", &reply).unwrap_err();
        assert!(matches!(err, Error::Model { .. }));
    }

    #[test]
    fn empty_parts_is_a_model_error() {
        let reply = json!({ "candidates": [{ "content": { "parts": [] } }] });
        assert!(first_candidate_text("m", &reply).is_err());
    }
}
