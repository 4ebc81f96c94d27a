//! Per-step illustration generation.
//!
//! Each step is rendered independently; one step timing out or failing
//! never touches its siblings.  Results come back aligned with the
//! input step order.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::timeout;

use sous_domain::recipe::StepImage;
use sous_providers::ImageModel;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ImageSynthesizer {
    model: Arc<dyn ImageModel>,
    timeout: Duration,
}

impl ImageSynthesizer {
    pub fn new(model: Arc<dyn ImageModel>) -> Self {
        Self {
            model,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-call timeout.
    pub fn with_timeout(model: Arc<dyn ImageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Render one step.  Timeouts and model failures come back as the
    /// error side; the caller decides how to report them.
    pub async fn generate_one(&self, step_text: &str) -> Result<String, String> {
        let prompt = illustration_prompt(step_text);
        match timeout(self.timeout, self.model.render(&prompt)).await {
            Ok(Ok(image)) => Ok(image.to_data_url()),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "image generation failed");
                Err(e.to_string())
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "image generation timed out");
                Err("image generation timed out".to_owned())
            }
        }
    }

    /// Render every step concurrently.  The result is index-aligned
    /// with `steps` regardless of completion order.
    pub async fn generate_many(&self, steps: &[String]) -> Vec<StepImage> {
        let futures = steps.iter().enumerate().map(|(index, step)| async move {
            match self.generate_one(step).await {
                Ok(url) => StepImage {
                    index,
                    step_text: step.clone(),
                    url: Some(url),
                    error: None,
                },
                Err(message) => StepImage {
                    index,
                    step_text: step.clone(),
                    url: None,
                    error: Some(message),
                },
            }
        });
        join_all(futures).await
    }
}

fn illustration_prompt(step_text: &str) -> String {
    format!(
        "料理の手順「{step_text}」を表すシンプルで分かりやすいイラストを生成してください。\
         手元と調理器具にフォーカスし、文字は入れないでください。"
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
