//! Hosted language model access.
//!
//! Routes talk to a [`LanguageModel`]; the production implementation is
//! [`gemini::GeminiClient`]. Every caller has a deterministic fallback in
//! [`prompts`], so a missing key or a failed call degrades the answer
//! instead of failing the request.

pub mod gemini;
pub mod prompts;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("model returned no text")]
    Empty,
    #[error("parse error: {0}")]
    Parse(String),
}

/// Base64 image sent alongside the prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineImage { pub mime_type: String, pub data: String }

impl InlineImage {
    /// Accepts a `data:<mime>;base64,<payload>` URL or a bare base64 payload (assumed JPEG).
    pub fn from_data_url(value: &str) -> Self {
        match value.strip_prefix("data:").and_then(|rest| rest.split_once(";base64,")) {
            Some((mime, data)) => Self { mime_type: mime.to_string(), data: data.to_string() },
            None => Self { mime_type: "image/jpeg".into(), data: value.to_string() },
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GenerateRequest { pub prompt: String, pub image: Option<InlineImage> }

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self { Self { prompt: prompt.into(), image: None } }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError>;
}

/// Parse the JSON object a model wrapped in prose or a ```json fence.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let start = text.find('{').ok_or_else(|| LlmError::Parse("no JSON object in model output".into()))?;
    let end = text.rfind('}').filter(|end| *end > start).ok_or_else(|| LlmError::Parse("unterminated JSON object".into()))?;
    serde_json::from_str(&text[start..=end]).map_err(|e| LlmError::Parse(e.to_string()))
}
