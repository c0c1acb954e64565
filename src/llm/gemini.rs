//! Google Gemini `generateContent` client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{GenerateRequest, LanguageModel, LlmError};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Clone)]
pub struct GeminiClient { inner: Arc<GeminiClientInner> }

struct GeminiClientInner { client: reqwest::Client, api_key: String, model: String }

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { inner: Arc::new(GeminiClientInner { client, api_key: api_key.to_string(), model: model.to_string() }) })
    }
}

#[derive(Serialize)]
struct Request<'a> { contents: [Content<'a>; 1] }

#[derive(Serialize)]
struct Content<'a> { parts: Vec<Part<'a>> }

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> { mime_type: &'a str, data: &'a str }

#[derive(Deserialize)]
struct Response { #[serde(default)] candidates: Vec<Candidate> }

#[derive(Deserialize)]
struct Candidate { content: Option<CandidateContent> }

#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<CandidatePart> }

#[derive(Deserialize)]
struct CandidatePart { #[serde(default)] text: String }

#[derive(Deserialize)]
struct ApiErrorResponse { error: ApiError }

#[derive(Deserialize)]
struct ApiError { message: String }

fn first_text(response: Response) -> Result<String, LlmError> {
    let text: String = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .next()
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() { Err(LlmError::Empty) } else { Ok(text) }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn model_name(&self) -> &str { &self.inner.model }

    #[instrument(skip(self, request), fields(model = %self.inner.model, with_image = request.image.is_some()))]
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        let mut parts = vec![Part::Text { text: &request.prompt }];
        if let Some(image) = &request.image {
            parts.push(Part::Image { inline_data: InlineData { mime_type: &image.mime_type, data: &image.data } });
        }
        let url = format!("{GEMINI_API_BASE}/{}:generateContent", self.inner.model);
        let response = self
            .inner
            .client
            .post(url)
            .header("x-goog-api-key", &self.inner.api_key)
            .json(&Request { contents: [Content { parts }] })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
            return Err(LlmError::Api { status: status.as_u16(), message });
        }
        let parsed: Response = serde_json::from_str(&body).map_err(|e| LlmError::Parse(format!("Failed to parse response: {e}")))?;
        first_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let req = Request { contents: [Content { parts: vec![
            Part::Text { text: "hi" },
            Part::Image { inline_data: InlineData { mime_type: "image/png", data: "AAAA" } },
        ] }] };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/png");
    }

    #[test]
    fn test_first_text() {
        let parsed: Response = serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"there"}]}}]}"#).unwrap();
        assert_eq!(first_text(parsed).unwrap(), "Hello there");
        let empty: Response = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(first_text(empty), Err(LlmError::Empty)));
    }
}
