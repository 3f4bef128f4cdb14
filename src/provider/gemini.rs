//! Google Gemini adapter over the generateContent REST API.
//!
//! One content with two parts: the extraction prompt text and the page image
//! as inline base64 data. The answer is the first text part of the first
//! candidate. Authentication uses the `x-goog-api-key` header.

use super::{classify_status, classify_transport, retry_after_secs, VisionProvider};
use crate::error::ProviderError;
use crate::pipeline::encode::EncodedPage;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const GENERATE_URL_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData(InlineData<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini generateContent client.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: usize,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, max_tokens: usize) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            max_tokens,
        }
    }

    fn url(&self) -> String {
        format!("{GENERATE_URL_BASE}/{}:generateContent", self.model)
    }

    fn build_request<'a>(&'a self, page: &'a EncodedPage, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text(prompt),
                    Part::InlineData(InlineData {
                        mime_type: page.mime_type,
                        data: &page.data,
                    }),
                ],
            }],
            // Temperature 0: transcription, not creativity.
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
                temperature: 0.0,
            },
        }
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract_page(
        &self,
        page: &EncodedPage,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let request = self.build_request(page, prompt);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body, retry_after));
        }

        let parsed: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    detail: format!("response envelope: {e}"),
                })?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| ProviderError::MalformedResponse {
                detail: "no text part in any candidate".to_string(),
            })?;

        debug!("gemini answered {} chars", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> EncodedPage {
        EncodedPage {
            data: "aGVsbG8=".to_string(),
            mime_type: "image/png",
        }
    }

    #[test]
    fn url_embeds_model() {
        let provider = GeminiProvider::new("k".into(), "gemini-1.5-pro".into(), 4096);
        assert_eq!(
            provider.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn request_body_shape() {
        let provider = GeminiProvider::new("k".into(), "gemini-1.5-pro".into(), 2048);
        let body = serde_json::to_value(provider.build_request(&page(), "extract")).unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "extract");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "aGVsbG8=");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn response_first_text_part_wins() {
        let raw = r#"{"candidates": [{"content": {"parts": [{"text": "{\"subtotal\": 10}"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .unwrap();
        assert!(text.contains("subtotal"));
    }

    #[test]
    fn empty_candidates_yield_none() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .is_none());
    }
}
