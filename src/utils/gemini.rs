use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};
use url::Url;

use super::content_guard::safe_truncate_utf8;
use super::credential::Credential;
use super::error::ApiError;
use super::http::{HttpRequest, HttpTransport};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const SERVICE_NAME: &str = "Gemini";
const MAX_ERROR_BODY_BYTES: usize = 2000;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Option<Vec<GeminiResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

pub fn summary_prompt(text: &str) -> String {
    format!(
        "Summarize the following PDF text without using any asterisks. \
         Keep the summary concise and informative:\n\n{}",
        text
    )
}

pub fn question_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the question using only the document text below. \
         If the document does not contain the answer, say that you could not find it in the document. \
         Do not use any asterisks.\n\nQuestion: {}\n\nDocument text:\n{}",
        question, context
    )
}

/// Client for the `generateContent` endpoint, used for both summaries and answers.
pub struct GeminiService {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    model: String,
}

impl GeminiService {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model (e.g., "gemini-2.0-flash", "gemini-1.5-pro").
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn summarize(
        &self,
        text: &str,
        key: Option<&Credential>,
    ) -> Result<String, ApiError> {
        info!(
            "Summarizing {} characters with {}",
            text.chars().count(),
            self.model
        );
        self.generate(summary_prompt(text), key).await
    }

    pub async fn answer(
        &self,
        question: &str,
        context: &str,
        key: Option<&Credential>,
    ) -> Result<String, ApiError> {
        info!(
            "Answering question against {} characters of context with {}",
            context.chars().count(),
            self.model
        );
        self.generate(question_prompt(question, context), key).await
    }

    async fn generate(&self, prompt: String, key: Option<&Credential>) -> Result<String, ApiError> {
        let key = key.ok_or(ApiError::MissingCredential {
            service: SERVICE_NAME,
        })?;

        let body = json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ]
        });

        let endpoint = format!("{}/{}:generateContent", self.base_url, self.model);
        let url = Url::parse_with_params(&endpoint, &[("key", key.expose())])
            .map_err(|e| ApiError::Transport(format!("invalid endpoint URL: {}", e)))?;

        let response = self
            .transport
            .post_json(HttpRequest::new(url.as_str(), body))
            .await?
            .error_for_status()
            .map_err(|e| {
                error!("Gemini API error: {}", e);
                e
            })?;

        debug!("Gemini response body: {} bytes", response.body.len());
        extract_first_text(&response.body)
    }
}

/// Pulls `candidates[0].content.parts[0].text` out of a response envelope.
///
/// Anything else (a blocked prompt only carries `promptFeedback`) is
/// reported with the reply attached.
fn extract_first_text(body: &[u8]) -> Result<String, ApiError> {
    let malformed = |reason: String| ApiError::MalformedResponse {
        reason,
        body: safe_truncate_utf8(&String::from_utf8_lossy(body), MAX_ERROR_BODY_BYTES, "..."),
    };

    let envelope: GenerateContentResponse = serde_json::from_slice(body)
        .map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    envelope
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .and_then(|p| p.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| malformed("no candidates[0].content.parts[0].text".to_string()))
}
