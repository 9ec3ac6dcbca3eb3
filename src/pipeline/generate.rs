//! Extraction stage: ask Gemini to turn the OCR text into assignment CSV.
//!
//! A single `generateContent` call. The API key travels as the `key` query
//! parameter, which is how the Generative Language API authenticates simple
//! key-based requests.
//!
//! Only `candidates[0].content.parts[0].text` is used. Every hop on that path
//! is optional in the wire types and checked explicitly in
//! [`GenerateContentResponse::first_text`], so a blocked prompt or an empty
//! candidate list surfaces as [`Syllabus2CsvError::InvalidResponse`].

use crate::config::{Credentials, PipelineConfig};
use crate::error::{Stage, Syllabus2CsvError};
use crate::pipeline::ocr::read_json;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A text completion plus the token accounting the provider reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Anything that can complete a prompt.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Send `prompt` and return the first candidate's text.
    async fn generate(&self, prompt: &str) -> Result<Completion, Syllabus2CsvError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest<'a> {
    pub contents: Vec<Content<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content<'a> {
    pub parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestPart<'a> {
    pub text: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    /// One user turn with one text part.
    pub fn single_text(text: &'a str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![RequestPart { text }],
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, or the first missing hop.
    pub fn first_text(&self) -> Result<&str, Syllabus2CsvError> {
        let invalid = |detail: &str| Syllabus2CsvError::InvalidResponse {
            stage: Stage::Generate,
            detail: detail.to_string(),
        };

        let candidate = self
            .candidates
            .as_deref()
            .ok_or_else(|| invalid("response has no candidates"))?
            .first()
            .ok_or_else(|| invalid("candidate list is empty"))?;

        let content = candidate.content.as_ref().ok_or_else(|| {
            let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
            invalid(&format!("candidate has no content (finish reason: {reason})"))
        })?;

        content
            .parts
            .as_deref()
            .and_then(<[ResponsePart]>::first)
            .ok_or_else(|| invalid("candidate content has no parts"))?
            .text
            .as_deref()
            .ok_or_else(|| invalid("first part has no text"))
    }

    /// Validate the candidate path and pair the text with token usage.
    pub fn into_completion(self) -> Result<Completion, Syllabus2CsvError> {
        let text = self.first_text()?.to_string();
        let usage = self.usage_metadata.unwrap_or_default();
        Ok(Completion {
            text,
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
        })
    }
}

// ── Client ───────────────────────────────────────────────────────────────

/// HTTP client for Gemini `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    api_version: String,
    model: String,
}

impl GeminiClient {
    pub fn new(credentials: &Credentials, config: &PipelineConfig) -> Result<Self, Syllabus2CsvError> {
        Ok(Self {
            http: config.http_client()?,
            api_key: credentials.gemini_api_key().to_string(),
            base_url: config.gemini_base_url.clone(),
            api_version: config.gemini_api_version.clone(),
            model: config.generation_model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, self.api_version, self.model
        )
    }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Completion, Syllabus2CsvError> {
        debug!("Sending {} prompt chars to {}", prompt.len(), self.model);

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateContentRequest::single_text(prompt))
            .send()
            .await
            .map_err(|e| Syllabus2CsvError::network(Stage::Generate, e))?;

        let body: GenerateContentResponse = read_json(Stage::Generate, response).await?;
        let completion = body.into_completion()?;
        info!(
            "Gemini response successful: {} chars, {} in / {} out tokens",
            completion.text.len(),
            completion.prompt_tokens,
            completion.completion_tokens
        );
        Ok(completion)
    }
}
