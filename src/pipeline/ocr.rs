//! OCR stage: upload the document to Mistral and read back per-page markdown.
//!
//! The Mistral OCR endpoint does not accept file bytes directly; it needs a
//! URL it can fetch. So one extraction is three chained round trips:
//!
//! ```text
//! POST /v1/files (multipart, purpose=ocr)   → { id }
//! GET  /v1/files/{id}/url?expiry=24         → { url }
//! POST /v1/ocr { document_url: url, … }     → { pages: [{ markdown }] }
//! ```
//!
//! Each call depends on the previous one's output, so they run strictly in
//! order. Any failure aborts the chain; nothing is retried.

use crate::config::{Credentials, PipelineConfig};
use crate::error::{Stage, Syllabus2CsvError};
use crate::pipeline::input::UploadedFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Anything that can turn a document into ordered page text.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Run OCR over `file` and return its pages in document order.
    async fn extract(&self, file: &UploadedFile) -> Result<OcrResult, Syllabus2CsvError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

/// Response of `POST /v1/files`. Only `id` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFileHandle {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

/// Response of `GET /v1/files/{id}/url`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedUrl {
    pub url: String,
}

/// Body of `POST /v1/ocr`.
#[derive(Debug, Clone, Serialize)]
pub struct OcrRequest<'a> {
    pub model: &'a str,
    pub document: DocumentRef<'a>,
    pub include_image_base64: bool,
}

/// A document reference accepted by the OCR endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentRef<'a> {
    DocumentUrl { document_url: &'a str },
}

/// One OCR'd page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub index: usize,
    pub markdown: String,
}

/// Response of `POST /v1/ocr`: pages in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResult {
    pub pages: Vec<OcrPage>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Join page markdown into one blob, each page followed by a single space.
///
/// Order is preserved as returned. The trailing space after the last page is
/// part of the format the prompt was tuned against.
pub fn combine_pages(pages: &[OcrPage]) -> String {
    let mut combined =
        String::with_capacity(pages.iter().map(|p| p.markdown.len() + 1).sum());
    for page in pages {
        combined.push_str(&page.markdown);
        combined.push(' ');
    }
    combined
}

// ── Client ───────────────────────────────────────────────────────────────

/// HTTP client for the Mistral files + OCR endpoints.
#[derive(Debug, Clone)]
pub struct MistralOcrClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    url_expiry_hours: u32,
    include_image_base64: bool,
}

impl MistralOcrClient {
    pub fn new(credentials: &Credentials, config: &PipelineConfig) -> Result<Self, Syllabus2CsvError> {
        Ok(Self {
            http: config.http_client()?,
            api_key: credentials.mistral_api_key().to_string(),
            base_url: config.mistral_base_url.clone(),
            model: config.ocr_model.clone(),
            url_expiry_hours: config.url_expiry_hours,
            include_image_base64: config.include_image_base64,
        })
    }

    /// Step 1: multipart upload with `purpose=ocr`.
    pub async fn upload_file(
        &self,
        file: &UploadedFile,
    ) -> Result<UploadedFileHandle, Syllabus2CsvError> {
        let part = Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
        let form = Form::new().text("purpose", "ocr").part("file", part);

        let response = self
            .http
            .post(format!("{}/v1/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Syllabus2CsvError::network(Stage::Upload, e))?;

        let handle: UploadedFileHandle = read_json(Stage::Upload, response).await?;
        info!("File uploaded successfully: {}", handle.id);
        Ok(handle)
    }

    /// Step 2: signed URL for an uploaded file.
    pub async fn signed_url(&self, file_id: &str) -> Result<SignedUrl, Syllabus2CsvError> {
        let response = self
            .http
            .get(format!("{}/v1/files/{}/url", self.base_url, file_id))
            .query(&[("expiry", self.url_expiry_hours)])
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Syllabus2CsvError::network(Stage::ResolveUrl, e))?;

        let signed: SignedUrl = read_json(Stage::ResolveUrl, response).await?;
        info!("Retrieved file URL successfully");
        debug!("Signed URL: {}", signed.url);
        Ok(signed)
    }

    /// Step 3: OCR against the signed URL.
    pub async fn run_ocr(&self, document_url: &str) -> Result<OcrResult, Syllabus2CsvError> {
        let body = OcrRequest {
            model: &self.model,
            document: DocumentRef::DocumentUrl { document_url },
            include_image_base64: self.include_image_base64,
        };

        let response = self
            .http
            .post(format!("{}/v1/ocr", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Syllabus2CsvError::network(Stage::Ocr, e))?;

        let result: OcrResult = read_json(Stage::Ocr, response).await?;
        info!("OCR processing completed: {} pages", result.pages.len());
        Ok(result)
    }
}

#[async_trait]
impl OcrProvider for MistralOcrClient {
    async fn extract(&self, file: &UploadedFile) -> Result<OcrResult, Syllabus2CsvError> {
        let handle = self.upload_file(file).await?;
        let signed = self.signed_url(&handle.id).await?;
        self.run_ocr(&signed.url).await
    }
}

/// Fail with the stage's HTTP error on non-2xx, else decode the JSON body.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    stage: Stage,
    response: reqwest::Response,
) -> Result<T, Syllabus2CsvError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!("{} returned {}: {}", stage, status, body);
        return Err(Syllabus2CsvError::http_status(stage, status));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| Syllabus2CsvError::network(stage, e))?;
    serde_json::from_slice(&body).map_err(|e| Syllabus2CsvError::InvalidResponse {
        stage,
        detail: e.to_string(),
    })
}
