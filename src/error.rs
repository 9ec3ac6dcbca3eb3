//! Error types for the syllabus2csv library.
//!
//! A single fatal error type, [`Syllabus2CsvError`], covers every stage of the
//! pipeline. There is no partial-success mode: a document either produces a
//! complete `assignments.csv` or one of these errors, and nothing is written.
//!
//! Each variant belongs to exactly one [`Stage`], available through
//! [`Syllabus2CsvError::stage`], so callers (and the CLI progress display)
//! can report *where* the pipeline stopped without matching every variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The pipeline step an error (or progress event) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading the local file or downloading the URL.
    Ingest,
    /// OCR call 1: multipart upload to `/v1/files`.
    Upload,
    /// OCR call 2: signed URL for the uploaded file.
    ResolveUrl,
    /// OCR call 3: `/v1/ocr` against the signed URL.
    Ocr,
    /// The Gemini `generateContent` call.
    Generate,
    /// Fence stripping and writing the CSV artifact.
    Deliver,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Upload => "file upload",
            Stage::ResolveUrl => "file URL resolution",
            Stage::Ocr => "OCR",
            Stage::Generate => "generation",
            Stage::Deliver => "delivery",
        };
        f.write_str(name)
    }
}

/// All fatal errors returned by the syllabus2csv library.
#[derive(Debug, Error)]
pub enum Syllabus2CsvError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// A trigger fired without carrying a file (empty drop, cancelled picker).
    #[error("No file received from {trigger}")]
    NoFileSelected { trigger: String },

    // ── OCR provider errors ───────────────────────────────────────────────
    /// `POST /v1/files` returned a non-success status.
    #[error("File upload failed: {status} {status_text}")]
    UploadFailed { status: u16, status_text: String },

    /// `GET /v1/files/{id}/url` returned a non-success status.
    #[error("Failed to get file URL: {status} {status_text}")]
    UrlResolutionFailed { status: u16, status_text: String },

    /// `POST /v1/ocr` returned a non-success status.
    #[error("OCR processing failed: {status} {status_text}")]
    OcrFailed { status: u16, status_text: String },

    // ── Generation provider errors ────────────────────────────────────────
    /// `generateContent` returned a non-success status.
    #[error("Gemini API request failed: {status} {status_text}")]
    GenerationFailed { status: u16, status_text: String },

    // ── Shared provider errors ────────────────────────────────────────────
    /// A success response whose body is missing a required field.
    #[error("Invalid response from {stage}: {detail}")]
    InvalidResponse { stage: Stage, detail: String },

    /// The request never produced an HTTP response (DNS, TLS, reset, timeout).
    #[error("Network error during {stage}: {detail}")]
    Network { stage: Stage, detail: String },

    // ── Completion errors ─────────────────────────────────────────────────
    /// Fixed-offset fence stripping needs at least 9 characters.
    #[error("Completion is only {len} characters; fixed-offset fence stripping needs at least 9")]
    CompletionTooShort { len: usize },

    /// Nothing was left once the code fence was removed.
    #[error("Completion contained no CSV content")]
    EmptyCsv,

    // ── Config errors ─────────────────────────────────────────────────────
    /// A required API key was not supplied.
    #[error("Missing {name} API key.\nSet {env} or pass it on the command line.")]
    MissingCredential { name: &'static str, env: &'static str },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Syllabus2CsvError {
    /// The pipeline stage this error aborted.
    pub fn stage(&self) -> Stage {
        match self {
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::InvalidInput { .. }
            | Self::DownloadFailed { .. }
            | Self::DownloadTimeout { .. }
            | Self::NoFileSelected { .. }
            | Self::MissingCredential { .. }
            | Self::InvalidConfig(_)
            | Self::Internal(_) => Stage::Ingest,
            Self::UploadFailed { .. } => Stage::Upload,
            Self::UrlResolutionFailed { .. } => Stage::ResolveUrl,
            Self::OcrFailed { .. } => Stage::Ocr,
            Self::GenerationFailed { .. } => Stage::Generate,
            Self::InvalidResponse { stage, .. } | Self::Network { stage, .. } => *stage,
            Self::CompletionTooShort { .. }
            | Self::EmptyCsv
            | Self::OutputWriteFailed { .. } => Stage::Deliver,
        }
    }

    /// HTTP status code, for the variants that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UploadFailed { status, .. }
            | Self::UrlResolutionFailed { status, .. }
            | Self::OcrFailed { status, .. }
            | Self::GenerationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map a non-success HTTP status to the error kind of the failing stage.
    pub(crate) fn http_status(stage: Stage, status: reqwest::StatusCode) -> Self {
        let code = status.as_u16();
        let status_text = status.canonical_reason().unwrap_or("").to_string();
        match stage {
            Stage::Upload => Self::UploadFailed {
                status: code,
                status_text,
            },
            Stage::ResolveUrl => Self::UrlResolutionFailed {
                status: code,
                status_text,
            },
            Stage::Ocr => Self::OcrFailed {
                status: code,
                status_text,
            },
            Stage::Generate => Self::GenerationFailed {
                status: code,
                status_text,
            },
            Stage::Ingest | Stage::Deliver => Self::Internal(format!(
                "unexpected HTTP {} {} during {}",
                code, status_text, stage
            )),
        }
    }

    /// Wrap a transport-level reqwest failure.
    ///
    /// The request URL is dropped from the message: the Gemini endpoint
    /// carries the API key as a query parameter.
    pub(crate) fn network(stage: Stage, err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_decode() {
            Self::InvalidResponse {
                stage,
                detail: err.to_string(),
            }
        } else {
            Self::Network {
                stage,
                detail: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_carry_code_and_text() {
        let e = Syllabus2CsvError::http_status(Stage::Upload, reqwest::StatusCode::UNAUTHORIZED);
        let msg = e.to_string();
        assert!(msg.contains("401"), "got: {msg}");
        assert!(msg.contains("Unauthorized"), "got: {msg}");
        assert!(matches!(e, Syllabus2CsvError::UploadFailed { status: 401, .. }));
    }

    #[test]
    fn status_maps_to_stage_kind() {
        let s = reqwest::StatusCode::INTERNAL_SERVER_ERROR;
        assert!(matches!(
            Syllabus2CsvError::http_status(Stage::ResolveUrl, s),
            Syllabus2CsvError::UrlResolutionFailed { status: 500, .. }
        ));
        assert!(matches!(
            Syllabus2CsvError::http_status(Stage::Ocr, s),
            Syllabus2CsvError::OcrFailed { status: 500, .. }
        ));
        assert!(matches!(
            Syllabus2CsvError::http_status(Stage::Generate, s),
            Syllabus2CsvError::GenerationFailed { status: 500, .. }
        ));
    }

    #[test]
    fn stage_of_each_kind() {
        let e = Syllabus2CsvError::OcrFailed {
            status: 422,
            status_text: "Unprocessable Entity".into(),
        };
        assert_eq!(e.stage(), Stage::Ocr);
        assert_eq!(e.status(), Some(422));

        let e = Syllabus2CsvError::InvalidResponse {
            stage: Stage::Generate,
            detail: "no candidates".into(),
        };
        assert_eq!(e.stage(), Stage::Generate);
        assert_eq!(e.status(), None);
        assert!(e.to_string().contains("generation"));

        assert_eq!(Syllabus2CsvError::EmptyCsv.stage(), Stage::Deliver);
    }

    #[test]
    fn missing_credential_names_env_var() {
        let e = Syllabus2CsvError::MissingCredential {
            name: "Mistral",
            env: "MISTRAL_API_KEY",
        };
        assert!(e.to_string().contains("MISTRAL_API_KEY"));
    }
}
