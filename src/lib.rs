//! # syllabus2csv
//!
//! Turn a course syllabus PDF into a checklist of assignments, exams and
//! lectures as CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     read a local file or download from URL
//!  ├─ 2. Upload    POST /v1/files (Mistral, multipart, purpose=ocr)
//!  ├─ 3. Sign      GET  /v1/files/{id}/url?expiry=24
//!  ├─ 4. OCR       POST /v1/ocr → per-page markdown, joined in order
//!  ├─ 5. Extract   Gemini generateContent with the assignment prompt
//!  └─ 6. Deliver   strip the ```csv fence, write assignments.csv
//! ```
//!
//! Every step is awaited before the next starts; the first failure stops the
//! run and nothing is written.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use syllabus2csv::{convert_to_dir, Credentials, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // MISTRAL_API_KEY and GEMINI_API_KEY
//!     let credentials = Credentials::from_env()?;
//!     let config = PipelineConfig::default();
//!     let path = convert_to_dir("syllabus.pdf", ".", &credentials, &config).await?;
//!     eprintln!("wrote {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `syllabus2csv` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod trigger;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credentials, FenceStrategy, PipelineConfig, PipelineConfigBuilder};
pub use convert::{convert, convert_sync, convert_to_dir, Pipeline};
pub use error::{Stage, Syllabus2CsvError};
pub use output::{CsvArtifact, ExtractionOutput, ExtractionStats};
pub use pipeline::generate::{Completion, GeminiClient, GenerationProvider};
pub use pipeline::input::UploadedFile;
pub use pipeline::ocr::{combine_pages, MistralOcrClient, OcrPage, OcrProvider, OcrResult};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use trigger::Trigger;
