//! Pipeline orchestration: OCR → combine → generate → strip fence → deliver.
//!
//! [`Pipeline`] owns one OCR provider and one generation provider behind
//! trait objects. Production code builds the Mistral and Gemini clients with
//! [`Pipeline::from_config`]; tests inject fakes with [`Pipeline::new`].
//!
//! Every stage either succeeds or returns a [`Syllabus2CsvError`] that is
//! propagated unchanged. There is no partial result: if any stage fails, no
//! artifact is produced and nothing is written.

use crate::config::{Credentials, PipelineConfig};
use crate::error::{Stage, Syllabus2CsvError};
use crate::output::{CsvArtifact, ExtractionOutput, ExtractionStats};
use crate::pipeline::fence;
use crate::pipeline::generate::{GeminiClient, GenerationProvider};
use crate::pipeline::input::{self, UploadedFile};
use crate::pipeline::ocr::{self, MistralOcrClient, OcrProvider};
use crate::prompts;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The shared extraction pipeline behind every trigger.
#[derive(Clone)]
pub struct Pipeline {
    ocr: Arc<dyn OcrProvider>,
    generator: Arc<dyn GenerationProvider>,
    config: PipelineConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("ocr", &"<dyn OcrProvider>")
            .field("generator", &"<dyn GenerationProvider>")
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        ocr: Arc<dyn OcrProvider>,
        generator: Arc<dyn GenerationProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            ocr,
            generator,
            config,
        }
    }

    /// Build the Mistral OCR and Gemini clients from explicit credentials.
    pub fn from_config(
        credentials: &Credentials,
        config: PipelineConfig,
    ) -> Result<Self, Syllabus2CsvError> {
        let ocr = MistralOcrClient::new(credentials, &config)?;
        let generator = GeminiClient::new(credentials, &config)?;
        Ok(Self::new(Arc::new(ocr), Arc::new(generator), config))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run OCR and extraction over one file and return the CSV artifact.
    pub async fn run(&self, file: &UploadedFile) -> Result<ExtractionOutput, Syllabus2CsvError> {
        let total_start = Instant::now();
        info!("Starting extraction: {} ({} bytes)", file.filename, file.bytes.len());

        // ── Step 1: OCR (upload → signed URL → OCR) ──────────────────────
        let ocr_start = Instant::now();
        let ocr_result = self.stage(Stage::Ocr, self.ocr.extract(file)).await?;
        let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

        // ── Step 2: Combine page text ────────────────────────────────────
        let combined_text = ocr::combine_pages(&ocr_result.pages);
        debug!(
            "Combined {} pages into {} chars",
            ocr_result.pages.len(),
            combined_text.len()
        );
        if combined_text.trim().is_empty() {
            warn!("OCR returned no text for '{}'", file.filename);
        }

        // ── Step 3: Generate CSV completion ──────────────────────────────
        let prompt = prompts::build_prompt(&combined_text, self.config.prompt.as_deref());
        let gen_start = Instant::now();
        let completion = self
            .stage(Stage::Generate, self.generator.generate(&prompt))
            .await?;
        let generation_duration_ms = gen_start.elapsed().as_millis() as u64;

        // ── Step 4: Strip the fence ──────────────────────────────────────
        let content = fence::strip(&completion.text, self.config.fence_strategy).map_err(|e| {
            self.report_error(&e);
            e
        })?;
        let artifact = CsvArtifact::new(&self.config.output_filename, content);

        let header_matches = artifact.has_expected_header();
        if !header_matches {
            warn!(
                "CSV does not start with the expected header '{}'",
                prompts::CSV_HEADER
            );
        }

        let stats = ExtractionStats {
            pages: ocr_result.pages.len(),
            combined_chars: combined_text.len(),
            completion_chars: completion.text.len(),
            csv_rows: artifact.data_rows(),
            header_matches,
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
            ocr_duration_ms,
            generation_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Extraction complete: {} pages → {} rows, {}ms total",
            stats.pages, stats.csv_rows, stats.total_duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_artifact_ready(&artifact.filename, artifact.content.len());
        }

        Ok(ExtractionOutput {
            artifact,
            combined_text,
            page_count: stats.pages,
            stats,
        })
    }

    /// Run the pipeline and write the artifact into `out_dir`.
    ///
    /// Returns the path of the written CSV.
    pub async fn deliver(
        &self,
        file: &UploadedFile,
        out_dir: impl AsRef<Path>,
    ) -> Result<PathBuf, Syllabus2CsvError> {
        let output = self.run(file).await?;
        let out_dir = out_dir.as_ref().to_path_buf();
        let artifact = output.artifact;
        let deliver = async move {
            match tokio::task::spawn_blocking(move || artifact.write_to_dir(&out_dir)).await {
                Ok(written) => written,
                Err(e) => Err(Syllabus2CsvError::Internal(format!("write task: {e}"))),
            }
        };
        self.stage(Stage::Deliver, deliver).await
    }

    /// Await one stage, firing progress events around it.
    async fn stage<T, F>(&self, stage: Stage, fut: F) -> Result<T, Syllabus2CsvError>
    where
        F: Future<Output = Result<T, Syllabus2CsvError>>,
    {
        let start = Instant::now();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
        let result = fut.await;
        match &result {
            Ok(_) => {
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_stage_complete(stage, start.elapsed().as_millis() as u64);
                }
            }
            Err(e) => self.report_error(e),
        }
        result
    }

    fn report_error(&self, err: &Syllabus2CsvError) {
        warn!("Pipeline stopped during {}: {}", err.stage(), err);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_error(err.stage(), &err.to_string());
        }
    }
}

/// Extract assignments from a PDF file or URL.
///
/// # Errors
/// Any input, provider or fence-stripping failure, unchanged.
pub async fn convert(
    input_str: impl AsRef<str>,
    credentials: &Credentials,
    config: &PipelineConfig,
) -> Result<ExtractionOutput, Syllabus2CsvError> {
    let file = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    Pipeline::from_config(credentials, config.clone())?
        .run(&file)
        .await
}

/// Extract assignments and write `assignments.csv` (or the configured name)
/// into `out_dir`. Nothing is written if any stage fails.
pub async fn convert_to_dir(
    input_str: impl AsRef<str>,
    out_dir: impl AsRef<Path>,
    credentials: &Credentials,
    config: &PipelineConfig,
) -> Result<PathBuf, Syllabus2CsvError> {
    let file = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    Pipeline::from_config(credentials, config.clone())?
        .deliver(&file, out_dir)
        .await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    credentials: &Credentials,
    config: &PipelineConfig,
) -> Result<ExtractionOutput, Syllabus2CsvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Syllabus2CsvError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, credentials, config))
}
