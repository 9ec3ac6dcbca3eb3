//! Configuration types for the syllabus-to-CSV pipeline.
//!
//! Two values drive every run:
//!
//! * [`Credentials`]: the Mistral and Gemini API keys. Loaded once (from the
//!   environment or CLI flags) and handed to the client constructors, so tests
//!   can run the whole pipeline with fake keys against a local server.
//! * [`PipelineConfig`]: every other knob, built via [`PipelineConfigBuilder`].

use crate::error::Syllabus2CsvError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable holding the Mistral API key.
pub const MISTRAL_API_KEY_ENV: &str = "MISTRAL_API_KEY";
/// Environment variable holding the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// API keys for the two vendor services.
///
/// Immutable once built; `Debug` never prints the keys.
#[derive(Clone)]
pub struct Credentials {
    mistral_api_key: String,
    gemini_api_key: String,
}

impl Credentials {
    pub fn new(mistral_api_key: impl Into<String>, gemini_api_key: impl Into<String>) -> Self {
        Self {
            mistral_api_key: mistral_api_key.into(),
            gemini_api_key: gemini_api_key.into(),
        }
    }

    /// Read both keys from `MISTRAL_API_KEY` and `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, Syllabus2CsvError> {
        Self::from_parts(
            std::env::var(MISTRAL_API_KEY_ENV).ok(),
            std::env::var(GEMINI_API_KEY_ENV).ok(),
        )
    }

    /// Build from optional values, rejecting missing or blank keys.
    pub fn from_parts(
        mistral_api_key: Option<String>,
        gemini_api_key: Option<String>,
    ) -> Result<Self, Syllabus2CsvError> {
        let mistral = mistral_api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(Syllabus2CsvError::MissingCredential {
                name: "Mistral",
                env: MISTRAL_API_KEY_ENV,
            })?;
        let gemini = gemini_api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(Syllabus2CsvError::MissingCredential {
                name: "Gemini",
                env: GEMINI_API_KEY_ENV,
            })?;
        Ok(Self::new(mistral.trim(), gemini.trim()))
    }

    pub fn mistral_api_key(&self) -> &str {
        &self.mistral_api_key
    }

    pub fn gemini_api_key(&self) -> &str {
        &self.gemini_api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mistral_api_key", &"<redacted>")
            .field("gemini_api_key", &"<redacted>")
            .finish()
    }
}

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use syllabus2csv::{FenceStrategy, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .generation_model("gemini-2.0-flash")
///     .fence_strategy(FenceStrategy::Detect)
///     .build()
///     .unwrap();
/// assert_eq!(config.output_filename, "assignments.csv");
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Mistral API origin. Default: `https://api.mistral.ai`.
    pub mistral_base_url: String,

    /// Gemini API origin. Default: `https://generativelanguage.googleapis.com`.
    pub gemini_base_url: String,

    /// Gemini API version path segment. Default: `v1beta`.
    pub gemini_api_version: String,

    /// Mistral OCR model. Default: `mistral-ocr-latest`.
    pub ocr_model: String,

    /// Gemini model used for CSV extraction. Default: `gemini-2.0-flash`.
    pub generation_model: String,

    /// Lifetime of the signed file URL, in hours. Default: 24.
    ///
    /// The URL is consumed a few hundred milliseconds after it is issued;
    /// anything ≥ 1 works.
    pub url_expiry_hours: u32,

    /// Ask the OCR endpoint to return embedded images as base64. Default: true.
    pub include_image_base64: bool,

    /// Custom instruction prompt. If None, uses [`crate::prompts::ASSIGNMENT_PROMPT`].
    pub prompt: Option<String>,

    /// How the code fence is removed from the completion. Default: [`FenceStrategy::Detect`].
    pub fence_strategy: FenceStrategy,

    /// Name of the delivered artifact. Default: `assignments.csv`.
    pub output_filename: String,

    /// Per-request timeout in seconds. Default: None (reqwest's own behaviour).
    pub api_timeout_secs: Option<u64>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mistral_base_url: "https://api.mistral.ai".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            gemini_api_version: "v1beta".to_string(),
            ocr_model: "mistral-ocr-latest".to_string(),
            generation_model: "gemini-2.0-flash".to_string(),
            url_expiry_hours: 24,
            include_image_base64: true,
            prompt: None,
            fence_strategy: FenceStrategy::default(),
            output_filename: "assignments.csv".to_string(),
            api_timeout_secs: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("mistral_base_url", &self.mistral_base_url)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("gemini_api_version", &self.gemini_api_version)
            .field("ocr_model", &self.ocr_model)
            .field("generation_model", &self.generation_model)
            .field("url_expiry_hours", &self.url_expiry_hours)
            .field("include_image_base64", &self.include_image_base64)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("fence_strategy", &self.fence_strategy)
            .field("output_filename", &self.output_filename)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a reqwest client honouring `api_timeout_secs`.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, Syllabus2CsvError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.api_timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        builder
            .build()
            .map_err(|e| Syllabus2CsvError::Internal(format!("HTTP client: {e}")))
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn mistral_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.mistral_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn gemini_api_version(mut self, version: impl Into<String>) -> Self {
        self.config.gemini_api_version = version.into();
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    pub fn url_expiry_hours(mut self, hours: u32) -> Self {
        self.config.url_expiry_hours = hours;
        self
    }

    pub fn include_image_base64(mut self, v: bool) -> Self {
        self.config.include_image_base64 = v;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn fence_strategy(mut self, strategy: FenceStrategy) -> Self {
        self.config.fence_strategy = strategy;
        self
    }

    pub fn output_filename(mut self, name: impl Into<String>) -> Self {
        self.config.output_filename = name.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Syllabus2CsvError> {
        let c = &self.config;
        if c.url_expiry_hours == 0 {
            return Err(Syllabus2CsvError::InvalidConfig(
                "URL expiry must be ≥ 1 hour".into(),
            ));
        }
        for (name, url) in [
            ("Mistral base URL", &c.mistral_base_url),
            ("Gemini base URL", &c.gemini_base_url),
        ] {
            if reqwest::Url::parse(url).is_err() {
                return Err(Syllabus2CsvError::InvalidConfig(format!(
                    "{name} is not a valid URL: '{url}'"
                )));
            }
        }
        let name = c.output_filename.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(Syllabus2CsvError::InvalidConfig(format!(
                "Output filename must be a bare file name, got '{}'",
                c.output_filename
            )));
        }
        if c.ocr_model.trim().is_empty() || c.generation_model.trim().is_empty() {
            return Err(Syllabus2CsvError::InvalidConfig(
                "Model identifiers must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the CSV is recovered from the model's fenced completion.
///
/// The prompt asks for CSV only, and Gemini answers with a ```` ```csv ````
/// block in practice. [`FenceStrategy::Detect`] looks for that fence and
/// falls back to the raw text when it is absent; [`FenceStrategy::FixedOffset`]
/// reproduces the old slice-6-and-3 behaviour for callers that depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FenceStrategy {
    /// Detect an opening/closing fence; keep unfenced text as-is. (default)
    #[default]
    Detect,
    /// Drop the first 6 and last 3 characters unconditionally.
    FixedOffset,
}
