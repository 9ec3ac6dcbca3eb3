//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to follow a run
//! as it moves through upload, URL resolution, OCR and generation. The CLI
//! uses it to drive a spinner and to print the failing stage in red; a GUI or
//! web front end can forward the same events wherever it likes.
//!
//! # Example
//!
//! ```rust
//! use syllabus2csv::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl PipelineProgressCallback for PrintStages {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         eprintln!("{stage} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(PrintStages))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::Arc;

/// Called by the pipeline as each stage starts, finishes or fails.
///
/// All methods default to no-ops so callers only override what they need.
/// Stages run strictly one after another, but separate invocations may share
/// one callback, so implementations must still be `Send + Sync`.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called just before a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage succeeds.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage fails. The pipeline stops right after this.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once the CSV artifact is ready to be delivered.
    ///
    /// # Arguments
    /// * `filename` — artifact name, e.g. `assignments.csv`
    /// * `bytes`    — content length in bytes
    fn on_artifact_ready(&self, filename: &str, bytes: usize) {
        let _ = (filename, bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
