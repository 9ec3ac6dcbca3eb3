//! Output types: the CSV artifact and the run report around it.

use crate::error::Syllabus2CsvError;
use crate::prompts::CSV_HEADER;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// The delivered CSV file: a name and its full content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvArtifact {
    pub filename: String,
    pub content: String,
}

impl CsvArtifact {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// True when the first non-blank line is the expected column header.
    pub fn has_expected_header(&self) -> bool {
        self.content
            .lines()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().trim_start_matches('\u{FEFF}') == CSV_HEADER)
            .unwrap_or(false)
    }

    /// Number of non-blank lines after the header line.
    pub fn data_rows(&self) -> usize {
        self.content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count()
            .saturating_sub(1)
    }

    /// Write the artifact into `dir` under its own filename.
    ///
    /// Atomic: the content goes to a temp file in the same directory which is
    /// then persisted over the target, so a reader never sees a partial CSV.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, Syllabus2CsvError> {
        let dir = dir.as_ref();
        let path = dir.join(&self.filename);
        let write_err = |source: std::io::Error| Syllabus2CsvError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(self.content.as_bytes()).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        info!("Wrote {} ({} bytes)", path.display(), self.content.len());
        Ok(path)
    }
}

/// Per-run measurements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages returned by OCR.
    pub pages: usize,
    /// Length of the combined OCR text in bytes.
    pub combined_chars: usize,
    /// Length of the raw completion in bytes.
    pub completion_chars: usize,
    /// Non-blank CSV lines after the header.
    pub csv_rows: usize,
    /// Whether the CSV starts with the expected header row.
    pub header_matches: bool,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Upload + signed URL + OCR.
    pub ocr_duration_ms: u64,
    pub generation_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub artifact: CsvArtifact,
    /// The text that was sent to the generation provider (prompt excluded).
    pub combined_text: String,
    /// Pages returned by OCR.
    pub page_count: usize,
    pub stats: ExtractionStats,
}
