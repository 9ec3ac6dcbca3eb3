//! Trigger adapters: the two ways a user hands over a file.
//!
//! A drop delivers a list of files and only the first one is used. A picker
//! delivers zero or one file. Both go through [`handle`], which runs the one
//! shared [`Pipeline`] and writes the artifact, so the two entry points cannot
//! drift apart.

use crate::convert::Pipeline;
use crate::error::Syllabus2CsvError;
use crate::pipeline::input::UploadedFile;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Which user gesture started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// One or more files dropped onto the tool.
    Drop,
    /// A single file chosen in a picker.
    Picker,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Drop => f.write_str("drop"),
            Trigger::Picker => f.write_str("file picker"),
        }
    }
}

/// Handle a drop: process the first file, ignore the rest.
pub async fn on_drop(
    files: &[PathBuf],
    pipeline: &Pipeline,
    out_dir: &Path,
) -> Result<PathBuf, Syllabus2CsvError> {
    if files.len() > 1 {
        info!("{} files dropped; processing only the first", files.len());
    }
    handle(Trigger::Drop, files.first().map(PathBuf::as_path), pipeline, out_dir).await
}

/// Handle a picker selection.
pub async fn on_file_selected(
    file: Option<&Path>,
    pipeline: &Pipeline,
    out_dir: &Path,
) -> Result<PathBuf, Syllabus2CsvError> {
    handle(Trigger::Picker, file, pipeline, out_dir).await
}

/// Shared body of every trigger: read, run, write. Errors are logged with the
/// trigger that caused them and returned unchanged.
pub async fn handle(
    trigger: Trigger,
    file: Option<&Path>,
    pipeline: &Pipeline,
    out_dir: &Path,
) -> Result<PathBuf, Syllabus2CsvError> {
    let result = process(trigger, file, pipeline, out_dir).await;

    if let Err(ref e) = result {
        error!("Error processing file from {}: {}", trigger, e);
    }
    result
}

async fn process(
    trigger: Trigger,
    file: Option<&Path>,
    pipeline: &Pipeline,
    out_dir: &Path,
) -> Result<PathBuf, Syllabus2CsvError> {
    let path = file.ok_or_else(|| Syllabus2CsvError::NoFileSelected {
        trigger: trigger.to_string(),
    })?;
    info!("Received '{}' via {}", path.display(), trigger);
    let upload = UploadedFile::from_path(path).await?;
    pipeline.deliver(&upload, out_dir).await
}
