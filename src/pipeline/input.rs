//! Input resolution: turn a user-supplied path or URL into an [`UploadedFile`].
//!
//! The OCR provider takes the document as a multipart upload, so unlike a
//! local renderer we never need the file on disk: both local files and URLs
//! are read fully into memory. The `%PDF` magic is checked only to warn; the
//! provider decides what it can read.

use crate::error::Syllabus2CsvError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A document ready for upload: raw bytes plus the filename sent with them.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file, keeping its file name for the upload.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, Syllabus2CsvError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => Syllabus2CsvError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Syllabus2CsvError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        debug!("Read local file: {} ({} bytes)", path.display(), bytes.len());
        let file = Self::new(filename, bytes);
        file.warn_if_not_pdf();
        Ok(file)
    }

    /// True when the content starts with the `%PDF` signature.
    pub fn looks_like_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF")
    }

    fn warn_if_not_pdf(&self) {
        if !self.looks_like_pdf() {
            warn!(
                "'{}' does not start with %PDF; uploading anyway",
                self.filename
            );
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory [`UploadedFile`].
///
/// If the input is a URL, download it. Otherwise treat it as a local path.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<UploadedFile, Syllabus2CsvError> {
    if input.trim().is_empty() {
        return Err(Syllabus2CsvError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        UploadedFile::from_path(PathBuf::from(input)).await
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedFile, Syllabus2CsvError> {
    info!("Downloading document from: {}", url);

    let parsed = reqwest::Url::parse(url).map_err(|_| Syllabus2CsvError::InvalidInput {
        input: url.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Syllabus2CsvError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(parsed.clone()).send().await.map_err(|e| {
        if e.is_timeout() {
            Syllabus2CsvError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Syllabus2CsvError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Syllabus2CsvError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Syllabus2CsvError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let file = UploadedFile::new(filename_from_url(&parsed), bytes.to_vec());
    file.warn_if_not_pdf();
    info!("Downloaded {} bytes as '{}'", file.bytes.len(), file.filename);
    Ok(file)
}

/// Last path segment when it looks like a file name, else `downloaded.pdf`.
fn filename_from_url(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty() && last.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
