//! Pipeline stages for syllabus-to-CSV extraction.
//!
//! Each submodule implements exactly one step, so each can be tested without
//! the others and either provider can be swapped behind its trait.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr ──────────────────────▶ generate ──▶ fence
//! (path/URL) (upload → signed URL → OCR)  (Gemini)     (strip ```csv)
//! ```
//!
//! 1. [`input`]    — read a local file or download a URL into an `UploadedFile`
//! 2. [`ocr`]      — three chained Mistral calls; [`ocr::combine_pages`] joins
//!    the page markdown
//! 3. [`generate`] — one Gemini call with the assignment prompt
//! 4. [`fence`]    — recover raw CSV from the fenced completion

pub mod fence;
pub mod generate;
pub mod input;
pub mod ocr;
