//! Fence stripping: recover raw CSV from a fenced model completion.
//!
//! The prompt asks for CSV content only, yet models reliably answer with
//!
//! ````text
//! ```csv
//! Due Date,Class,…
//! …
//! ```
//! ````
//!
//! sometimes with a sentence before or after the block.
//!
//! [`FenceStrategy::Detect`] finds the first opening fence line (any language
//! tag) anywhere in the completion and keeps only the content up to the next
//! closing fence, dropping any preamble or trailing chatter. Text without a
//! fence passes through trimmed. [`FenceStrategy::FixedOffset`]
//! drops exactly 6 leading and 3 trailing characters, which is what a
//! ```` ```csv ```` … ```` ``` ```` wrapper measures.

use crate::config::FenceStrategy;
use crate::error::Syllabus2CsvError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Opening fence on its own line, anywhere in the text.
static RE_OPEN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_+-]*[ \t]*\r?\n").unwrap());

/// Closing fence on its own line.
static RE_CLOSE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[ \t]*\r?$").unwrap());

/// Closing fence glued to the last line of content.
static RE_CLOSE_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[ \t]*$").unwrap());

/// Opening fence marker length for ```` ```csv ````.
const FIXED_PREFIX: usize = 6;
/// Closing fence marker length for ```` ``` ````.
const FIXED_SUFFIX: usize = 3;

/// Strip the completion according to `strategy`.
///
/// Fails with [`Syllabus2CsvError::EmptyCsv`] when no content survives, so an
/// empty file is never delivered.
pub fn strip(raw: &str, strategy: FenceStrategy) -> Result<String, Syllabus2CsvError> {
    let csv = match strategy {
        FenceStrategy::Detect => strip_detected(raw),
        FenceStrategy::FixedOffset => strip_fixed_offset(raw)?,
    };
    if csv.trim().is_empty() {
        return Err(Syllabus2CsvError::EmptyCsv);
    }
    Ok(csv)
}

/// Keep only the content of the first fenced block, or the trimmed text when
/// there is no opening fence.
///
/// The result always ends with exactly the newline the content had before the
/// closing fence, or a single added one when it had none.
pub fn strip_detected(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = match RE_OPEN_FENCE.find(trimmed) {
        Some(open) => {
            let rest = &trimmed[open.end()..];
            match RE_CLOSE_LINE.find(rest) {
                Some(close) => &rest[..close.start()],
                None => strip_close_tail(rest),
            }
        }
        None => strip_close_tail(trimmed),
    };

    if body.trim().is_empty() {
        return String::new();
    }
    if body.ends_with('\n') {
        body.to_string()
    } else {
        format!("{}\n", body.trim_end())
    }
}

fn strip_close_tail(body: &str) -> &str {
    let body = body.trim_end();
    match RE_CLOSE_TAIL.find(body) {
        Some(m) => &body[..m.start()],
        None => body,
    }
}

/// Drop the first 6 and last 3 characters.
///
/// Counts Unicode scalar values, not bytes, so a multi-byte character near
/// either end cannot split. For a completion of `L ≥ 9` characters the result
/// has exactly `L − 9`; shorter input is an error rather than a garbage slice.
pub fn strip_fixed_offset(raw: &str) -> Result<String, Syllabus2CsvError> {
    let len = raw.chars().count();
    if len < FIXED_PREFIX + FIXED_SUFFIX {
        return Err(Syllabus2CsvError::CompletionTooShort { len });
    }
    Ok(raw
        .chars()
        .skip(FIXED_PREFIX)
        .take(len - FIXED_PREFIX - FIXED_SUFFIX)
        .collect())
}
