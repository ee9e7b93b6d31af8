//! Loading of input records into top-level locators.
//!
//! Each non-blank line is either a JSON object with `url` and an optional
//! `id`, or a bare URL. Lines starting with `#` are comments.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::resolve::Locator;

/// Maximum URL length to accept.
pub const MAX_URL_LENGTH: usize = 2000;

/// Errors for one input line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    /// The line looked like JSON but did not parse as a record.
    #[error("line {line}: malformed record: {reason}")]
    MalformedRecord {
        /// 1-based line number.
        line: usize,
        /// Parser message.
        reason: String,
    },

    /// The URL is not an absolute http(s) URL.
    #[error("line {line}: invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// 1-based line number.
        line: usize,
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl InputError {
    fn invalid_url(line: usize, url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            line,
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<RawId>,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

/// Locators loaded from one input text.
#[derive(Debug, Default)]
pub struct InputBatch {
    /// Valid locators, in input order.
    pub locators: Vec<Locator>,
    /// Lines that were rejected.
    pub skipped: Vec<InputError>,
}

impl InputBatch {
    /// Returns the number of valid locators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locators.len()
    }

    /// Returns whether no valid locator was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }
}

/// Parses a whole input text. Invalid lines are collected, never fatal.
#[must_use]
pub fn parse_input(text: &str) -> InputBatch {
    let mut batch = InputBatch::default();
    for (index, line) in text.lines().enumerate() {
        match parse_line(index + 1, line) {
            Ok(Some(locator)) => batch.locators.push(locator),
            Ok(None) => {}
            Err(error) => {
                debug!(error = %error, "skipping input line");
                batch.skipped.push(error);
            }
        }
    }
    batch
}

/// Parses one input line. Blank and comment lines yield `None`.
///
/// # Errors
///
/// Returns [`InputError`] if the record is malformed or its URL is invalid.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<Locator>, InputError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (id, raw_url) = if line.starts_with('{') {
        let record: RawRecord =
            serde_json::from_str(line).map_err(|e| InputError::MalformedRecord {
                line: line_no,
                reason: e.to_string(),
            })?;
        (record.id.map(RawId::into_string), record.url)
    } else {
        (None, line.to_string())
    };

    let url = validate_url(line_no, raw_url.trim())?;
    Ok(Some(Locator::page(id, url)))
}

fn validate_url(line: usize, raw: &str) -> Result<String, InputError> {
    if raw.len() > MAX_URL_LENGTH {
        let preview: String = raw.chars().take(60).collect();
        return Err(InputError::invalid_url(
            line,
            &preview,
            format!("longer than {MAX_URL_LENGTH} characters"),
        ));
    }
    let url = Url::parse(raw).map_err(|e| InputError::invalid_url(line, raw, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(InputError::invalid_url(
            line,
            raw,
            format!("scheme '{}' is not supported", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(InputError::invalid_url(line, raw, "missing host"));
    }
    Ok(raw.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Line Tests ====================

    #[test]
    fn test_bare_url_line() {
        let locator = parse_line(1, "  https://repo.org/record/1  ").unwrap().unwrap();
        assert_eq!(locator.id, None);
        assert_eq!(locator.source_url, "https://repo.org/record/1");
        assert_eq!(locator.target_url, locator.source_url);
    }

    #[test]
    fn test_json_record_with_text_and_numeric_ids() {
        let text = parse_line(1, r#"{"id": "A-7", "url": "https://repo.org/a"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(text.id.as_deref(), Some("A-7"));

        let number = parse_line(2, r#"{"id": 42, "url": "https://repo.org/b"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(number.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_blank_and_comment_lines_are_ignored() {
        assert_eq!(parse_line(1, "   "), Ok(None));
        assert_eq!(parse_line(2, "# seed list"), Ok(None));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let err = parse_line(3, r#"{"id": 1}"#).unwrap_err();
        assert!(matches!(err, InputError::MalformedRecord { line: 3, .. }));
    }

    #[test]
    fn test_unsupported_scheme_is_rejected() {
        let err = parse_line(4, "ftp://repo.org/a.pdf").unwrap_err();
        assert!(err.to_string().contains("scheme 'ftp'"));
    }

    #[test]
    fn test_overlong_url_is_rejected() {
        let url = format!("https://repo.org/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(parse_line(1, &url).is_err());
    }

    // ==================== Batch Tests ====================

    #[test]
    fn test_batch_keeps_order_and_collects_skipped() {
        let text = "https://repo.org/1\nnot a url\n\n{\"id\":\"3\",\"url\":\"https://repo.org/3\"}\n";
        let batch = parse_input(text);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.locators[1].id.as_deref(), Some("3"));
        assert_eq!(batch.skipped.len(), 1);
        assert!(matches!(batch.skipped[0], InputError::InvalidUrl { line: 2, .. }));
    }
}
