//! Content sniffing from the first meaningful line of a response body.

use std::sync::LazyLock;

use regex::Regex;

/// Bytes inspected before giving up on finding a meaningful line.
pub const SNIFF_LIMIT: usize = 64 * 1024;

#[allow(clippy::expect_used)]
static HTML_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*<(?:!doctype\s)?html).*").expect("html start regex is valid")
});

/// Lines that carry no type information: whitespace, XML prologs, comments.
#[allow(clippy::expect_used)]
static UNWANTED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s+|\s*<(?:\?xml|!--).*)$").expect("unwanted line regex is valid")
});

/// What the body's first meaningful line revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySniff {
    /// Starts like an HTML document.
    Html,
    /// Starts with the PDF magic.
    Pdf,
    /// A meaningful line that matched neither.
    Undefined,
}

/// Classifies one line, or `None` if the line should be skipped.
#[must_use]
pub fn sniff_line(line: &str) -> Option<BodySniff> {
    let line = line.trim_end_matches('\r');
    if line.chars().count() <= 1 {
        return None;
    }
    let lower = line.to_lowercase();
    if UNWANTED_LINE.is_match(&lower) {
        return None;
    }
    if HTML_START.is_match(&lower) {
        Some(BodySniff::Html)
    } else if lower.starts_with("%pdf-") {
        Some(BodySniff::Pdf)
    } else {
        Some(BodySniff::Undefined)
    }
}

/// Sniffs a body prefix.
///
/// Complete lines are checked in order. The trailing partial line only counts
/// once `finished` is set (the stream ended) or the prefix reached
/// [`SNIFF_LIMIT`]. Returns `None` when more bytes are needed.
#[must_use]
pub fn sniff_prefix(prefix: &[u8], finished: bool) -> Option<BodySniff> {
    let text = String::from_utf8_lossy(prefix);
    let mut lines = text.split('\n').peekable();
    while let Some(line) = lines.next() {
        let is_last = lines.peek().is_none();
        if is_last && !finished && prefix.len() < SNIFF_LIMIT {
            return None;
        }
        if let Some(sniff) = sniff_line(line) {
            return Some(sniff);
        }
    }
    (finished || prefix.len() >= SNIFF_LIMIT).then_some(BodySniff::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_line_html_variants() {
        assert_eq!(sniff_line("<!DOCTYPE html>"), Some(BodySniff::Html));
        assert_eq!(sniff_line("  <html lang=\"en\">"), Some(BodySniff::Html));
        assert_eq!(sniff_line("<HTML>"), Some(BodySniff::Html));
    }

    #[test]
    fn test_sniff_line_pdf_magic() {
        assert_eq!(sniff_line("%PDF-1.7"), Some(BodySniff::Pdf));
    }

    #[test]
    fn test_sniff_line_skips_noise() {
        assert_eq!(sniff_line(""), None);
        assert_eq!(sniff_line("x"), None);
        assert_eq!(sniff_line("    "), None);
        assert_eq!(sniff_line("<?xml version=\"1.0\"?>"), None);
        assert_eq!(sniff_line("<!-- generated -->"), None);
    }

    #[test]
    fn test_sniff_line_undefined() {
        assert_eq!(sniff_line("col1,col2,col3"), Some(BodySniff::Undefined));
    }

    #[test]
    fn test_sniff_prefix_skips_leading_blank_lines() {
        let body = b"\n\n  \n<!DOCTYPE html>\n<html>";
        assert_eq!(sniff_prefix(body, false), Some(BodySniff::Html));
    }

    #[test]
    fn test_sniff_prefix_waits_for_complete_line() {
        assert_eq!(sniff_prefix(b"<!DOCTY", false), None);
        assert_eq!(sniff_prefix(b"<!DOCTYPE html>", true), Some(BodySniff::Html));
    }

    #[test]
    fn test_sniff_prefix_binary_pdf() {
        let mut body = b"%PDF-1.4\n".to_vec();
        body.extend_from_slice(&[0xE2, 0xE3, 0xCF, 0xD3, b'\n']);
        assert_eq!(sniff_prefix(&body, false), Some(BodySniff::Pdf));
    }

    #[test]
    fn test_sniff_prefix_empty_body() {
        assert_eq!(sniff_prefix(b"", true), Some(BodySniff::Undefined));
        assert_eq!(sniff_prefix(b"\n\n", true), Some(BodySniff::Undefined));
    }

    #[test]
    fn test_sniff_prefix_gives_up_at_limit() {
        let body = vec![b' '; SNIFF_LIMIT];
        assert_eq!(sniff_prefix(&body, false), Some(BodySniff::Undefined));
    }
}
