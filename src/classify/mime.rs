//! MIME-type normalization and the recognized document/dataset families.

use std::sync::LazyLock;

use regex::Regex;

/// MIME types treated as documents.
pub const DOCUMENT_MIME_TYPES: [&str; 3] = ["application/pdf", "application/x-pdf", "image/pdf"];

/// MIME types treated as datasets.
pub const DATASET_MIME_TYPES: [&str; 21] = [
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/csv",
    "text/tab-separated-values",
    "application/json",
    "application/xml",
    "application/rdf+xml",
    "application/smil+xml",
    "application/smil",
    "text/rdf+n3",
    "text/plain",
    "application/zip",
    "application/gzip",
    "application/rar",
    "application/vnd.rar",
    "application/x-tar",
    "application/x-7z-compressed",
    "application/x-sas-data",
    "application/x-netcdf",
    "application/x-sql",
    "image/tiff",
];

/// Pulls `type/subtype` out of values like `application/pdf; charset=x`
/// or `('application/pdf', none)`.
#[allow(clippy::expect_used)]
static MIME_TYPE_FILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:\(['"]?)?([\w]+/[\w+\-.]+).*$"#).expect("mime filter regex is valid")
});

/// Generic types that say nothing about the payload.
#[allow(clippy::expect_used)]
static AMBIGUOUS_MIME_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:application|binary)/(?:(?:x-)?octet-stream|save|force-download)|unknown)$")
        .expect("ambiguous mime regex is valid")
});

/// Lower-cases a `Content-Type` value and strips parameters, parentheses
/// and stray quotes. Returns `None` if the noisy form cannot be parsed.
///
/// # Examples
///
/// ```
/// use docfinder_core::classify::plain_mime_type;
///
/// assert_eq!(plain_mime_type("Application/PDF; charset=UTF-8").as_deref(), Some("application/pdf"));
/// assert_eq!(plain_mime_type("('application/pdf', none)").as_deref(), Some("application/pdf"));
/// assert_eq!(plain_mime_type("unknown").as_deref(), Some("unknown"));
/// ```
#[must_use]
pub fn plain_mime_type(content_type: &str) -> Option<String> {
    let lower = content_type.trim().to_ascii_lowercase();
    let plain = if lower.contains("charset") || lower.contains("name") || lower.starts_with('(') {
        MIME_TYPE_FILTER
            .captures(&lower)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())?
    } else {
        lower
    };
    let plain = plain.replace(['\'', '"'], "");
    let plain = plain.trim().trim_end_matches(';').trim();
    (!plain.is_empty()).then(|| plain.to_string())
}

/// Returns whether the plain MIME type is a recognized document type.
#[must_use]
pub fn is_document_mime(plain: &str) -> bool {
    DOCUMENT_MIME_TYPES.contains(&plain)
}

/// Returns whether the plain MIME type is a recognized dataset type.
#[must_use]
pub fn is_dataset_mime(plain: &str) -> bool {
    DATASET_MIME_TYPES.contains(&plain)
}

/// Returns whether the plain MIME type is a generic binary placeholder.
#[must_use]
pub fn is_ambiguous_mime(plain: &str) -> bool {
    AMBIGUOUS_MIME_TYPE.is_match(plain)
}

/// Returns whether the plain MIME type is worth crawling as a page.
#[must_use]
pub fn is_page_mime(plain: &str) -> bool {
    plain.contains("htm")
        || (plain.contains("text")
            && !plain.contains("xml")
            && !plain.contains("csv")
            && !plain.contains("tsv"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_mime_type_strips_parameters() {
        assert_eq!(
            plain_mime_type("text/html; charset=ISO-8859-1").as_deref(),
            Some("text/html")
        );
        assert_eq!(
            plain_mime_type("application/octet-stream; name=\"x.pdf\"").as_deref(),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn test_plain_mime_type_strips_quotes() {
        assert_eq!(
            plain_mime_type("application/pdf'").as_deref(),
            Some("application/pdf")
        );
    }

    #[test]
    fn test_plain_mime_type_unparseable_noise() {
        assert_eq!(plain_mime_type("charset=utf-8"), None);
        assert_eq!(plain_mime_type("   "), None);
    }

    #[test]
    fn test_families() {
        assert!(is_document_mime("application/pdf"));
        assert!(!is_document_mime("text/html"));
        assert!(is_dataset_mime("text/csv"));
        assert!(is_dataset_mime("image/tiff"));
        assert!(!is_dataset_mime("image/png"));
    }

    #[test]
    fn test_ambiguous_types() {
        assert!(is_ambiguous_mime("application/octet-stream"));
        assert!(is_ambiguous_mime("application/x-octet-stream"));
        assert!(is_ambiguous_mime("binary/octet-stream"));
        assert!(is_ambiguous_mime("application/force-download"));
        assert!(is_ambiguous_mime("unknown"));
        assert!(!is_ambiguous_mime("application/pdf"));
    }

    #[test]
    fn test_page_mime() {
        assert!(is_page_mime("text/html"));
        assert!(is_page_mime("application/xhtml+xml"));
        assert!(is_page_mime("text/plain"));
        assert!(!is_page_mime("text/xml"));
        assert!(!is_page_mime("text/csv"));
        assert!(!is_page_mime("image/png"));
    }
}
