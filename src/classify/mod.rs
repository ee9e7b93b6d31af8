//! Content classification from unreliable headers and body sniffing.
//!
//! [`classify`] is a pure function of its [`ClassifyInput`]: the same headers,
//! URL and sniff result always give the same [`ContentKind`]. Nothing here
//! touches the network or shared state.

mod mime;
mod rules;
mod sniff;

use std::fmt;
use std::str::FromStr;

pub use mime::{
    DATASET_MIME_TYPES, DOCUMENT_MIME_TYPES, is_ambiguous_mime, is_dataset_mime,
    is_document_mime, is_page_mime, plain_mime_type,
};
pub use rules::{
    INTERNAL_LINK_RULES, PAGE_URL_RULES, RULES_VERSION, UrlRule, canonical_url,
    internal_link_rejection, is_shared_site_session, looks_like_dataset_url,
    looks_like_document_url, page_url_rejection, repair_escaped_ampersand, strip_jsessionid,
};
pub use sniff::{BodySniff, SNIFF_LIMIT, sniff_line, sniff_prefix};

/// Placeholder type some .NET servers send instead of a real MIME type.
const FILE_INFO_PLACEHOLDER: &str = "system.io.fileinfo";

/// What a resolved resource turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// A publication document (the pdf family).
    Document,
    /// A dataset file.
    Dataset,
    /// An HTML-ish page worth crawling for links.
    Page,
    /// Nothing usable could be determined.
    Unknown,
}

impl ContentKind {
    /// Returns whether this is a document or a dataset.
    #[must_use]
    pub fn is_resource(self) -> bool {
        matches!(self, Self::Document | Self::Dataset)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Document => "document",
            Self::Dataset => "dataset",
            Self::Page => "page",
            Self::Unknown => "unknown",
        })
    }
}

/// Which resource families a run is looking for. A family that is not
/// sought classifies as [`ContentKind::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResourceFamilies {
    /// Documents only.
    Documents,
    /// Datasets only.
    Datasets,
    /// Documents and datasets.
    #[default]
    Both,
}

impl ResourceFamilies {
    /// Returns whether documents are sought.
    #[must_use]
    pub fn documents(self) -> bool {
        matches!(self, Self::Documents | Self::Both)
    }

    /// Returns whether datasets are sought.
    #[must_use]
    pub fn datasets(self) -> bool {
        matches!(self, Self::Datasets | Self::Both)
    }

    /// Maps a kind of an unsought family to [`ContentKind::Unknown`].
    #[must_use]
    pub fn admit(self, kind: ContentKind) -> ContentKind {
        match kind {
            ContentKind::Document if !self.documents() => ContentKind::Unknown,
            ContentKind::Dataset if !self.datasets() => ContentKind::Unknown,
            other => other,
        }
    }
}

impl fmt::Display for ResourceFamilies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Documents => "documents",
            Self::Datasets => "datasets",
            Self::Both => "both",
        })
    }
}

impl FromStr for ResourceFamilies {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "documents" | "docs" => Ok(Self::Documents),
            "datasets" => Ok(Self::Datasets),
            "both" | "all" => Ok(Self::Both),
            other => Err(format!(
                "unknown resource family '{other}' (expected documents, datasets or both)"
            )),
        }
    }
}

/// Everything classification looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyInput<'a> {
    /// Final URL of the response.
    pub url: &'a str,
    /// Raw `Content-Type` header value.
    pub content_type: Option<&'a str>,
    /// Raw `Content-Disposition` header value.
    pub content_disposition: Option<&'a str>,
    /// Result of sniffing the body, when it was read.
    pub sniff: Option<BodySniff>,
    /// Families the run is looking for.
    pub families: ResourceFamilies,
}

/// Decides what the resource is.
///
/// # Examples
///
/// ```
/// use docfinder_core::classify::{ClassifyInput, ContentKind, ResourceFamilies, classify};
///
/// let input = ClassifyInput {
///     url: "https://repo.org/get/5337",
///     content_type: Some("application/octet-stream"),
///     content_disposition: Some("attachment; filename=\"paper.pdf\""),
///     sniff: None,
///     families: ResourceFamilies::Both,
/// };
/// assert_eq!(classify(&input), ContentKind::Document);
/// ```
#[must_use]
pub fn classify(input: &ClassifyInput<'_>) -> ContentKind {
    let kind = header_kind(input).unwrap_or(match input.sniff {
        Some(BodySniff::Html) => ContentKind::Page,
        Some(BodySniff::Pdf) => ContentKind::Document,
        Some(BodySniff::Undefined) | None => ContentKind::Unknown,
    });
    input.families.admit(kind)
}

/// Returns whether the headers alone leave the type open, so the body has to
/// be sniffed.
#[must_use]
pub fn needs_sniff(input: &ClassifyInput<'_>) -> bool {
    header_kind(input).is_none()
}

/// Kind decided from headers and URL, or `None` when only the body can tell.
fn header_kind(input: &ClassifyInput<'_>) -> Option<ContentKind> {
    let url = input.url.to_lowercase();
    let disposition = input.content_disposition.map(clean_disposition);

    let Some(plain) = input.content_type.and_then(plain_mime_type) else {
        // A type was sent but is unreadable noise: the URL may still tell.
        let from_url = input
            .content_type
            .and_then(|_| url_hint(&url, input.families));
        return from_url.or_else(|| {
            disposition
                .as_deref()
                .and_then(|d| disposition_kind(d, input.families))
        });
    };
    let families = input.families;

    if plain == FILE_INFO_PLACEHOLDER {
        return Some(
            disposition
                .as_deref()
                .filter(|d| *d != "attachment")
                .and_then(|d| disposition_kind(d, families))
                .unwrap_or_else(|| url_kind(&url, families)),
        );
    }
    if is_document_mime(&plain) && families.documents() {
        return Some(ContentKind::Document);
    }
    if is_dataset_mime(&plain) && families.datasets() {
        return Some(ContentKind::Dataset);
    }
    if is_ambiguous_mime(&plain) {
        return Some(
            disposition
                .as_deref()
                .and_then(|d| disposition_kind(d, families))
                .unwrap_or_else(|| url_kind(&url, families)),
        );
    }
    if is_page_mime(&plain) {
        return Some(ContentKind::Page);
    }
    Some(ContentKind::Unknown)
}

fn clean_disposition(raw: &str) -> String {
    raw.to_lowercase()
        .replace(['"', '\''], "")
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string()
}

fn disposition_kind(disposition: &str, families: ResourceFamilies) -> Option<ContentKind> {
    if families.documents() && disposition.contains("pdf") {
        Some(ContentKind::Document)
    } else if families.datasets() && looks_like_dataset_url(disposition) {
        Some(ContentKind::Dataset)
    } else {
        None
    }
}

/// Kind spelled out by the URL itself: `pdf` anywhere, or a dataset file shape.
fn url_hint(lower_url: &str, families: ResourceFamilies) -> Option<ContentKind> {
    if families.documents() && lower_url.contains("pdf") {
        Some(ContentKind::Document)
    } else if families.datasets() && looks_like_dataset_url(lower_url) {
        Some(ContentKind::Dataset)
    } else {
        None
    }
}

fn url_kind(lower_url: &str, families: ResourceFamilies) -> ContentKind {
    url_hint(lower_url, families).unwrap_or_else(|| {
        if families.documents() && looks_like_document_url(lower_url) {
            ContentKind::Document
        } else {
            ContentKind::Unknown
        }
    })
}
