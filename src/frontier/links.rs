//! Regex-based link extraction from page HTML.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

#[allow(clippy::expect_used)]
static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("href regex is valid")
});

/// `citation_pdf_url` / `eprints.document_url` meta tags, either attribute order.
#[allow(clippy::expect_used)]
static META_DOC_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?i)<meta\s+(?:name\s*=\s*["'](?:[^"']*citation_pdf|eprints\.document)_url["']\s+content\s*=\s*["']([^"']+)["']"#,
        r#"|content\s*=\s*["']([^"']+)["']\s+name\s*=\s*["'](?:[^"']*citation_pdf|eprints\.document)_url["'])"#,
    ))
    .expect("meta doc url regex is valid")
});

#[allow(clippy::expect_used)]
static UNSUPPORTED_META_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^.+\.(?:zip|rar|apk|jpg)(?:\?.+)?$").expect("meta extension regex is valid")
});

/// Links found on one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedLinks {
    /// Document links declared in meta tags, in page order.
    pub meta_doc_urls: Vec<Url>,
    /// Anchor targets, absolute, deduplicated, in page order.
    pub links: Vec<Url>,
}

/// Pulls links out of a page body.
pub trait LinkExtractor: Send + Sync + std::fmt::Debug {
    /// Extracts links from `html`, resolving relative ones against `base`.
    fn extract(&self, html: &str, base: &Url) -> ExtractedLinks;
}

/// [`LinkExtractor`] over `<a href>` and document meta tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct HrefExtractor;

impl LinkExtractor for HrefExtractor {
    fn extract(&self, html: &str, base: &Url) -> ExtractedLinks {
        let meta_doc_urls = META_DOC_URL
            .captures_iter(html)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str())
            .filter(|raw| !is_dynamic(raw) && !UNSUPPORTED_META_EXTENSION.is_match(raw))
            .filter_map(|raw| absolutize(raw, base))
            .collect();

        let mut seen = HashSet::new();
        let links = HREF
            .captures_iter(html)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
            .filter_map(|m| absolutize(m.as_str(), base))
            .filter(|url| seen.insert(url.to_string()))
            .collect();

        ExtractedLinks {
            meta_doc_urls,
            links,
        }
    }
}

/// First anchor target of a page, as used for HTTP 300 bodies.
#[must_use]
pub fn first_link(html: &str, base: &Url) -> Option<Url> {
    HrefExtractor.extract(html, base).links.into_iter().next()
}

/// Template placeholders left in server-rendered pages.
fn is_dynamic(raw: &str) -> bool {
    raw.contains("{{") || raw.contains("<?")
}

fn absolutize(raw: &str, base: &Url) -> Option<Url> {
    let raw = raw.trim().replace("&amp;", "&");
    if raw.is_empty() || raw.starts_with('#') || is_dynamic(&raw) {
        return None;
    }
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:") {
        return None;
    }
    let mut url = base.join(&raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
