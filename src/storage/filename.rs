//! File names for retrieved resources.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::classify::{ContentKind, plain_mime_type};

/// Name used when nothing better can be derived.
const FALLBACK_STEM: &str = "resource";

/// Highest numeric suffix tried before falling back to a timestamp.
const MAX_SUFFIX: usize = 1000;

/// Suggests a file name: `Content-Disposition` first, then the URL tail, then
/// a fallback built from the locator id. An extension matching the content
/// type or kind is appended when the name has none.
#[must_use]
pub fn suggested_filename(
    content_disposition: Option<&str>,
    url: &Url,
    content_type: Option<&str>,
    kind: ContentKind,
    id: Option<&str>,
) -> String {
    let name = content_disposition
        .and_then(filename_from_disposition)
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| match id {
            Some(id) if !id.trim().is_empty() => format!("{FALLBACK_STEM}_{}", id.trim()),
            _ => FALLBACK_STEM.to_string(),
        });
    let name = sanitize_filename(&name);

    if Path::new(&name).extension().is_some() {
        name
    } else {
        format!("{name}{}", extension_for(content_type, kind))
    }
}

/// File name from a `Content-Disposition` value. `filename*=` (RFC 5987)
/// wins over `filename=`.
#[must_use]
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let lower = header.to_ascii_lowercase();

    if let Some(pos) = lower.find("filename*=") {
        let value = header[pos + "filename*=".len()..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let encoded = encoded[..encoded.find(';').unwrap_or(encoded.len())]
                .trim()
                .trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded)
                && !decoded.trim().is_empty()
            {
                return Some(decoded.trim().to_string());
            }
        }
    }

    let pos = lower.find("filename=")?;
    let value = header[pos + "filename=".len()..].trim();
    let name = match value.strip_prefix('"') {
        Some(quoted) => &quoted[..quoted.find('"')?],
        None => value[..value.find(';').unwrap_or(value.len())].trim(),
    };
    (!name.trim().is_empty()).then(|| name.trim().to_string())
}

/// Last non-empty path segment, percent-decoded.
#[must_use]
pub fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    (!decoded.trim().is_empty()).then(|| decoded.trim().to_string())
}

/// Replaces characters that are invalid on common file systems and
/// neutralizes `.`/`..` segments.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let sanitized = sanitized.trim().to_string();

    if sanitized.trim_matches(['_', '.']).is_empty() {
        return FALLBACK_STEM.to_string();
    }
    let safe = !Path::new(&sanitized).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if safe {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

/// Paths to try, in order, for `filename` in `dir`: `name.pdf`, then
/// `name_1.pdf`, `name_2.pdf` and so on, then a timestamped name.
///
/// Nothing is checked on disk; the caller claims a path by creating it
/// exclusively and moves on to the next one when it is taken.
pub fn candidate_paths(dir: &Path, filename: &str) -> impl Iterator<Item = PathBuf> + use<> {
    let filename = sanitize_filename(filename);
    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (filename[..pos].to_string(), filename[pos..].to_string()),
        _ => (filename.clone(), String::new()),
    };
    let dir = dir.to_path_buf();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());

    std::iter::once(dir.join(&filename))
        .chain((1..MAX_SUFFIX).map({
            let dir = dir.clone();
            let (stem, ext) = (stem.clone(), ext.clone());
            move |i| dir.join(format!("{stem}_{i}{ext}"))
        }))
        .chain(std::iter::once(dir.join(format!("{stem}_{timestamp}{ext}"))))
}

fn extension_for(content_type: Option<&str>, kind: ContentKind) -> &'static str {
    let plain = content_type.and_then(plain_mime_type).unwrap_or_default();
    match plain.as_str() {
        "application/pdf" | "application/x-pdf" | "image/pdf" => ".pdf",
        "text/csv" => ".csv",
        "text/tab-separated-values" => ".tsv",
        "application/json" => ".json",
        "application/xml" | "application/rdf+xml" => ".xml",
        "application/vnd.ms-excel" => ".xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/zip" => ".zip",
        "application/gzip" => ".gz",
        "application/x-tar" => ".tar",
        "application/x-7z-compressed" => ".7z",
        "application/rar" | "application/vnd.rar" => ".rar",
        "application/x-netcdf" => ".nc",
        "application/x-sql" => ".sql",
        "image/tiff" => ".tiff",
        "text/plain" => ".txt",
        _ if kind == ContentKind::Document => ".pdf",
        _ => ".bin",
    }
}
