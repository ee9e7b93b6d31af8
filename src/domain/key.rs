//! Domain keys and path keys used to index per-domain health state.
//!
//! Many institutional repositories spread one service over dozens of
//! sub-sub-domains. Keys keep only the last three labels of a host so those
//! collapse into one politeness and health unit.

use std::net::IpAddr;

use url::Url;

/// Key used when a URL has no usable host.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Number of trailing host labels kept in a domain key.
const KEY_LABELS: usize = 3;

/// Normalizes a host into a domain key.
///
/// Lower-cases, drops a trailing dot and a leading `www.`, then keeps the last
/// three labels. IP literals are kept whole.
///
/// # Examples
///
/// ```
/// use docfinder_core::domain::domain_key;
///
/// assert_eq!(domain_key("WWW.Example.org"), "example.org");
/// assert_eq!(domain_key("a.b.repo.example.org"), "repo.example.org");
/// assert_eq!(domain_key("127.0.0.1"), "127.0.0.1");
/// ```
#[must_use]
pub fn domain_key(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return bare.to_string();
    }

    let host = host.strip_prefix("www.").unwrap_or(&host);
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.is_empty() {
        return UNKNOWN_DOMAIN.to_string();
    }
    let start = labels.len().saturating_sub(KEY_LABELS);
    labels[start..].join(".")
}

/// Domain key of a parsed URL, or [`UNKNOWN_DOMAIN`] when it has no host.
#[must_use]
pub fn domain_of(url: &Url) -> String {
    url.host_str()
        .map_or_else(|| UNKNOWN_DOMAIN.to_string(), domain_key)
}

/// Domain key of a URL string, or [`UNKNOWN_DOMAIN`] for malformed input.
#[must_use]
pub fn domain_of_str(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map_or_else(|| UNKNOWN_DOMAIN.to_string(), |u| domain_of(&u))
}

/// Directory part of a URL path, used as the 403 bookkeeping key.
///
/// `/a/b/file.pdf` and `/a/b/other.pdf` share the key `/a/b/`.
#[must_use]
pub fn path_of(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(pos) => path[..=pos].to_string(),
        None => "/".to_string(),
    }
}
