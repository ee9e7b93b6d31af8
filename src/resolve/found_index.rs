//! Deduplication of confirmed document and dataset URLs.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;
use url::Url;

use crate::classify::canonical_url;

/// Maps a canonical resource URL to the id of the locator that found it first.
#[derive(Debug, Default)]
pub struct AlreadyFoundIndex {
    entries: DashMap<String, String>,
}

impl AlreadyFoundIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Key under which `url` is stored: canonical form when it parses,
    /// the trimmed string otherwise.
    #[must_use]
    pub fn key(url: &str) -> String {
        let trimmed = url.trim();
        Url::parse(trimmed).map_or_else(
            |_| trimmed.to_string(),
            |parsed| canonical_url(&parsed).to_string(),
        )
    }

    /// Id that first produced `url`, if any.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<String> {
        self.entries
            .get(&Self::key(url))
            .map(|entry| entry.value().clone())
    }

    /// Records `url` as found by `id`. Returns `false`, leaving the first id
    /// in place, if the URL was already present.
    pub fn insert_first(&self, url: &str, id: &str) -> bool {
        match self.entries.entry(Self::key(url)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                debug!(url, id, "resource recorded as found");
                vacant.insert(id.to_string());
                true
            }
        }
    }

    /// Number of recorded resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether nothing was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_insert_wins() {
        let index = AlreadyFoundIndex::new();
        assert!(index.insert_first("https://repo.org/a.pdf", "1"));
        assert!(!index.insert_first("https://repo.org/a.pdf", "2"));
        assert_eq!(index.get("https://repo.org/a.pdf").as_deref(), Some("1"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_lookup_uses_canonical_form() {
        let index = AlreadyFoundIndex::new();
        index.insert_first("https://repo.org/a.pdf;jsessionid=XYZ", "1");
        assert_eq!(index.get("https://repo.org/a.pdf#page=3").as_deref(), Some("1"));
    }

    #[test]
    fn test_unknown_url_is_absent() {
        let index = AlreadyFoundIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.get("https://repo.org/b.pdf"), None);
    }
}
