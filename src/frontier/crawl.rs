//! Exploring a page for the resource it links to.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use url::Url;

use super::links::LinkExtractor;
use crate::classify::{
    internal_link_rejection, looks_like_dataset_url, looks_like_document_url, page_url_rejection,
};
use crate::domain::domain_of;
use crate::resolve::{Locator, OutcomeKind, ResolutionEngine, ResolutionOutcome, Role};

/// Comment of a page whose links led nowhere.
pub const NO_RESOURCE_IN_PAGE: &str = "No docUrl was found inside the page";

/// Link markers never worth following from a landing page.
const SKIPPED_LINK_MARKERS: [&str; 2] = ["citation", "mailto:"];

/// Resolves a page and, when it is a crawlable page, checks its links.
///
/// Meta-tag document links go first, then same-domain links shaped like
/// documents or datasets, then the remaining same-domain links that pass
/// the internal-link rules. The first confirmed or already-found resource
/// ends the page.
#[derive(Debug)]
pub struct PageCrawler {
    engine: Arc<ResolutionEngine>,
    extractor: Arc<dyn LinkExtractor>,
    max_internal_links: usize,
}

impl PageCrawler {
    /// Creates a crawler.
    #[must_use]
    pub fn new(
        engine: Arc<ResolutionEngine>,
        extractor: Arc<dyn LinkExtractor>,
        max_internal_links: usize,
    ) -> Self {
        Self {
            engine,
            extractor,
            max_internal_links,
        }
    }

    /// Engine used for every resolution.
    #[must_use]
    pub fn engine(&self) -> &Arc<ResolutionEngine> {
        &self.engine
    }

    /// Produces the single outcome for a top-level locator.
    #[instrument(skip(self, locator), fields(id = locator.id_or_empty(), url = %locator.source_url))]
    pub async fn crawl(&self, locator: &Locator) -> ResolutionOutcome {
        let mut outcome = self.engine.resolve_page(locator).await;
        if outcome.kind != OutcomeKind::Page {
            return outcome;
        }

        let html = outcome.page_html.take().unwrap_or_default();
        let Ok(page) = Url::parse(&outcome.page_url) else {
            return ResolutionOutcome::unreachable(locator, NO_RESOURCE_IN_PAGE);
        };
        let page_domain = domain_of(&page);
        let links = self.extractor.extract(&html, &page);
        let page_locator = Locator {
            page_url: outcome.page_url.clone(),
            ..locator.clone()
        };

        for meta in &links.meta_doc_urls {
            let child = page_locator.derive(&outcome.page_url, meta.as_str(), Role::CandidateResource);
            let found = self.engine.resolve_candidate(&child).await;
            if found.kind.is_valid() {
                info!(url = %meta, "resource found through meta tag");
                return found;
            }
        }

        let mut candidates = Vec::new();
        let mut internal = Vec::new();
        for link in links.links {
            if domain_of(&link) != page_domain {
                continue;
            }
            let lower = link.as_str().to_lowercase();
            if SKIPPED_LINK_MARKERS.iter().any(|marker| lower.contains(marker))
                || links.meta_doc_urls.contains(&link)
                || lower == outcome.page_url.to_lowercase()
            {
                continue;
            }
            if (looks_like_document_url(&lower) || looks_like_dataset_url(&lower))
                && page_url_rejection(&lower).is_none()
            {
                candidates.push(link);
            } else if internal_link_rejection(&lower).is_none() {
                internal.push(link);
            }
        }
        debug!(
            candidates = candidates.len(),
            internal = internal.len(),
            "links selected"
        );

        let checks = candidates
            .iter()
            .map(|link| (link, Role::CandidateResource))
            .chain(
                internal
                    .iter()
                    .take(self.max_internal_links)
                    .map(|link| (link, Role::InternalLink)),
            );
        for (link, role) in checks {
            if self.engine.health().is_blacklisted(&page_domain) {
                debug!(domain = %page_domain, "domain blocked while crawling the page");
                break;
            }
            let child = page_locator.derive(&outcome.page_url, link.as_str(), role);
            let found = self.engine.resolve(&child).await;
            if found.kind.is_valid() {
                return found;
            }
        }

        outcome.kind = OutcomeKind::Unreachable;
        outcome.comment = NO_RESOURCE_IN_PAGE.to_string();
        outcome.was_direct_link = false;
        outcome
    }
}
