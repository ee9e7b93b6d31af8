//! The resolution state machine.
//!
//! ```text
//! START -> CONNECTING -> (REDIRECTING)* -> CLASSIFYING
//!       -> DOCUMENT | DATASET | PAGE | UNREACHABLE | DUPLICATE
//! ```
//!
//! Every locator ends in exactly one [`ResolutionOutcome`]. The open
//! response is closed on every terminal transition.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, info, instrument};

use super::error::ResolveError;
use super::found_index::AlreadyFoundIndex;
use super::locator::{Locator, Role};
use super::outcome::{OutcomeKind, ResolutionOutcome};
use super::redirect::{FollowOutcome, RedirectResolver};
use crate::classify::{
    BodySniff, ClassifyInput, ContentKind, ResourceFamilies, canonical_url, classify,
    is_dataset_mime, is_document_mime, needs_sniff, plain_mime_type, sniff_prefix,
};
use crate::config::EngineConfig;
use crate::connection::{Attempt, ConnectionError, ConnectionManager};
use crate::domain::{DomainHealthStore, FailureCategory, FailureVerdict, domain_of};
use crate::storage::{DirectoryStore, FileStore, StoreError, suggested_filename};

/// Marker of repository "view content" endpoints that only ever serve documents.
const VIEW_CONTENT_MARKER: &str = "viewcontent.cgi";

/// Result of connecting and following redirects.
enum Opened {
    Terminal(Attempt),
    Duplicate(ResolutionOutcome),
    Failed(ResolutionOutcome),
}

/// Resolves locators to classified outcomes.
#[derive(Debug)]
pub struct ResolutionEngine {
    manager: Arc<ConnectionManager>,
    redirects: RedirectResolver,
    index: Arc<AlreadyFoundIndex>,
    store: Option<Arc<dyn FileStore>>,
    max_page_bytes: usize,
    families: ResourceFamilies,
}

impl ResolutionEngine {
    /// Creates an engine over an existing manager and index, without retrieval.
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        manager: Arc<ConnectionManager>,
        index: Arc<AlreadyFoundIndex>,
    ) -> Self {
        let redirects = RedirectResolver::new(Arc::clone(&manager), Arc::clone(&index), config.redirects);
        Self {
            manager,
            redirects,
            index,
            store: None,
            max_page_bytes: config.max_page_bytes,
            families: config.families,
        }
    }

    /// Builds the whole stack for a run: health store, connection manager,
    /// index, and a [`DirectoryStore`] when retrieval is enabled.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the HTTP client cannot be built.
    pub fn from_config(config: &EngineConfig) -> Result<Self, reqwest::Error> {
        let health = Arc::new(
            DomainHealthStore::with_politeness(config.thresholds, config.politeness)
                .with_get_only_domains(&config.get_only_domains),
        );
        let manager = Arc::new(ConnectionManager::new(config, health)?);
        let engine = Self::new(config, manager, Arc::new(AlreadyFoundIndex::new()));
        Ok(if config.download {
            engine.with_store(Arc::new(DirectoryStore::new(
                config.output_dir.clone(),
                config.max_content_bytes,
            )))
        } else {
            engine
        })
    }

    /// Enables retrieval of confirmed resources into `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn FileStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Connection manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Domain-health store.
    #[must_use]
    pub fn health(&self) -> &Arc<DomainHealthStore> {
        self.manager.health()
    }

    /// Already-found index.
    #[must_use]
    pub fn index(&self) -> &Arc<AlreadyFoundIndex> {
        &self.index
    }

    /// Resolves a locator according to its own role.
    pub async fn resolve(&self, locator: &Locator) -> ResolutionOutcome {
        self.run(locator).await
    }

    /// Resolves a top-level page URL.
    pub async fn resolve_page(&self, locator: &Locator) -> ResolutionOutcome {
        self.run(&with_role(locator, Role::PageRequest)).await
    }

    /// Resolves a URL suspected to be the resource itself.
    pub async fn resolve_candidate(&self, locator: &Locator) -> ResolutionOutcome {
        self.run(&with_role(locator, Role::CandidateResource)).await
    }

    /// Checks an internal link found on a page.
    pub async fn resolve_internal_link(&self, locator: &Locator) -> ResolutionOutcome {
        self.run(&with_role(locator, Role::InternalLink)).await
    }

    #[instrument(skip(self, locator), fields(id = locator.id_or_empty(), target = %locator.target_url, role = %locator.role))]
    async fn run(&self, locator: &Locator) -> ResolutionOutcome {
        if let Some(id) = self.index.get(&locator.target_url) {
            debug!("target already found, no connection made");
            return ResolutionOutcome::duplicate(
                locator,
                &AlreadyFoundIndex::key(&locator.target_url),
                &id,
            );
        }

        let mut attempt = match self.open(locator, &locator.target_url, false).await {
            Opened::Terminal(attempt) => attempt,
            Opened::Duplicate(outcome) | Opened::Failed(outcome) => return outcome,
        };
        let outcome = self.classify_terminal(locator, &mut attempt).await;
        attempt.close();
        debug!(kind = %outcome.kind, comment = %outcome.comment, "resolution finished");
        outcome
    }

    async fn open(&self, locator: &Locator, target: &str, force_get: bool) -> Opened {
        let followed = match self.manager.attempt(target, locator.role, force_get).await {
            Ok(attempt) => self.redirects.follow(attempt, locator).await,
            Err(error) => Err(error.into()),
        };
        match followed {
            Ok(FollowOutcome::Terminal { attempt, .. }) => Opened::Terminal(attempt),
            Ok(FollowOutcome::AlreadyFound { url, id }) => {
                Opened::Duplicate(ResolutionOutcome::duplicate(locator, &url, &id))
            }
            Err(error) => Opened::Failed(ResolutionOutcome::from_error(locator, &error)),
        }
    }

    async fn classify_terminal(&self, locator: &Locator, attempt: &mut Attempt) -> ResolutionOutcome {
        let role = locator.role;
        let mut page_body = None;
        let mut sniff = None;

        if role.policy().must_classify && needs_sniff(&header_input(attempt, attempt.url().as_str(), self.families)) {
            if *attempt.method() == Method::HEAD {
                let final_url = attempt.url().to_string();
                attempt.close();
                match self.open(locator, &final_url, true).await {
                    Opened::Terminal(reopened) => *attempt = reopened,
                    Opened::Duplicate(outcome) | Opened::Failed(outcome) => return outcome,
                }
            }
            let read = if role == Role::PageRequest {
                attempt.read_body(self.max_page_bytes).await.map(|body| {
                    let sniffed = sniff_prefix(&body, true).unwrap_or(BodySniff::Undefined);
                    page_body = Some(body);
                    sniffed
                })
            } else {
                attempt.sniff().await
            };
            match read {
                Ok(sniffed) => sniff = Some(sniffed),
                Err(error) => {
                    let error = self.manager.body_failure(attempt.url(), error);
                    return ResolutionOutcome::from_error(locator, &error.into());
                }
            }
        }

        let final_url = canonical_url(attempt.url()).to_string();
        let kind = {
            let input = ClassifyInput {
                sniff,
                ..header_input(attempt, &final_url, self.families)
            };
            classify(&input)
        };
        debug!(url = %final_url, kind = %kind, sniffed = sniff.is_some(), "classified");

        let outcome = match kind {
            ContentKind::Document | ContentKind::Dataset => {
                self.found_resource(locator, attempt, kind, &final_url).await
            }
            ContentKind::Page => self.found_page(locator, attempt, &final_url, page_body).await,
            ContentKind::Unknown => self.unknown(locator, attempt, &final_url),
        };
        self.finish(locator, outcome, &final_url, attempt.method())
    }

    async fn found_resource(
        &self,
        locator: &Locator,
        attempt: &mut Attempt,
        kind: ContentKind,
        final_url: &str,
    ) -> ResolutionOutcome {
        if !self.index.insert_first(final_url, locator.id_or_empty()) {
            let first = self.index.get(final_url).unwrap_or_default();
            return ResolutionOutcome::duplicate(locator, final_url, &first);
        }
        let hits = self.health().record_hit(&domain_of(attempt.url()));
        info!(url = %final_url, kind = %kind, domain_hits = hits, "resource found");

        let mut outcome = ResolutionOutcome::new(locator, OutcomeKind::from(kind));
        if let Some(store) = &self.store {
            match self.retrieve(store.as_ref(), locator, attempt, kind, final_url).await {
                Ok(path) => outcome.stored_path = Some(path),
                Err(error) => outcome.comment = error.to_string(),
            }
        }
        outcome
    }

    async fn retrieve(
        &self,
        store: &dyn FileStore,
        locator: &Locator,
        attempt: &mut Attempt,
        kind: ContentKind,
        final_url: &str,
    ) -> Result<PathBuf, ResolveError> {
        if attempt.is_closed() || *attempt.method() == Method::HEAD {
            // Sniffed bodies are consumed line-wise; fetch the exact bytes again.
            attempt.close();
            let reopened = self
                .manager
                .attempt(final_url, locator.role, true)
                .await?;
            match self.redirects.follow(reopened, locator).await? {
                FollowOutcome::Terminal { attempt: fresh, .. } => *attempt = fresh,
                FollowOutcome::AlreadyFound { url, .. } => {
                    return Err(ConnectionError::protocol(url, "retrieval redirected to a known resource").into());
                }
            }
        }
        self.manager.check_size(attempt)?;

        let hint = suggested_filename(
            attempt.content_disposition(),
            attempt.url(),
            attempt.content_type(),
            kind,
            locator.id.as_deref(),
        );
        let url = attempt.url().clone();
        let Some(response) = attempt.take_response() else {
            return Err(ConnectionError::protocol(final_url, "response body already consumed").into());
        };
        match store.store(response, &hint).await {
            Ok(path) => Ok(path),
            Err(StoreError::Network { source, .. }) if source.is_timeout() => Err(self
                .manager
                .body_failure(&url, ConnectionError::timeout(url.as_str()))
                .into()),
            Err(error) => Err(error.into()),
        }
    }

    async fn found_page(
        &self,
        locator: &Locator,
        attempt: &mut Attempt,
        final_url: &str,
        page_body: Option<Vec<u8>>,
    ) -> ResolutionOutcome {
        if locator.role != Role::PageRequest {
            let mut outcome = ResolutionOutcome::new(locator, OutcomeKind::Page);
            outcome.comment = "Link leads to a page, not to a resource".to_string();
            return outcome;
        }
        if final_url.to_lowercase().contains(VIEW_CONTENT_MARKER) {
            return discarded(locator);
        }

        let body = match page_body {
            Some(body) => body,
            None => match attempt.read_body(self.max_page_bytes).await {
                Ok(body) => body,
                Err(error) => {
                    let error = self.manager.body_failure(attempt.url(), error);
                    return ResolutionOutcome::from_error(locator, &error.into());
                }
            },
        };
        let mut outcome = ResolutionOutcome::new(locator, OutcomeKind::Page);
        outcome.page_html = Some(String::from_utf8_lossy(&body).into_owned());
        outcome
    }

    fn unknown(&self, locator: &Locator, attempt: &Attempt, final_url: &str) -> ResolutionOutcome {
        let role = locator.role;
        if role == Role::PageRequest && final_url.to_lowercase().contains(VIEW_CONTENT_MARKER) {
            return discarded(locator);
        }

        let no_type = attempt.content_type().is_none() && attempt.content_disposition().is_none();
        let unsought = attempt
            .content_type()
            .and_then(plain_mime_type)
            .is_some_and(|plain| is_document_mime(&plain) || is_dataset_mime(&plain));
        let (category, mut comment) = if unsought {
            (
                None,
                format!(
                    "Not a sought resource family (content-type: {})",
                    attempt.content_type().unwrap_or("none")
                ),
            )
        } else if no_type && role.policy().must_classify {
            (
                Some(FailureCategory::NoTypeReturned),
                ResolveError::ClassificationUnknown {
                    url: final_url.to_string(),
                }
                .to_string(),
            )
        } else if role == Role::PageRequest {
            (
                Some(FailureCategory::NotDocNorPage),
                format!(
                    "Not a document nor a crawlable page (content-type: {})",
                    attempt.content_type().unwrap_or("none")
                ),
            )
        } else {
            (
                None,
                format!(
                    "Not a document or dataset (content-type: {})",
                    attempt.content_type().unwrap_or("none")
                ),
            )
        };

        if let Some(category) = category {
            let domain = domain_of(attempt.url());
            if self.health().record_failure(&domain, category) == FailureVerdict::Blacklisted {
                comment.push_str("; domain blocked");
            }
        }
        ResolutionOutcome::unreachable(locator, comment)
    }

    fn finish(
        &self,
        locator: &Locator,
        mut outcome: ResolutionOutcome,
        final_url: &str,
        method: &Method,
    ) -> ResolutionOutcome {
        if outcome.final_url.is_none() {
            outcome.final_url = Some(final_url.to_string());
        }
        outcome.method = Some(method.to_string());
        if locator.role == Role::PageRequest {
            outcome.page_url = final_url.to_string();
            let key = AlreadyFoundIndex::key(final_url);
            outcome.was_direct_link = outcome.kind.is_valid()
                && (key == AlreadyFoundIndex::key(&locator.page_url)
                    || key == AlreadyFoundIndex::key(&locator.source_url));
        }
        outcome
    }
}

fn with_role(locator: &Locator, role: Role) -> Locator {
    Locator {
        role,
        ..locator.clone()
    }
}

fn header_input<'a>(
    attempt: &'a Attempt,
    url: &'a str,
    families: ResourceFamilies,
) -> ClassifyInput<'a> {
    ClassifyInput {
        url,
        content_type: attempt.content_type(),
        content_disposition: attempt.content_disposition(),
        sniff: None,
        families,
    }
}

fn discarded(locator: &Locator) -> ResolutionOutcome {
    ResolutionOutcome::unreachable(
        locator,
        "Discarded: not a document and not a crawlable page",
    )
}
