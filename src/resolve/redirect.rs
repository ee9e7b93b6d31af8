//! Walking redirect chains hop by hop.

use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, info, instrument};
use url::{Position, Url};

use super::error::ResolveError;
use super::found_index::AlreadyFoundIndex;
use super::locator::{Locator, Role};
use crate::classify::{canonical_url, internal_link_rejection, is_shared_site_session, page_url_rejection};
use crate::config::RedirectLimits;
use crate::connection::{Attempt, ConnectionError, ConnectionManager};
use crate::domain::{BlockReason, StatusVerdict, domain_of};
use crate::frontier::first_link;

/// Upper bound on a 300 body read to find its first link.
const MULTIPLE_CHOICES_BODY_LIMIT: usize = 256 * 1024;

/// How a redirect chain ended, when it did not fail.
#[derive(Debug)]
pub enum FollowOutcome {
    /// A 2xx response.
    Terminal {
        /// The open terminal response.
        attempt: Attempt,
        /// Redirects followed to get there.
        hops: u8,
    },
    /// A hop pointed at a resource that was already found.
    AlreadyFound {
        /// The already-found URL.
        url: String,
        /// Id that found it first.
        id: String,
    },
}

/// Follows redirects through the [`ConnectionManager`], so every hop is
/// subject to blacklist, path-block and politeness checks.
#[derive(Debug)]
pub struct RedirectResolver {
    manager: Arc<ConnectionManager>,
    index: Arc<AlreadyFoundIndex>,
    limits: RedirectLimits,
}

impl RedirectResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        manager: Arc<ConnectionManager>,
        index: Arc<AlreadyFoundIndex>,
        limits: RedirectLimits,
    ) -> Self {
        Self {
            manager,
            index,
            limits,
        }
    }

    /// Follows `initial` until a 2xx, an error status, or a rejection.
    ///
    /// A chain of exactly the role's budget of redirects is allowed; one more
    /// fails with [`ResolveError::RedirectBudgetExceeded`].
    ///
    /// # Errors
    ///
    /// - [`ResolveError::RedirectBudgetExceeded`] past the role's budget.
    /// - [`ResolveError::RejectedTarget`] when a target matches an exclusion rule.
    /// - [`ResolveError::MissingLocation`] for a redirect without a target.
    /// - [`ResolveError::ErrorStatus`] when the chain ends on a 4xx/5xx.
    /// - [`ResolveError::Connection`] for blocked domains (including shared
    ///   site sessions) and failures while opening the next hop.
    #[instrument(skip(self, initial, locator), fields(target = %locator.target_url, role = %locator.role))]
    pub async fn follow(
        &self,
        initial: Attempt,
        locator: &Locator,
    ) -> Result<FollowOutcome, ResolveError> {
        let role = locator.role;
        let budget = role.redirect_budget(&self.limits);
        let mut current = initial;
        let mut hops: u8 = 0;

        loop {
            if current.is_success() {
                return Ok(FollowOutcome::Terminal {
                    attempt: current,
                    hops,
                });
            }

            let status = current.status();
            let from = current.url().clone();
            if !current.is_redirect() {
                current.close();
                return Err(self.error_status(&from, status));
            }
            if hops >= budget {
                current.close();
                return Err(ResolveError::RedirectBudgetExceeded {
                    url: from.to_string(),
                    limit: budget,
                });
            }

            let target = self.next_target(&mut current).await;
            current.close();
            let target = target?;
            hops += 1;
            debug!(from = %from, to = %target, hop = hops, "following redirect");

            let lower = target.as_str().to_lowercase();
            if is_shared_site_session(&lower) {
                let target_domain = domain_of(&target);
                let from_domain = domain_of(&from);
                let health = self.manager.health();
                health.blacklist(&target_domain, BlockReason::SharedSiteSession);
                health.blacklist(&from_domain, BlockReason::SharedSiteSession);
                info!(target_domain = %target_domain, from_domain = %from_domain, "shared site session redirect, both domains blocked");
                return Err(ConnectionError::blocked(
                    target_domain,
                    BlockReason::SharedSiteSession.to_string(),
                )
                .into());
            }

            let rejection = match role {
                Role::InternalLink => internal_link_rejection(&lower),
                Role::PageRequest | Role::CandidateResource => page_url_rejection(&lower),
            };
            if let Some(rule) = rejection {
                return Err(ResolveError::RejectedTarget {
                    url: target.to_string(),
                    rule,
                });
            }

            if let Some(id) = self.index.get(target.as_str()) {
                return Ok(FollowOutcome::AlreadyFound {
                    url: target.to_string(),
                    id,
                });
            }

            if is_scheme_upgrade(&from, &target) {
                self.manager.health().confirm_https(&domain_of(&target));
            }

            let force_get = *current.method() == Method::GET;
            current = self
                .manager
                .attempt(target.as_str(), role, force_get)
                .await?;
        }
    }

    async fn next_target(&self, current: &mut Attempt) -> Result<Url, ResolveError> {
        let base = current.url().clone();
        let location = current.location().map(str::to_string);
        let raw = match location {
            Some(location) => base.join(location.trim()).ok(),
            None if current.status() == 300 => {
                let body = current.read_body(MULTIPLE_CHOICES_BODY_LIMIT).await?;
                first_link(&String::from_utf8_lossy(&body), &base)
            }
            None => None,
        };
        raw.map(|url| canonical_url(&url))
            .ok_or_else(|| ResolveError::MissingLocation {
                url: base.to_string(),
                status: current.status(),
            })
    }

    fn error_status(&self, url: &Url, status: u16) -> ResolveError {
        match self.manager.health().on_error_status(url, status) {
            StatusVerdict::Unreachable { message } => ResolveError::ErrorStatus {
                url: url.to_string(),
                status,
                message,
            },
            StatusVerdict::Blocked { domain, message } => {
                ConnectionError::blocked(domain, message).into()
            }
        }
    }
}

/// Returns whether `to` is `from` with only the scheme upgraded to https.
fn is_scheme_upgrade(from: &Url, to: &Url) -> bool {
    from.scheme() == "http"
        && to.scheme() == "https"
        && from[Position::BeforeHost..Position::AfterHost] == to[Position::BeforeHost..Position::AfterHost]
        && from[Position::BeforePath..] == to[Position::BeforePath..]
}
