//! Opening one HTTP attempt under the domain-health rules.
//!
//! [`ConnectionManager::attempt`] is the only place in the crate that sends
//! requests. Every call checks the blacklist and the 403 path set first, waits
//! its politeness turn, and afterwards folds what it learned (HEAD rejected,
//! `Accept-Language` rejected, DNS/TLS/timeout failures) back into the
//! [`DomainHealthStore`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::{Client, Method};
use tracing::{debug, instrument};
use url::Url;

use super::attempt::Attempt;
use super::client::build_client;
use super::error::ConnectionError;
use super::transport::{TransportFailure, classify_transport_error, describe};
use crate::classify::repair_escaped_ampersand;
use crate::config::{EngineConfig, TimeoutSettings};
use crate::domain::{BlockReason, DomainHealthStore, FailureCategory, FailureVerdict, domain_of, path_of};
use crate::resolve::Role;
use crate::user_agent;

/// Sends requests on behalf of every worker in a run.
#[derive(Debug)]
pub struct ConnectionManager {
    client: Client,
    health: Arc<DomainHealthStore>,
    timeouts: TimeoutSettings,
    downloading: bool,
    max_content_bytes: u64,
    attempts: AtomicUsize,
}

impl ConnectionManager {
    /// Creates a manager with its own client.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the client cannot be built.
    pub fn new(config: &EngineConfig, health: Arc<DomainHealthStore>) -> Result<Self, reqwest::Error> {
        let client = build_client(&config.timeouts, &config.user_agent)?;
        Ok(Self::with_client(client, config, health))
    }

    /// Creates a manager around an existing client.
    #[must_use]
    pub fn with_client(client: Client, config: &EngineConfig, health: Arc<DomainHealthStore>) -> Self {
        Self {
            client,
            health,
            timeouts: config.timeouts,
            downloading: config.download,
            max_content_bytes: config.max_content_bytes,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Shared domain-health store.
    #[must_use]
    pub fn health(&self) -> &Arc<DomainHealthStore> {
        &self.health
    }

    /// Requests actually sent so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Rejects an attempt whose declared size is above the retrieval limit.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::ContentTooLarge`].
    pub fn check_size(&self, attempt: &Attempt) -> Result<(), ConnectionError> {
        match attempt.content_length() {
            Some(bytes) if bytes > self.max_content_bytes => Err(ConnectionError::ContentTooLarge {
                url: attempt.url().to_string(),
                bytes,
            }),
            _ => Ok(()),
        }
    }

    /// Folds a failure raised while reading the body of `url` back into
    /// domain health. Read timeouts count as `timeout_or_connect` failures
    /// and turn into [`ConnectionError::Blocked`] once they blacklist the
    /// domain; other errors pass through untouched.
    pub fn body_failure(&self, url: &Url, error: ConnectionError) -> ConnectionError {
        match error {
            ConnectionError::Timeout { .. } => self.count_timeout(url, &domain_of(url)),
            other => other,
        }
    }

    fn count_timeout(&self, url: &Url, domain: &str) -> ConnectionError {
        match self
            .health
            .record_failure(domain, FailureCategory::TimeoutOrConnectError)
        {
            FailureVerdict::Blacklisted | FailureVerdict::AlreadyBlacklisted => ConnectionError::blocked(
                domain,
                BlockReason::Threshold(FailureCategory::TimeoutOrConnectError).to_string(),
            ),
            _ => ConnectionError::timeout(url.as_str()),
        }
    }

    /// Opens one request to `target` for the given role.
    ///
    /// HEAD is used unless the role needs the body, the domain is known to
    /// reject HEAD, or `force_get` is set. A 405/501 on HEAD switches the
    /// domain to GET; a 406 drops `Accept-Language` for the domain. Both
    /// retries keep the rest of the request unchanged.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::Blocked`] for blacklisted domains and blocked
    ///   paths, and when DNS, TLS or repeated timeouts blacklist the domain.
    /// - [`ConnectionError::HeadUnsupported`] when HEAD is rejected on an
    ///   internal link.
    /// - [`ConnectionError::Timeout`], [`ConnectionError::Protocol`] and
    ///   [`ConnectionError::InvalidUrl`] otherwise.
    #[instrument(skip(self), fields(domain))]
    pub async fn attempt(
        &self,
        target: &str,
        role: Role,
        force_get: bool,
    ) -> Result<Attempt, ConnectionError> {
        let repaired = repair_escaped_ampersand(target);
        let force_get = force_get || repaired.is_some();
        let target = repaired.as_deref().unwrap_or(target);

        let mut url = Url::parse(target).map_err(|_| ConnectionError::invalid_url(target))?;
        if url.host_str().is_none() || !matches!(url.scheme(), "http" | "https") {
            return Err(ConnectionError::invalid_url(target));
        }
        let domain = domain_of(&url);
        tracing::Span::current().record("domain", domain.as_str());

        self.ensure_allowed(&domain, &url)?;

        if url.scheme() == "http" && self.health.is_https_confirmed(&domain) {
            // Only fails for non-special schemes, which were rejected above.
            let _ = url.set_scheme("https");
            debug!(domain = %domain, url = %url, "rewrote to https");
        }

        let head_unsupported = self.health.is_head_unsupported(&domain);
        if role == Role::InternalLink && head_unsupported && !force_get {
            return Err(ConnectionError::head_unsupported(url.as_str(), &domain));
        }

        let mut method = if force_get || head_unsupported || role.starts_with_get(self.downloading) {
            Method::GET
        } else {
            Method::HEAD
        };
        let mut with_language = !self.health.is_accept_language_unsupported(&domain);

        loop {
            let response = self.send(&url, &domain, &method, with_language).await?;
            let status = response.status().as_u16();

            if method == Method::HEAD && matches!(status, 405 | 501) {
                self.health.mark_head_unsupported(&domain);
                if !role.policy().get_fallback {
                    return Err(ConnectionError::head_unsupported(url.as_str(), &domain));
                }
                debug!(domain = %domain, status, "HEAD rejected, retrying with GET");
                method = Method::GET;
                continue;
            }

            if status == 406 && with_language {
                self.health.mark_accept_language_unsupported(&domain);
                debug!(domain = %domain, "406 received, retrying without Accept-Language");
                with_language = false;
                continue;
            }

            return Ok(Attempt::new(url, method, response));
        }
    }

    fn ensure_allowed(&self, domain: &str, url: &Url) -> Result<(), ConnectionError> {
        if self.health.is_blacklisted(domain) {
            let reason = self
                .health
                .record(domain)
                .block_reason()
                .map_or_else(|| "blacklisted".to_string(), ToString::to_string);
            return Err(ConnectionError::blocked(domain, reason));
        }
        let path = path_of(url);
        if self.health.is_path_blocked(domain, &path) {
            return Err(ConnectionError::blocked(
                domain,
                format!("path {path} is 403-blocked"),
            ));
        }
        Ok(())
    }

    async fn send(
        &self,
        url: &Url,
        domain: &str,
        method: &Method,
        with_language: bool,
    ) -> Result<reqwest::Response, ConnectionError> {
        self.health.wait_for_turn(domain).await;
        // Another worker may have blacklisted the domain while this one waited.
        self.ensure_allowed(domain, url)?;

        let mut request = self.client.request(method.clone(), url.clone());
        if *method == Method::HEAD {
            request = request.timeout(self.timeouts.head);
        }
        if with_language {
            request = request.header(ACCEPT_LANGUAGE, user_agent::ACCEPT_LANGUAGE);
        }

        self.attempts.fetch_add(1, Ordering::SeqCst);
        debug!(domain = %domain, method = %method, url = %url, "sending request");
        request
            .send()
            .await
            .map_err(|e| self.transport_failure(url, domain, &e))
    }

    fn transport_failure(&self, url: &Url, domain: &str, error: &reqwest::Error) -> ConnectionError {
        match classify_transport_error(error) {
            TransportFailure::UnknownHost => {
                self.health.blacklist(domain, BlockReason::UnknownHost);
                ConnectionError::blocked(domain, BlockReason::UnknownHost.to_string())
            }
            TransportFailure::Tls => {
                self.health.record_failure(domain, FailureCategory::SslError);
                ConnectionError::blocked(domain, BlockReason::Tls.to_string())
            }
            TransportFailure::Timeout => self.count_timeout(url, domain),
            TransportFailure::Other => ConnectionError::protocol(url.as_str(), describe(error)),
        }
    }
}
