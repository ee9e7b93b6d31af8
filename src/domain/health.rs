//! Per-domain operating knowledge shared by every worker in a run.
//!
//! # Overview
//!
//! [`DomainHealthStore`] owns one [`DomainHealthRecord`] per domain key. A
//! record collects what the run has learned about a domain: whether it is
//! blacklisted, whether it rejects HEAD or `Accept-Language`, whether it is
//! known to serve HTTPS, how often each failure category occurred, which paths
//! answered 403 too often, and when it was last contacted.
//!
//! Records are created lazily and never removed. A blacklisted record is
//! terminal: nothing in the crate connects to that domain again.
//!
//! # Example
//!
//! ```
//! use docfinder_core::config::FailureThresholds;
//! use docfinder_core::domain::{DomainHealthStore, FailureCategory, FailureVerdict};
//!
//! let thresholds = FailureThresholds { server_error_5xx: 1, ..FailureThresholds::default() };
//! let store = DomainHealthStore::new(thresholds);
//!
//! assert!(matches!(store.record_failure("example.org", FailureCategory::ServerError5xx), FailureVerdict::Counted { count: 1 }));
//! assert_eq!(store.record_failure("example.org", FailureCategory::ServerError5xx), FailureVerdict::Blacklisted);
//! assert!(store.is_blacklisted("example.org"));
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::key::{domain_key, domain_of, path_of};
use crate::config::{FailureThresholds, PolitenessBand};

/// Domain-attributed failure categories with their own counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// HTTP 5xx responses.
    ServerError5xx,
    /// Connect or read timeouts.
    TimeoutOrConnectError,
    /// TLS handshake or certificate failures.
    SslError,
    /// Responses carrying no usable type information.
    NoTypeReturned,
    /// Page requests answered with something that is neither document nor page.
    NotDocNorPage,
}

impl FailureCategory {
    /// Stable name used in logs and comments.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerError5xx => "server_error_5xx",
            Self::TimeoutOrConnectError => "timeout_or_connect",
            Self::SslError => "ssl_error",
            Self::NoTypeReturned => "no_type_returned",
            Self::NotDocNorPage => "not_doc_nor_page",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a domain ended up blacklisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// DNS resolution failed.
    UnknownHost,
    /// TLS handshake failed.
    Tls,
    /// A failure counter crossed its threshold.
    Threshold(FailureCategory),
    /// Too many individual paths were 403-blocked.
    BlockedPaths,
    /// The server answered with a status outside 2xx-5xx.
    UnexpectedStatus(u16),
    /// A redirect chain went through a shared-site-session bootstrap.
    SharedSiteSession,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownHost => f.write_str("unknown host"),
            Self::Tls => f.write_str("TLS failure"),
            Self::Threshold(category) => write!(f, "too many {category} failures"),
            Self::BlockedPaths => f.write_str("too many 403-blocked paths"),
            Self::UnexpectedStatus(status) => write!(f, "unexpected HTTP status {status}"),
            Self::SharedSiteSession => f.write_str("shared site session redirect"),
        }
    }
}

/// Result of [`DomainHealthStore::record_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    /// Counted, still below the threshold.
    Counted {
        /// Current count for the category.
        count: u32,
    },
    /// Threshold crossed but the domain's hit record earned it a pass.
    Tolerated {
        /// Current count for the category.
        count: u32,
        /// Confirmed document/dataset hits for the domain.
        hits: u32,
    },
    /// This failure blacklisted the domain.
    Blacklisted,
    /// The domain was already blacklisted; nothing was counted.
    AlreadyBlacklisted,
}

/// Result of [`DomainHealthStore::record_403`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathVerdict {
    /// Counted, still below the threshold.
    Counted {
        /// Current 403 count for the path.
        count: u32,
    },
    /// The path is blocked.
    PathBlocked,
    /// The domain is blacklisted, either now or earlier.
    DomainBlacklisted,
}

/// Result of [`DomainHealthStore::on_error_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusVerdict {
    /// The URL is unreachable; the domain stays usable.
    Unreachable {
        /// Human-readable cause.
        message: String,
    },
    /// The status got the domain blacklisted.
    Blocked {
        /// Domain key that was blacklisted.
        domain: String,
        /// Human-readable cause.
        message: String,
    },
}

#[derive(Debug, Default)]
struct PathBook {
    counts: HashMap<String, u32>,
    blocked: HashSet<String>,
}

/// Everything the run knows about one domain.
#[derive(Debug)]
pub struct DomainHealthRecord {
    block_reason: OnceLock<BlockReason>,
    head_unsupported: AtomicBool,
    accept_language_unsupported: AtomicBool,
    https_confirmed: AtomicBool,
    hits: AtomicU32,
    counters: Mutex<HashMap<FailureCategory, u32>>,
    paths: Mutex<PathBook>,
    /// Politeness decision state. Held only while deciding and sleeping,
    /// never across the request itself.
    pub(super) last_connected: tokio::sync::Mutex<Option<Instant>>,
    pub(super) cumulative_wait_ms: AtomicU64,
}

impl DomainHealthRecord {
    fn new() -> Self {
        Self {
            block_reason: OnceLock::new(),
            head_unsupported: AtomicBool::new(false),
            accept_language_unsupported: AtomicBool::new(false),
            https_confirmed: AtomicBool::new(false),
            hits: AtomicU32::new(0),
            counters: Mutex::new(HashMap::new()),
            paths: Mutex::new(PathBook::default()),
            last_connected: tokio::sync::Mutex::new(None),
            cumulative_wait_ms: AtomicU64::new(0),
        }
    }

    /// Returns whether the domain is blacklisted.
    #[must_use]
    pub fn is_blacklisted(&self) -> bool {
        self.block_reason.get().is_some()
    }

    /// Reason the domain was blacklisted, if it was.
    #[must_use]
    pub fn block_reason(&self) -> Option<&BlockReason> {
        self.block_reason.get()
    }

    /// Confirmed document/dataset hits on this domain.
    #[must_use]
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }

    /// Current count for one failure category.
    #[must_use]
    pub fn failure_count(&self, category: FailureCategory) -> u32 {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&category)
            .copied()
            .unwrap_or(0)
    }
}

/// Run-scoped registry of [`DomainHealthRecord`]s.
///
/// Designed to be wrapped in `Arc` and shared by every component. Records
/// live behind `Arc` inside a `DashMap`, so callers clone the record out and
/// release the shard lock before doing anything slow.
#[derive(Debug)]
pub struct DomainHealthStore {
    thresholds: FailureThresholds,
    pub(super) politeness: PolitenessBand,
    records: DashMap<String, Arc<DomainHealthRecord>>,
    tls_blacklisted: AtomicUsize,
}

impl DomainHealthStore {
    /// Creates a store with the given thresholds and no politeness delay.
    #[must_use]
    pub fn new(thresholds: FailureThresholds) -> Self {
        Self::with_politeness(thresholds, PolitenessBand::disabled())
    }

    /// Creates a store with the given thresholds and politeness band.
    #[must_use]
    pub fn with_politeness(thresholds: FailureThresholds, politeness: PolitenessBand) -> Self {
        debug!(
            politeness_min_ms = politeness.min.as_millis(),
            politeness_max_ms = politeness.max.as_millis(),
            "creating domain health store"
        );
        Self {
            thresholds,
            politeness,
            records: DashMap::new(),
            tls_blacklisted: AtomicUsize::new(0),
        }
    }

    /// Marks the given domains as HEAD-unsupported up front.
    #[must_use]
    pub fn with_get_only_domains<I, S>(self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for domain in domains {
            self.record(domain.as_ref())
                .head_unsupported
                .store(true, Ordering::SeqCst);
        }
        self
    }

    /// Configured thresholds.
    #[must_use]
    pub fn thresholds(&self) -> &FailureThresholds {
        &self.thresholds
    }

    /// Returns the record for a domain, creating it on first contact.
    #[must_use]
    pub fn record(&self, domain: &str) -> Arc<DomainHealthRecord> {
        self.records
            .entry(domain_key(domain))
            .or_insert_with(|| Arc::new(DomainHealthRecord::new()))
            .clone()
    }

    fn existing(&self, domain: &str) -> Option<Arc<DomainHealthRecord>> {
        self.records
            .get(&domain_key(domain))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns whether the domain is blacklisted. Never creates a record.
    #[must_use]
    pub fn is_blacklisted(&self, domain: &str) -> bool {
        self.existing(domain)
            .is_some_and(|record| record.is_blacklisted())
    }

    /// Blacklists a domain. Returns `true` if this call did it.
    pub fn blacklist(&self, domain: &str, reason: BlockReason) -> bool {
        let record = self.record(domain);
        self.blacklist_record(domain, &record, reason)
    }

    fn blacklist_record(
        &self,
        domain: &str,
        record: &DomainHealthRecord,
        reason: BlockReason,
    ) -> bool {
        let is_tls = reason == BlockReason::Tls;
        match record.block_reason.set(reason) {
            Ok(()) => {
                if is_tls {
                    self.tls_blacklisted.fetch_add(1, Ordering::SeqCst);
                }
                record
                    .counters
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear();
                warn!(
                    domain = %domain_key(domain),
                    reason = %record.block_reason().map_or_else(String::new, ToString::to_string),
                    "domain blacklisted"
                );
                true
            }
            Err(_) => false,
        }
    }

    /// Counts one failure and blacklists the domain once the category's
    /// threshold is crossed, unless its hit record earns it leniency.
    ///
    /// TLS failures blacklist immediately and are never tolerated.
    pub fn record_failure(&self, domain: &str, category: FailureCategory) -> FailureVerdict {
        let record = self.record(domain);
        if record.is_blacklisted() {
            return FailureVerdict::AlreadyBlacklisted;
        }
        if category == FailureCategory::SslError {
            return if self.blacklist_record(domain, &record, BlockReason::Tls) {
                FailureVerdict::Blacklisted
            } else {
                FailureVerdict::AlreadyBlacklisted
            };
        }

        let threshold = self.threshold_for(category);
        let mut counters = record
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let count = counters.entry(category).or_insert(0);
        *count += 1;
        let bad = *count;

        if bad <= threshold {
            debug!(domain = %domain_key(domain), category = %category, count = bad, "failure counted");
            return FailureVerdict::Counted { count: bad };
        }

        let hits = record.hits();
        if hits >= bad {
            info!(
                domain = %domain_key(domain),
                category = %category,
                count = bad,
                hits,
                "failure threshold crossed, tolerated for productive domain"
            );
            return FailureVerdict::Tolerated { count: bad, hits };
        }

        drop(counters);
        if self.blacklist_record(domain, &record, BlockReason::Threshold(category)) {
            FailureVerdict::Blacklisted
        } else {
            FailureVerdict::AlreadyBlacklisted
        }
    }

    fn threshold_for(&self, category: FailureCategory) -> u32 {
        match category {
            FailureCategory::ServerError5xx => self.thresholds.server_error_5xx,
            FailureCategory::TimeoutOrConnectError => self.thresholds.timeout_or_connect,
            FailureCategory::NoTypeReturned => self.thresholds.no_type_returned,
            FailureCategory::NotDocNorPage => self.thresholds.not_doc_nor_page,
            FailureCategory::SslError => 0,
        }
    }

    /// Counts a 403 on `path`. The path is blocked on the 403 that pushes its
    /// count past the threshold; too many blocked paths blacklist the domain
    /// and drop its path bookkeeping.
    pub fn record_403(&self, domain: &str, path: &str) -> PathVerdict {
        let record = self.record(domain);
        if record.is_blacklisted() {
            return PathVerdict::DomainBlacklisted;
        }

        let mut paths = record.paths.lock().unwrap_or_else(PoisonError::into_inner);
        if paths.blocked.contains(path) {
            return PathVerdict::PathBlocked;
        }

        let count = paths.counts.entry(path.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        if count <= self.thresholds.path_403 {
            debug!(domain = %domain_key(domain), path, count, "403 counted");
            return PathVerdict::Counted { count };
        }

        paths.counts.remove(path);
        paths.blocked.insert(path.to_string());
        info!(domain = %domain_key(domain), path, "path blocked after repeated 403");

        if paths.blocked.len() > self.thresholds.blocked_paths {
            paths.counts.clear();
            paths.blocked.clear();
            drop(paths);
            self.blacklist_record(domain, &record, BlockReason::BlockedPaths);
            return PathVerdict::DomainBlacklisted;
        }
        PathVerdict::PathBlocked
    }

    /// Returns whether `path` is 403-blocked on the domain.
    #[must_use]
    pub fn is_path_blocked(&self, domain: &str, path: &str) -> bool {
        self.existing(domain).is_some_and(|record| {
            record
                .paths
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .blocked
                .contains(path)
        })
    }

    /// Records one confirmed document/dataset on the domain.
    pub fn record_hit(&self, domain: &str) -> u32 {
        self.record(domain).hits.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Marks the domain as rejecting HEAD. Returns `true` if newly marked.
    pub fn mark_head_unsupported(&self, domain: &str) -> bool {
        let newly = !self
            .record(domain)
            .head_unsupported
            .swap(true, Ordering::SeqCst);
        if newly {
            info!(domain = %domain_key(domain), "domain does not support HEAD");
        }
        newly
    }

    /// Returns whether the domain rejects HEAD.
    #[must_use]
    pub fn is_head_unsupported(&self, domain: &str) -> bool {
        self.existing(domain)
            .is_some_and(|r| r.head_unsupported.load(Ordering::SeqCst))
    }

    /// Marks the domain as rejecting `Accept-Language`. Returns `true` if newly marked.
    pub fn mark_accept_language_unsupported(&self, domain: &str) -> bool {
        let newly = !self
            .record(domain)
            .accept_language_unsupported
            .swap(true, Ordering::SeqCst);
        if newly {
            info!(domain = %domain_key(domain), "domain rejects Accept-Language");
        }
        newly
    }

    /// Returns whether the domain rejects `Accept-Language`.
    #[must_use]
    pub fn is_accept_language_unsupported(&self, domain: &str) -> bool {
        self.existing(domain)
            .is_some_and(|r| r.accept_language_unsupported.load(Ordering::SeqCst))
    }

    /// Records that the domain upgrades plain HTTP to HTTPS.
    pub fn confirm_https(&self, domain: &str) -> bool {
        let newly = !self
            .record(domain)
            .https_confirmed
            .swap(true, Ordering::SeqCst);
        if newly {
            debug!(domain = %domain_key(domain), "domain confirmed to serve https");
        }
        newly
    }

    /// Returns whether plain-HTTP targets on this domain can be rewritten to HTTPS.
    #[must_use]
    pub fn is_https_confirmed(&self, domain: &str) -> bool {
        self.existing(domain)
            .is_some_and(|r| r.https_confirmed.load(Ordering::SeqCst))
    }

    /// Number of blacklisted domains.
    #[must_use]
    pub fn blacklisted_count(&self) -> usize {
        self.records
            .iter()
            .filter(|entry| entry.value().is_blacklisted())
            .count()
    }

    /// Number of domains blacklisted because of TLS failures.
    #[must_use]
    pub fn tls_blacklisted_count(&self) -> usize {
        self.tls_blacklisted.load(Ordering::SeqCst)
    }

    /// Classifies a non-2xx terminal status and updates domain health.
    ///
    /// - handle.net answering 500 is a missing handle and counts as 404.
    /// - 4xx makes the URL unreachable; 403 also feeds path blocking.
    /// - 5xx feeds the server-error counter.
    /// - 2xx/3xx never reach here from the resolver and leave the domain alone.
    /// - Anything else blacklists the domain.
    pub fn on_error_status(&self, url: &Url, status: u16) -> StatusVerdict {
        let domain = domain_of(url);
        let status = if status == 500
            && url
                .host_str()
                .is_some_and(|host| host.to_ascii_lowercase().contains("handle.net"))
        {
            404
        } else {
            status
        };

        match status {
            200..=399 => StatusVerdict::Unreachable {
                message: format!("Url \"{url}\" returned non-error HTTP {status} where an error was expected"),
            },
            400..=499 => {
                let message =
                    format!("Url \"{url}\" seems to be unreachable. Received: HTTP {status} Client Error");
                if status == 403
                    && self.record_403(&domain, &path_of(url)) == PathVerdict::DomainBlacklisted
                {
                    return StatusVerdict::Blocked { domain, message };
                }
                StatusVerdict::Unreachable { message }
            }
            500..=599 => {
                let message =
                    format!("Url \"{url}\" seems to be unreachable. Received: HTTP {status} Server Error");
                match self.record_failure(&domain, FailureCategory::ServerError5xx) {
                    FailureVerdict::Blacklisted | FailureVerdict::AlreadyBlacklisted => {
                        StatusVerdict::Blocked { domain, message }
                    }
                    _ => StatusVerdict::Unreachable { message },
                }
            }
            _ => {
                self.blacklist(&domain, BlockReason::UnexpectedStatus(status));
                StatusVerdict::Blocked {
                    message: format!("Url \"{url}\" returned unexpected HTTP {status}"),
                    domain,
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store_with(thresholds: FailureThresholds) -> DomainHealthStore {
        DomainHealthStore::new(thresholds)
    }

    // ==================== Failure Counter Tests ====================

    #[test]
    fn test_record_failure_blacklists_after_threshold() {
        let store = store_with(FailureThresholds {
            server_error_5xx: 2,
            ..FailureThresholds::default()
        });

        assert_eq!(
            store.record_failure("example.org", FailureCategory::ServerError5xx),
            FailureVerdict::Counted { count: 1 }
        );
        assert_eq!(
            store.record_failure("example.org", FailureCategory::ServerError5xx),
            FailureVerdict::Counted { count: 2 }
        );
        assert!(!store.is_blacklisted("example.org"));
        assert_eq!(
            store.record_failure("example.org", FailureCategory::ServerError5xx),
            FailureVerdict::Blacklisted
        );
        assert!(store.is_blacklisted("example.org"));
        assert_eq!(
            store.record("example.org").block_reason(),
            Some(&BlockReason::Threshold(FailureCategory::ServerError5xx))
        );
    }

    #[test]
    fn test_blacklisting_clears_counters() {
        let store = store_with(FailureThresholds {
            no_type_returned: 0,
            ..FailureThresholds::default()
        });
        store.record_failure("example.org", FailureCategory::TimeoutOrConnectError);
        store.record_failure("example.org", FailureCategory::NoTypeReturned);

        let record = store.record("example.org");
        assert!(record.is_blacklisted());
        assert_eq!(record.failure_count(FailureCategory::TimeoutOrConnectError), 0);
    }

    #[test]
    fn test_record_failure_after_blacklist_is_noop() {
        let store = store_with(FailureThresholds::default());
        store.blacklist("example.org", BlockReason::UnknownHost);
        assert_eq!(
            store.record_failure("example.org", FailureCategory::ServerError5xx),
            FailureVerdict::AlreadyBlacklisted
        );
        assert_eq!(
            store
                .record("example.org")
                .failure_count(FailureCategory::ServerError5xx),
            0
        );
    }

    #[test]
    fn test_categories_counted_independently() {
        let store = store_with(FailureThresholds {
            server_error_5xx: 1,
            not_doc_nor_page: 1,
            ..FailureThresholds::default()
        });
        store.record_failure("example.org", FailureCategory::ServerError5xx);
        store.record_failure("example.org", FailureCategory::NotDocNorPage);
        assert!(!store.is_blacklisted("example.org"));
    }

    #[test]
    fn test_subdomains_share_one_record() {
        let store = store_with(FailureThresholds {
            server_error_5xx: 1,
            ..FailureThresholds::default()
        });
        store.record_failure("a.repo.uni.edu", FailureCategory::ServerError5xx);
        store.record_failure("b.repo.uni.edu", FailureCategory::ServerError5xx);
        assert!(store.is_blacklisted("c.repo.uni.edu"));
    }

    // ==================== Leniency Tests ====================

    #[test]
    fn test_productive_domain_tolerated_past_threshold() {
        let store = store_with(FailureThresholds {
            server_error_5xx: 2,
            ..FailureThresholds::default()
        });
        for _ in 0..3 {
            store.record_hit("repo.example.org");
        }

        for _ in 0..2 {
            store.record_failure("repo.example.org", FailureCategory::ServerError5xx);
        }
        assert_eq!(
            store.record_failure("repo.example.org", FailureCategory::ServerError5xx),
            FailureVerdict::Tolerated { count: 3, hits: 3 }
        );
        assert!(!store.is_blacklisted("repo.example.org"));

        // Bad count now outgrows the hits.
        assert_eq!(
            store.record_failure("repo.example.org", FailureCategory::ServerError5xx),
            FailureVerdict::Blacklisted
        );
    }

    #[test]
    fn test_unproductive_domain_blacklisted_at_threshold() {
        let store = store_with(FailureThresholds {
            server_error_5xx: 2,
            ..FailureThresholds::default()
        });
        for _ in 0..2 {
            store.record_failure("new.example.org", FailureCategory::ServerError5xx);
        }
        assert_eq!(
            store.record_failure("new.example.org", FailureCategory::ServerError5xx),
            FailureVerdict::Blacklisted
        );
    }

    #[test]
    fn test_tls_failure_never_tolerated() {
        let store = store_with(FailureThresholds::default());
        store.record_hit("secure.example.org");
        store.record_hit("secure.example.org");
        assert_eq!(
            store.record_failure("secure.example.org", FailureCategory::SslError),
            FailureVerdict::Blacklisted
        );
        assert_eq!(store.tls_blacklisted_count(), 1);
        assert_eq!(store.blacklisted_count(), 1);
    }

    // ==================== 403 Path Tests ====================

    #[test]
    fn test_path_blocked_on_threshold_plus_one() {
        let store = store_with(FailureThresholds {
            path_403: 3,
            ..FailureThresholds::default()
        });
        for expected in 1..=3 {
            assert_eq!(
                store.record_403("example.org", "/files/"),
                PathVerdict::Counted { count: expected }
            );
            assert!(!store.is_path_blocked("example.org", "/files/"));
        }
        assert_eq!(
            store.record_403("example.org", "/files/"),
            PathVerdict::PathBlocked
        );
        assert!(store.is_path_blocked("example.org", "/files/"));
        // Stays blocked.
        assert_eq!(
            store.record_403("example.org", "/files/"),
            PathVerdict::PathBlocked
        );
        assert!(!store.is_path_blocked("example.org", "/other/"));
    }

    #[test]
    fn test_blocked_paths_promote_to_domain_blacklist() {
        let store = store_with(FailureThresholds {
            path_403: 0,
            blocked_paths: 2,
            ..FailureThresholds::default()
        });
        assert_eq!(store.record_403("example.org", "/a/"), PathVerdict::PathBlocked);
        assert_eq!(store.record_403("example.org", "/b/"), PathVerdict::PathBlocked);
        assert!(!store.is_blacklisted("example.org"));
        assert_eq!(
            store.record_403("example.org", "/c/"),
            PathVerdict::DomainBlacklisted
        );
        assert!(store.is_blacklisted("example.org"));
        // Path bookkeeping discarded after promotion.
        assert!(!store.is_path_blocked("example.org", "/a/"));
    }

    // ==================== Flag Tests ====================

    #[test]
    fn test_flags_default_false_and_mark_once() {
        let store = store_with(FailureThresholds::default());
        assert!(!store.is_head_unsupported("example.org"));
        assert!(store.mark_head_unsupported("example.org"));
        assert!(!store.mark_head_unsupported("example.org"));
        assert!(store.is_head_unsupported("www.example.org"));

        assert!(!store.is_accept_language_unsupported("example.org"));
        store.mark_accept_language_unsupported("example.org");
        assert!(store.is_accept_language_unsupported("example.org"));

        assert!(!store.is_https_confirmed("example.org"));
        store.confirm_https("example.org");
        assert!(store.is_https_confirmed("example.org"));
    }

    #[test]
    fn test_get_only_domains_seeded_as_head_unsupported() {
        let store = store_with(FailureThresholds::default())
            .with_get_only_domains(["os.zhdk.cloud.switch.ch"]);
        assert!(store.is_head_unsupported("os.zhdk.cloud.switch.ch"));
    }

    #[test]
    fn test_queries_do_not_create_records() {
        let store = store_with(FailureThresholds::default());
        assert!(!store.is_blacklisted("never.seen.org"));
        assert!(!store.is_path_blocked("never.seen.org", "/"));
        assert!(store.records.is_empty());
    }

    // ==================== Error Status Tests ====================

    #[test]
    fn test_on_error_status_client_error_is_unreachable() {
        let store = store_with(FailureThresholds::default());
        let url = Url::parse("https://example.org/missing.pdf").unwrap();
        let verdict = store.on_error_status(&url, 404);
        assert!(matches!(verdict, StatusVerdict::Unreachable { ref message } if message.contains("HTTP 404 Client Error")));
        assert!(!store.is_blacklisted("example.org"));
    }

    #[test]
    fn test_on_error_status_handle_net_500_is_404() {
        let store = store_with(FailureThresholds {
            server_error_5xx: 0,
            ..FailureThresholds::default()
        });
        let url = Url::parse("https://hdl.handle.net/1234/5678").unwrap();
        let verdict = store.on_error_status(&url, 500);
        assert!(matches!(verdict, StatusVerdict::Unreachable { ref message } if message.contains("HTTP 404")));
        assert!(!store.is_blacklisted("hdl.handle.net"));
    }

    #[test]
    fn test_on_error_status_server_error_counts() {
        let store = store_with(FailureThresholds {
            server_error_5xx: 1,
            ..FailureThresholds::default()
        });
        let url = Url::parse("https://example.org/x").unwrap();
        assert!(matches!(
            store.on_error_status(&url, 503),
            StatusVerdict::Unreachable { .. }
        ));
        assert!(matches!(
            store.on_error_status(&url, 503),
            StatusVerdict::Blocked { .. }
        ));
    }

    #[test]
    fn test_on_error_status_unexpected_code_blacklists() {
        let store = store_with(FailureThresholds::default());
        let url = Url::parse("https://linkedin.example.org/x").unwrap();
        let verdict = store.on_error_status(&url, 999);
        assert!(matches!(verdict, StatusVerdict::Blocked { .. }));
        assert!(store.is_blacklisted("linkedin.example.org"));
    }

    #[test]
    fn test_on_error_status_403_feeds_path_blocking() {
        let store = store_with(FailureThresholds {
            path_403: 0,
            ..FailureThresholds::default()
        });
        let url = Url::parse("https://example.org/protected/file.pdf").unwrap();
        store.on_error_status(&url, 403);
        assert!(store.is_path_blocked("example.org", "/protected/"));
    }
}
