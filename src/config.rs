//! Run-wide configuration for the resolution engine.
//!
//! Everything here is read once at construction time. Components copy the
//! pieces they need and never look back at the config during a run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::classify::ResourceFamilies;
use crate::user_agent;

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 100;

/// Default worker count if not specified.
pub const DEFAULT_WORKERS: usize = 10;

/// Default redirect budget for top-level page requests.
pub const DEFAULT_PAGE_REDIRECTS: u8 = 7;

/// Default redirect budget for internal links and candidate resources.
pub const DEFAULT_INTERNAL_REDIRECTS: u8 = 2;

/// Default HEAD request timeout (10 seconds).
pub const HEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Default GET request timeout (15 seconds).
pub const GET_TIMEOUT: Duration = Duration::from_secs(15);

/// Largest resource that will be retrieved (1 GiB).
pub const MAX_CONTENT_BYTES: u64 = 1024 * 1024 * 1024;

/// Largest HTML page body that will be read for link extraction.
pub const MAX_PAGE_BYTES: usize = 8 * 1024 * 1024;

/// Domains that answer HEAD with garbage and need GET from the first request.
pub const GET_ONLY_DOMAINS: [&str; 2] = ["os.zhdk.cloud.switch.ch", "pdf.sciencedirectassets.com"];

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Worker count outside the accepted range.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers {
        /// The rejected value.
        value: usize,
    },

    /// Politeness band whose minimum exceeds its maximum.
    #[error("invalid politeness band: min {min_ms}ms is greater than max {max_ms}ms")]
    InvertedPolitenessBand {
        /// Lower bound in milliseconds.
        min_ms: u128,
        /// Upper bound in milliseconds.
        max_ms: u128,
    },

    /// A redirect budget of zero would reject every redirect.
    #[error("redirect limit for {role} must be at least 1")]
    ZeroRedirectLimit {
        /// Which budget was zero.
        role: &'static str,
    },

    /// A timeout of zero would fail every request.
    #[error("{method} timeout must be greater than zero")]
    ZeroTimeout {
        /// HTTP method the timeout applies to.
        method: &'static str,
    },
}

/// Redirect budgets per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectLimits {
    /// Hops allowed for top-level page requests.
    pub page: u8,
    /// Hops allowed for internal links and candidate resources.
    pub internal: u8,
}

impl Default for RedirectLimits {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE_REDIRECTS,
            internal: DEFAULT_INTERNAL_REDIRECTS,
        }
    }
}

/// Request timeouts per HTTP method.
///
/// `head` bounds connecting and the whole HEAD exchange; `get` bounds each
/// body read so long retrievals are not cut off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSettings {
    /// Connect timeout and total HEAD timeout.
    pub head: Duration,
    /// Per-read timeout.
    pub get: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            head: HEAD_TIMEOUT,
            get: GET_TIMEOUT,
        }
    }
}

/// Randomized spacing between consecutive connections to one domain.
///
/// A wait only happens when the last contact is more recent than `min`.
/// The wait then targets a random point in `min..=max` since that contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessBand {
    /// Lower bound of the band.
    pub min: Duration,
    /// Upper bound of the band.
    pub max: Duration,
}

impl PolitenessBand {
    /// Creates a band from explicit bounds.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// A band that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Returns whether this band applies no delay at all.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.min.is_zero()
    }
}

impl Default for PolitenessBand {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(7),
        }
    }
}

/// Per-category failure thresholds. A category trips on the event that
/// pushes its count past the threshold, so `N` tolerates exactly `N` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureThresholds {
    /// 5xx responses before blacklisting.
    pub server_error_5xx: u32,
    /// Timeouts or connect errors before blacklisting.
    pub timeout_or_connect: u32,
    /// Responses without any type information before blacklisting.
    pub no_type_returned: u32,
    /// Page-request responses that were neither document nor page.
    pub not_doc_nor_page: u32,
    /// 403 responses on one path before the path is blocked.
    pub path_403: u32,
    /// Blocked paths before the whole domain is blacklisted.
    pub blocked_paths: usize,
}

impl Default for FailureThresholds {
    fn default() -> Self {
        Self {
            server_error_5xx: 10,
            timeout_or_connect: 25,
            no_type_returned: 10,
            not_doc_nor_page: 10,
            path_403: 10,
            blocked_paths: 50,
        }
    }
}

/// Complete configuration for one run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of locators resolved concurrently.
    pub workers: usize,
    /// Whether confirmed documents and datasets are retrieved to disk.
    pub download: bool,
    /// Resource families the run is looking for.
    pub families: ResourceFamilies,
    /// Directory retrieved files are written to.
    pub output_dir: PathBuf,
    /// Redirect budgets.
    pub redirects: RedirectLimits,
    /// Request timeouts.
    pub timeouts: TimeoutSettings,
    /// Politeness spacing per domain.
    pub politeness: PolitenessBand,
    /// Domain-health thresholds.
    pub thresholds: FailureThresholds,
    /// Upper bound on a retrieved resource.
    pub max_content_bytes: u64,
    /// Upper bound on a page body read for link extraction.
    pub max_page_bytes: usize,
    /// Internal links checked per page before giving up.
    pub max_internal_links: usize,
    /// Domains that must be fetched with GET.
    pub get_only_domains: Vec<String>,
    /// `User-Agent` sent on every request.
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            download: false,
            families: ResourceFamilies::Both,
            output_dir: PathBuf::from("."),
            redirects: RedirectLimits::default(),
            timeouts: TimeoutSettings::default(),
            politeness: PolitenessBand::default(),
            thresholds: FailureThresholds::default(),
            max_content_bytes: MAX_CONTENT_BYTES,
            max_page_bytes: MAX_PAGE_BYTES,
            max_internal_links: 100,
            get_only_domains: GET_ONLY_DOMAINS.iter().map(ToString::to_string).collect(),
            user_agent: user_agent::BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.workers) {
            return Err(ConfigError::InvalidWorkers {
                value: self.workers,
            });
        }
        if self.politeness.min > self.politeness.max {
            return Err(ConfigError::InvertedPolitenessBand {
                min_ms: self.politeness.min.as_millis(),
                max_ms: self.politeness.max.as_millis(),
            });
        }
        if self.redirects.page == 0 {
            return Err(ConfigError::ZeroRedirectLimit { role: "page" });
        }
        if self.redirects.internal == 0 {
            return Err(ConfigError::ZeroRedirectLimit { role: "internal" });
        }
        if self.timeouts.head.is_zero() {
            return Err(ConfigError::ZeroTimeout { method: "HEAD" });
        }
        if self.timeouts.get.is_zero() {
            return Err(ConfigError::ZeroTimeout { method: "GET" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.redirects.page, 7);
        assert_eq!(config.redirects.internal, 2);
        assert_eq!(config.thresholds.timeout_or_connect, 25);
        assert!(!config.download);
        assert_eq!(config.families, ResourceFamilies::Both);
    }

    #[test]
    fn test_validate_rejects_worker_count_out_of_range() {
        let config = EngineConfig {
            workers: 0,
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidWorkers { value: 0 })
        );

        let config = EngineConfig {
            workers: 101,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_politeness_band() {
        let config = EngineConfig {
            politeness: PolitenessBand::new(Duration::from_secs(5), Duration::from_secs(1)),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedPolitenessBand { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_redirect_budget() {
        let config = EngineConfig {
            redirects: RedirectLimits {
                page: 7,
                internal: 0,
            },
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroRedirectLimit { role: "internal" })
        );
    }

    #[test]
    fn test_disabled_politeness_band() {
        let band = PolitenessBand::disabled();
        assert!(band.is_disabled());
        assert!(!PolitenessBand::default().is_disabled());
    }

    #[test]
    fn test_get_only_domains_seeded() {
        let config = EngineConfig::default();
        assert!(
            config
                .get_only_domains
                .iter()
                .any(|d| d == "os.zhdk.cloud.switch.ch")
        );
    }
}
