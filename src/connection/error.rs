//! Errors raised while opening a single HTTP attempt.

use thiserror::Error;

/// Why a connection attempt produced no response.
///
/// Only [`ConnectionError::Blocked`] and the domain-attributed transport
/// failures touch domain health; the rest concern one URL.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The domain is blacklisted or the path is 403-blocked.
    #[error("{domain} is blocked: {reason}")]
    Blocked {
        /// Domain key that is off-limits.
        domain: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Connect or read timeout.
    #[error("timeout connecting to {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HEAD was rejected and the role forbids falling back to GET.
    #[error("{domain} does not support HEAD, skipping {url}")]
    HeadUnsupported {
        /// The skipped URL.
        url: String,
        /// Domain key that rejects HEAD.
        domain: String,
    },

    /// Transport-level failure not attributed to the domain.
    #[error("protocol error for {url}: {message}")]
    Protocol {
        /// The URL that failed.
        url: String,
        /// Description of the underlying failure.
        message: String,
    },

    /// The target could not be parsed or has no host.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL string.
        url: String,
    },

    /// The declared body size is above the configured limit.
    #[error("{url} declares {bytes} bytes, above the size limit")]
    ContentTooLarge {
        /// The URL whose body is too large.
        url: String,
        /// Declared size in bytes.
        bytes: u64,
    },
}

impl ConnectionError {
    /// Creates a blocked error.
    pub fn blocked(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Blocked {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a HEAD-unsupported error.
    pub fn head_unsupported(url: impl Into<String>, domain: impl Into<String>) -> Self {
        Self::HeadUnsupported {
            url: url.into(),
            domain: domain.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns whether the failure happened below HTTP, so the URL was never
    /// actually reached.
    #[must_use]
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            Self::Blocked { .. } | Self::Timeout { .. } | Self::Protocol { .. }
        )
    }
}
