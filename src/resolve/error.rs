use thiserror::Error;

use crate::connection::ConnectionError;
use crate::storage::StoreError;

/// Why resolving one locator ended without a usable response.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The connection layer refused or failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The redirect chain was longer than the role allows.
    #[error("too many redirects for {url} (limit {limit})")]
    RedirectBudgetExceeded {
        /// URL whose redirect would have exceeded the budget.
        url: String,
        /// Budget for the role.
        limit: u8,
    },

    /// A redirect target matched an exclusion rule.
    #[error("redirect target {url} rejected by rule {rule}")]
    RejectedTarget {
        /// The rejected target.
        url: String,
        /// Name of the matching rule.
        rule: &'static str,
    },

    /// A redirect carried no usable target.
    #[error("HTTP {status} from {url} without a redirect target")]
    MissingLocation {
        /// URL that answered with the redirect.
        url: String,
        /// Redirect status.
        status: u16,
    },

    /// The chain ended on an error status.
    #[error("{message}")]
    ErrorStatus {
        /// URL that answered with the status.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Human-readable cause.
        message: String,
    },

    /// Writing a confirmed resource to storage failed.
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] StoreError),

    /// Content type could not be determined where it was required.
    #[error("could not determine the content type of {url}")]
    ClassificationUnknown {
        /// URL of the response.
        url: String,
    },
}

impl ResolveError {
    /// Returns whether the URL was never reached at the HTTP level.
    #[must_use]
    pub fn is_connection_level(&self) -> bool {
        match self {
            Self::Connection(error) => error.is_connection_level(),
            _ => false,
        }
    }

    /// Returns whether the failure came from a blocked domain or path.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Connection(ConnectionError::Blocked { .. }))
    }
}
