//! reqwest client construction.

use reqwest::{Client, redirect};

use crate::config::TimeoutSettings;

/// Builds the shared HTTP client.
///
/// Redirects are never followed by reqwest; the redirect resolver walks every
/// hop itself so each one goes through the health checks. The connect timeout
/// is the HEAD budget and the per-read timeout is the GET budget. HEAD
/// requests additionally carry a total timeout per request.
///
/// # Errors
///
/// Returns the reqwest builder error if the TLS backend cannot initialise.
pub fn build_client(timeouts: &TimeoutSettings, user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .redirect(redirect::Policy::none())
        .connect_timeout(timeouts.head)
        .read_timeout(timeouts.get)
        .gzip(true)
        .user_agent(user_agent)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_agent::BROWSER_USER_AGENT;

    #[test]
    fn test_build_client_with_defaults() {
        assert!(build_client(&TimeoutSettings::default(), BROWSER_USER_AGENT).is_ok());
    }
}
