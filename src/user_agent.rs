//! User-Agent strings.
//!
//! Repository landing pages routinely serve stripped-down or blocked
//! responses to non-browser agents, so requests default to a desktop Firefox
//! string. `--identify` switches to the tool string instead.

/// Project URL for tool identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/docfinder";

/// Browser User-Agent sent by default.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:84.0) Gecko/20100101 Firefox/84.0";

/// `Accept-Language` value sent unless a domain rejects it.
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// User-Agent identifying the tool and its version.
#[must_use]
pub fn tool_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("docfinder/{version} (publication-crawler; +{PROJECT_UA_URL})")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_user_agent_carries_version_and_url() {
        let ua = tool_user_agent();
        assert!(ua.contains(PROJECT_UA_URL));
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("docfinder/")
                .and_then(|s| s.split(' ').next())
                .unwrap()
        );
    }

    #[test]
    fn test_browser_user_agent_is_firefox() {
        assert!(BROWSER_USER_AGENT.starts_with("Mozilla/5.0"));
        assert!(BROWSER_USER_AGENT.contains("Firefox/"));
    }
}
