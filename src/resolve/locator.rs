//! Units of crawl work and the per-role policy table.

use std::fmt;

use crate::config::RedirectLimits;

/// What a target URL is being connected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The top-level input URL.
    PageRequest,
    /// A link found inside a page, checked for being a resource.
    InternalLink,
    /// A URL whose shape suggests it already is the document or dataset.
    CandidateResource,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PageRequest => "page",
            Self::InternalLink => "internal-link",
            Self::CandidateResource => "candidate",
        })
    }
}

/// How a role is treated by the connection and redirect layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePolicy {
    /// Use the page redirect budget rather than the internal one.
    pub page_budget: bool,
    /// Always GET, because the body is needed.
    pub always_get: bool,
    /// GET when retrieval is enabled.
    pub get_when_downloading: bool,
    /// Retry with GET when HEAD is rejected.
    pub get_fallback: bool,
    /// An undecidable type counts against the domain.
    pub must_classify: bool,
}

const PAGE_POLICY: RolePolicy = RolePolicy {
    page_budget: true,
    always_get: true,
    get_when_downloading: true,
    get_fallback: true,
    must_classify: true,
};

const INTERNAL_LINK_POLICY: RolePolicy = RolePolicy {
    page_budget: false,
    always_get: false,
    get_when_downloading: false,
    get_fallback: false,
    must_classify: false,
};

const CANDIDATE_POLICY: RolePolicy = RolePolicy {
    page_budget: false,
    always_get: false,
    get_when_downloading: true,
    get_fallback: true,
    must_classify: true,
};

impl Role {
    /// Policy row for this role.
    #[must_use]
    pub fn policy(self) -> &'static RolePolicy {
        match self {
            Self::PageRequest => &PAGE_POLICY,
            Self::InternalLink => &INTERNAL_LINK_POLICY,
            Self::CandidateResource => &CANDIDATE_POLICY,
        }
    }

    /// Redirect hops allowed for this role.
    #[must_use]
    pub fn redirect_budget(self, limits: &RedirectLimits) -> u8 {
        if self.policy().page_budget {
            limits.page
        } else {
            limits.internal
        }
    }

    /// Returns whether the first request must be a GET.
    #[must_use]
    pub fn starts_with_get(self, downloading: bool) -> bool {
        let policy = self.policy();
        policy.always_get || (downloading && policy.get_when_downloading)
    }
}

/// One unit of work: a target URL plus its lineage and role.
///
/// Immutable once dispatched; derived locators are built with
/// [`Locator::derive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// External identifier from the input record.
    pub id: Option<String>,
    /// URL as given in the input.
    pub source_url: String,
    /// Page URL, possibly after redirects.
    pub page_url: String,
    /// URL connected to.
    pub target_url: String,
    /// Why the target is being connected to.
    pub role: Role,
}

impl Locator {
    /// Top-level locator for an input URL.
    #[must_use]
    pub fn page(id: Option<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id,
            source_url: url.clone(),
            page_url: url.clone(),
            target_url: url,
            role: Role::PageRequest,
        }
    }

    /// Locator for a link found on this locator's page.
    #[must_use]
    pub fn derive(&self, page_url: &str, target_url: impl Into<String>, role: Role) -> Self {
        Self {
            id: self.id.clone(),
            source_url: self.source_url.clone(),
            page_url: page_url.to_string(),
            target_url: target_url.into(),
            role,
        }
    }

    /// Identifier for logs and duplicate comments.
    #[must_use]
    pub fn id_or_empty(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }
}
