//! Terminal results of resolving a locator and their output record form.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::ResolveError;
use super::locator::Locator;
use crate::classify::ContentKind;

/// Status written in place of a final URL when nothing was found.
pub const UNREACHABLE_STATUS: &str = "unreachable";

/// Terminal state of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// A document was confirmed.
    Document,
    /// A dataset was confirmed.
    Dataset,
    /// A crawlable page; the frontier takes over.
    Page,
    /// Nothing usable.
    Unreachable,
    /// The resource was already found by another locator.
    Duplicate,
}

impl OutcomeKind {
    /// Returns whether a resource was identified (new or duplicate).
    #[must_use]
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Document | Self::Dataset | Self::Duplicate)
    }
}

impl From<ContentKind> for OutcomeKind {
    fn from(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Document => Self::Document,
            ContentKind::Dataset => Self::Dataset,
            ContentKind::Page => Self::Page,
            ContentKind::Unknown => Self::Unreachable,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Document => "document",
            Self::Dataset => "dataset",
            Self::Page => "page",
            Self::Unreachable => "unreachable",
            Self::Duplicate => "duplicate",
        })
    }
}

/// Result of resolving one [`Locator`].
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    /// The resolved locator.
    pub locator: Locator,
    /// Page URL after redirects, for page requests; the locator's page otherwise.
    pub page_url: String,
    /// URL the chain ended on, when it ended on a response.
    pub final_url: Option<String>,
    /// Terminal state.
    pub kind: OutcomeKind,
    /// `HEAD` or `GET`, when a request was made.
    pub method: Option<String>,
    /// Human-readable cause or note.
    pub comment: String,
    /// No redirect or transformation was needed to reach the resource.
    pub was_direct_link: bool,
    /// The URL answered at the HTTP level.
    pub was_accessible: bool,
    /// Where the resource was stored, if retrieval ran.
    pub stored_path: Option<PathBuf>,
    /// Page body, for `Page` outcomes of page requests.
    pub page_html: Option<String>,
}

impl ResolutionOutcome {
    /// Bare outcome with the locator's own page URL.
    #[must_use]
    pub fn new(locator: &Locator, kind: OutcomeKind) -> Self {
        Self {
            locator: locator.clone(),
            page_url: locator.page_url.clone(),
            final_url: None,
            kind,
            method: None,
            comment: String::new(),
            was_direct_link: false,
            was_accessible: true,
            stored_path: None,
            page_html: None,
        }
    }

    /// Duplicate of a resource first found by `original_id`.
    #[must_use]
    pub fn duplicate(locator: &Locator, final_url: &str, original_id: &str) -> Self {
        Self {
            final_url: Some(final_url.to_string()),
            comment: format!("This file is probably already downloaded from ID={original_id}"),
            ..Self::new(locator, OutcomeKind::Duplicate)
        }
    }

    /// Unreachable outcome with a cause.
    #[must_use]
    pub fn unreachable(locator: &Locator, comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            ..Self::new(locator, OutcomeKind::Unreachable)
        }
    }

    /// Unreachable outcome from an error.
    #[must_use]
    pub fn from_error(locator: &Locator, error: &ResolveError) -> Self {
        Self {
            was_accessible: !error.is_connection_level(),
            ..Self::unreachable(locator, error.to_string())
        }
    }

    /// Output record for this outcome.
    #[must_use]
    pub fn to_record(&self) -> OutcomeRecord {
        let final_url_or_status = match (self.kind.is_valid(), &self.final_url) {
            (true, Some(url)) => url.clone(),
            _ => UNREACHABLE_STATUS.to_string(),
        };
        OutcomeRecord {
            id: self.locator.id.clone(),
            source_url: self.locator.source_url.clone(),
            page_url: self.page_url.clone(),
            final_url_or_status,
            comment: self.comment.clone(),
            was_checked: true,
            was_valid: self.kind.is_valid(),
            was_accessible: self.was_accessible,
            was_direct_link: self.was_direct_link,
        }
    }
}

/// One line of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    /// External identifier from the input.
    pub id: Option<String>,
    /// URL as given in the input.
    pub source_url: String,
    /// Page URL after redirects.
    pub page_url: String,
    /// Final resource URL, or `unreachable`.
    pub final_url_or_status: String,
    /// Human-readable cause or note.
    pub comment: String,
    /// The locator was processed.
    pub was_checked: bool,
    /// A document or dataset was identified.
    pub was_valid: bool,
    /// The URL answered at the HTTP level.
    pub was_accessible: bool,
    /// No redirect or transformation was needed.
    pub was_direct_link: bool,
}
