//! The URL rule table: exclusion patterns for page URLs and internal links,
//! document/dataset URL shapes, and URL canonicalization.
//!
//! Every string-shape decision in the crate goes through this module. Inputs
//! to the predicates are expected to be lower-cased already.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Version of the rule table. Bump when a pattern changes meaning.
pub const RULES_VERSION: u32 = 1;

/// Marker of a repository-platform session bootstrap inside a redirect target.
const SHARED_SITE_SESSION_MARKER: &str = "sharedsitesession";

/// HTML-escaped ampersand artefact found in some meta document links.
const ESCAPED_AMPERSAND_ARTEFACT: &str = "amp%3B";

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("URL rule regex is valid")
}

static URL_DIRECTORY: LazyLock<Regex> = LazyLock::new(|| {
    compile(concat!(
        r"^.*/(?:profile|login|auth\.|authentication\.|ac(?:c)?ess|join|subscr|register|submit|post/|send/|shop/|watch|import|bookmark|announcement|rss|feed|about|faq|wiki|news|events|cart|support|sitemap|htmlmap|license|disclaimer|polic(?:y|ies)|privacy|terms|help|law",
        r"|(?:my|your)?account|user|fund|aut(?:h)?or|editor|citation|review|external|statistics|application|permission|ethic|conta(?:c)?t|survey|wallet|contribute|deposit|donate|template|logo|image|photo|advertiser|people|(?:the)?press",
        r"|error|(?:mis|ab)use|gateway|sorryserver|cookieabsent|notfound|404\.(?:\w)?htm).*$",
    ))
});

static SPECIFIC_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    compile(concat!(
        r"^.+://.*(?:google|goo\.gl|gstatic|facebook|twitter|youtube|linkedin|wordpress|s\.w\.org|ebay|bing|amazon\.|wikipedia|myspace|yahoo|mail|pinterest|reddit|blog|tumblr",
        r"|evernote|skype|microsoft|adobe|buffer|digg|stumbleupon|addthis|delicious|dailymotion|gostats|blogger|copyright|friendfeed|newsvine|telegram|getpocket",
        r"|flipboard|instapaper|line\.me|vk\.com|ok\.ru|douban|baidu|qzone|xing|renren|weibo|doubleclick|github).*/.*$",
    ))
});

static PLAIN_DOMAIN: LazyLock<Regex> = LazyLock::new(|| compile(r"^.+://[\w.:\-]+/?$"));

static PAGE_FILE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^.+\.(?:ico|css|js|gif|jpg|jpeg|png|wav|mp3|mp4|webm|mkv|mov|pt|bib|nt|refer|enw|ris|mso|dtl|svg|asc|c|cc|cxx|cpp|java|py)(?:\?.+)?$")
});

static UNSUPPORTED_DOC_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^.+\.(?:doc|docx|ppt|pptx)(?:\?.+)?$"));

static INNER_LINK_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^.*(?:doi\.org|mailto:|\?lang=|isallowed=n).*$"));

static INNER_LINK_FILE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^.+\.(?:ico|css|js|gif|jpg|jpeg|png|wav|mp3|mp4|webm|mkv|mov|pt|xml|rdf|bib|nt|refer|enw|ris|n3|csv|tsv|mso|dtl|svg|do|asc|txt|c|cc|cxx|cpp|java|py)(?:\?.+)?$")
});

static PLAIN_PAGE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^.+\.(?:php|php2|php3|php4|php5|phtml|htm|html|shtml|xht|xhtm|xhtml|xml|rdf|bib|nt|refer|enw|ris|n3|csv|tsv|aspx|asp|jsp|do|asc)$")
});

static INNER_LINK_FILE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^.+format=(?:xml|htm|html|shtml|xht|xhtm|xhtml).*$"));

static DOCUMENT_URL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^.+(?:\.pdf|/pdf|download|fulltext|getfile|bitstream|viewcontent\.cgi|/file/|type=pdf).*$")
});

static DATASET_URL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^.+(?:/datasets?/.*|(?:\.|format=)(?:xls|xlsx|csv|tsv|tab|json|geojson|ods|rdf|zip|gz|tgz|rar|tar|7z|bz2|xz|sav|dta|por|sas7bdat|nc|h5|hdf5|sql|sqlite|mat|tif|tiff|shp|dat)(?:\?.*)?)$")
});

static JSESSIONID: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)^(.+://.+?);jsessionid=[^?]+(\?.+)?$"));

/// One named exclusion pattern.
#[derive(Debug)]
pub struct UrlRule {
    /// Short name reported when the rule rejects a URL.
    pub name: &'static str,
    pattern: &'static LazyLock<Regex>,
}

impl UrlRule {
    /// Returns whether the lower-cased URL matches this rule.
    #[must_use]
    pub fn matches(&self, lower_url: &str) -> bool {
        self.pattern.is_match(lower_url)
    }
}

/// Rules that reject a URL as a page-level redirect target.
pub static PAGE_URL_RULES: [UrlRule; 5] = [
    UrlRule {
        name: "plain-domain",
        pattern: &PLAIN_DOMAIN,
    },
    UrlRule {
        name: "specific-domain",
        pattern: &SPECIFIC_DOMAIN,
    },
    UrlRule {
        name: "directory",
        pattern: &URL_DIRECTORY,
    },
    UrlRule {
        name: "page-file-extension",
        pattern: &PAGE_FILE_EXTENSION,
    },
    UrlRule {
        name: "unsupported-doc-extension",
        pattern: &UNSUPPORTED_DOC_EXTENSION,
    },
];

/// Extra rules that reject a URL as an internal link.
pub static INTERNAL_LINK_RULES: [UrlRule; 4] = [
    UrlRule {
        name: "inner-link-keyword",
        pattern: &INNER_LINK_KEYWORDS,
    },
    UrlRule {
        name: "inner-link-file-extension",
        pattern: &INNER_LINK_FILE_EXTENSION,
    },
    UrlRule {
        name: "inner-link-format",
        pattern: &INNER_LINK_FILE_FORMAT,
    },
    UrlRule {
        name: "plain-page-extension",
        pattern: &PLAIN_PAGE_EXTENSION,
    },
];

/// Name of the first page rule rejecting `lower_url`, if any.
#[must_use]
pub fn page_url_rejection(lower_url: &str) -> Option<&'static str> {
    PAGE_URL_RULES
        .iter()
        .find(|rule| rule.matches(lower_url))
        .map(|rule| rule.name)
}

/// Name of the first internal-link rule rejecting `lower_url`, if any.
/// Internal links are also subject to every page rule.
#[must_use]
pub fn internal_link_rejection(lower_url: &str) -> Option<&'static str> {
    page_url_rejection(lower_url).or_else(|| {
        INTERNAL_LINK_RULES
            .iter()
            .find(|rule| rule.matches(lower_url))
            .map(|rule| rule.name)
    })
}

/// Returns whether the URL string looks like it points straight at a document.
#[must_use]
pub fn looks_like_document_url(lower_url: &str) -> bool {
    DOCUMENT_URL_SHAPE.is_match(lower_url)
}

/// Returns whether the string looks like a dataset location or file name.
#[must_use]
pub fn looks_like_dataset_url(lower_url: &str) -> bool {
    DATASET_URL_SHAPE.is_match(lower_url)
}

/// Returns whether a redirect target bootstraps a shared site session.
#[must_use]
pub fn is_shared_site_session(lower_url: &str) -> bool {
    lower_url.contains(SHARED_SITE_SESSION_MARKER)
}

/// Removes the escaped-ampersand artefact. `None` if there was none.
#[must_use]
pub fn repair_escaped_ampersand(url: &str) -> Option<String> {
    url.contains(ESCAPED_AMPERSAND_ARTEFACT)
        .then(|| url.replace(ESCAPED_AMPERSAND_ARTEFACT, ""))
}

/// Removes a `;jsessionid=...` path parameter, keeping any query.
#[must_use]
pub fn strip_jsessionid(url: &str) -> Option<String> {
    let caps = JSESSIONID.captures(url)?;
    let base = caps.get(1)?.as_str();
    let query = caps.get(2).map_or("", |m| m.as_str());
    Some(format!("{base}{query}"))
}

/// Canonical form used for deduplication and redirect targets: session id
/// removed, fragment dropped unless it is a client-side route (`#/...`).
#[must_use]
pub fn canonical_url(url: &Url) -> Url {
    let mut canonical = strip_jsessionid(url.as_str())
        .and_then(|s| Url::parse(&s).ok())
        .unwrap_or_else(|| url.clone());
    if canonical
        .fragment()
        .is_some_and(|fragment| !fragment.starts_with('/'))
    {
        canonical.set_fragment(None);
    }
    canonical
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Page Rule Tests ====================

    #[test]
    fn test_page_rules_reject_plain_domains() {
        assert_eq!(
            page_url_rejection("https://example.org/"),
            Some("plain-domain")
        );
        assert_eq!(
            page_url_rejection("http://127.0.0.1:8080"),
            Some("plain-domain")
        );
    }

    #[test]
    fn test_page_rules_reject_login_and_social() {
        assert_eq!(
            page_url_rejection("https://repo.org/login?next=/x"),
            Some("directory")
        );
        assert_eq!(
            page_url_rejection("https://www.facebook.com/sharer/share"),
            Some("specific-domain")
        );
        assert_eq!(
            page_url_rejection("https://repo.org/files/slides.pptx"),
            Some("unsupported-doc-extension")
        );
        assert_eq!(
            page_url_rejection("https://repo.org/static/site.css?v=2"),
            Some("page-file-extension")
        );
    }

    #[test]
    fn test_page_rules_accept_publication_urls() {
        assert_eq!(page_url_rejection("https://repo.org/record/123"), None);
        assert_eq!(page_url_rejection("https://repo.org/paper.pdf"), None);
        assert_eq!(page_url_rejection("https://repo.org/data/table.csv"), None);
    }

    // ==================== Internal Link Rule Tests ====================

    #[test]
    fn test_internal_link_rules() {
        assert_eq!(
            internal_link_rejection("https://doi.org/10.1000/182"),
            Some("inner-link-keyword")
        );
        assert_eq!(
            internal_link_rejection("https://repo.org/export.ris"),
            Some("page-file-extension")
        );
        assert_eq!(
            internal_link_rejection("https://repo.org/record/1/export.xml"),
            Some("inner-link-file-extension")
        );
        assert_eq!(
            internal_link_rejection("https://repo.org/view?format=html"),
            Some("inner-link-format")
        );
        assert_eq!(
            internal_link_rejection("https://repo.org/record/index.php"),
            Some("plain-page-extension")
        );
        assert_eq!(
            internal_link_rejection("https://repo.org/getfile.php?id=5337"),
            None
        );
    }

    // ==================== Shape Tests ====================

    #[test]
    fn test_document_url_shape() {
        assert!(looks_like_document_url("https://repo.org/paper.pdf"));
        assert!(looks_like_document_url("https://repo.org/bitstream/1/2/x"));
        assert!(looks_like_document_url(
            "https://repo.org/article/download/48805/26704"
        ));
        assert!(!looks_like_document_url("https://repo.org/record/12"));
    }

    #[test]
    fn test_dataset_url_shape() {
        assert!(looks_like_dataset_url("https://repo.org/files/table.csv"));
        assert!(looks_like_dataset_url("https://repo.org/get?format=xlsx"));
        assert!(looks_like_dataset_url("https://repo.org/dataset/abc"));
        assert!(looks_like_dataset_url("attachment; filename=results.zip"));
        assert!(!looks_like_dataset_url("https://repo.org/paper.pdf"));
    }

    #[test]
    fn test_shared_site_session() {
        assert!(is_shared_site_session(
            "https://idp.example.org/sharedsitesession?x=1"
        ));
        assert!(!is_shared_site_session("https://example.org/session"));
    }

    // ==================== Canonicalization Tests ====================

    #[test]
    fn test_strip_jsessionid_keeps_query() {
        assert_eq!(
            strip_jsessionid("https://repo.org/view;jsessionid=ABC123?id=7").as_deref(),
            Some("https://repo.org/view?id=7")
        );
        assert_eq!(
            strip_jsessionid("https://repo.org/view;JSESSIONID=ABC123").as_deref(),
            Some("https://repo.org/view")
        );
        assert_eq!(strip_jsessionid("https://repo.org/view?id=7"), None);
    }

    #[test]
    fn test_canonical_url_drops_anchor_but_keeps_routes() {
        let url = Url::parse("https://repo.org/paper.pdf#page=2").unwrap();
        assert_eq!(canonical_url(&url).as_str(), "https://repo.org/paper.pdf");

        let route = Url::parse("https://repo.org/app#/record/1").unwrap();
        assert_eq!(canonical_url(&route).as_str(), "https://repo.org/app#/record/1");
    }

    #[test]
    fn test_repair_escaped_ampersand() {
        assert_eq!(
            repair_escaped_ampersand("https://repo.org/get?a=1&amp%3Bb=2").as_deref(),
            Some("https://repo.org/get?a=1&b=2")
        );
        assert_eq!(repair_escaped_ampersand("https://repo.org/get?a=1"), None);
    }

    #[test]
    fn test_every_static_pattern_compiles() {
        for pattern in [
            &URL_DIRECTORY,
            &SPECIFIC_DOMAIN,
            &PLAIN_DOMAIN,
            &PAGE_FILE_EXTENSION,
            &UNSUPPORTED_DOC_EXTENSION,
            &INNER_LINK_KEYWORDS,
            &INNER_LINK_FILE_EXTENSION,
            &PLAIN_PAGE_EXTENSION,
            &INNER_LINK_FILE_FORMAT,
            &DOCUMENT_URL_SHAPE,
            &DATASET_URL_SHAPE,
            &JSESSIONID,
        ] {
            assert!(!LazyLock::force(pattern).as_str().is_empty());
        }
    }

    #[test]
    fn test_rules_version_is_set() {
        assert!(RULES_VERSION >= 1);
    }
}
