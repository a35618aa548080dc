//! DOI and arXiv identifier detection, validation, and normalization.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

/// Regex pattern for bare DOIs: `10.XXXX/suffix`.
/// Handles nested registrants like `10.1000.10/example`.
#[allow(clippy::expect_used)]
static DOI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"10\.\d{4,9}(?:\.\d+)*/[^\s<>"'\]]+"#).expect("DOI regex is valid")
});

/// `<meta name="citation_doi" content="...">` and friends, name before content.
#[allow(clippy::expect_used)]
static META_NAME_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<meta\s[^>]*(?:name|property)\s*=\s*["'](?:citation_doi|dc\.identifier|og:doi|prism\.doi)["'][^>]*content\s*=\s*["']([^"']+)["']"#,
    )
    .expect("meta name-first regex is valid")
});

/// Same tags with the content attribute first.
#[allow(clippy::expect_used)]
static META_CONTENT_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<meta\s[^>]*content\s*=\s*["']([^"']+)["'][^>]*(?:name|property)\s*=\s*["'](?:citation_doi|dc\.identifier|og:doi|prism\.doi)["']"#,
    )
    .expect("meta content-first regex is valid")
});

/// arXiv identifiers in new-style form, only when introduced by an arXiv marker.
#[allow(clippy::expect_used)]
static ARXIV_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)arxiv(?:\.org/(?:abs|pdf)/|\s*:\s*|\.)(\d{4}\.\d{4,5})(?:v\d+)?")
        .expect("arXiv regex is valid")
});

/// A whole field holding one new-style arXiv id, optionally `arXiv:`-prefixed.
#[allow(clippy::expect_used)]
static BARE_ARXIV_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:arxiv\s*:\s*)?(\d{4}\.\d{4,5})(?:v\d+)?$")
        .expect("bare arXiv id regex is valid")
});

/// DOI prefix used by arXiv-minted DOIs.
pub const ARXIV_DOI_PREFIX: &str = "10.48550/arxiv.";

/// DOI prefixes registered by preprint servers (arXiv, bioRxiv/medRxiv,
/// Preprints.org, OSF, Research Square).
const PREPRINT_DOI_PREFIXES: [&str; 5] = [
    ARXIV_DOI_PREFIX,
    "10.1101/",
    "10.20944/",
    "10.31219/",
    "10.21203/",
];

/// Normalizes a DOI by stripping URL and `doi:` prefixes, URL-decoding,
/// trimming trailing punctuation and lowercasing.
///
/// Returns `None` when the result is not a valid DOI.
///
/// ```
/// use citeforge_core::parser::doi::normalize_doi;
///
/// assert_eq!(normalize_doi("https://doi.org/10.1000/ABC.").as_deref(), Some("10.1000/abc"));
/// assert_eq!(normalize_doi("doi: 10.1000/x"), Some("10.1000/x".to_string()));
/// assert_eq!(normalize_doi("11.1000/x"), None);
/// ```
#[must_use]
pub fn normalize_doi(input: &str) -> Option<String> {
    let mut doi = input.trim();

    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi.org/",
    ] {
        if starts_with_ignore_case(doi, prefix) {
            doi = &doi[prefix.len()..];
            break;
        }
    }

    if starts_with_ignore_case(doi, "doi:") {
        doi = doi[4..].trim_start();
    }

    let decoded = match urlencoding::decode(doi) {
        Ok(decoded) => decoded.trim().to_string(),
        Err(_) => doi.trim().to_string(),
    };
    let trimmed = decoded.trim_end_matches(['.', ',', ';', ':']);
    let cleaned = clean_unbalanced_trailing(trimmed, '(', ')');
    let cleaned = clean_unbalanced_trailing(&cleaned, '{', '}');

    is_valid_doi(&cleaned).then(|| cleaned.to_lowercase())
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Validation rules: starts with `10.`, registrant of 4+ digits, non-empty suffix.
fn is_valid_doi(doi: &str) -> bool {
    let Some(rest) = doi.strip_prefix("10.") else {
        return false;
    };
    let Some((registrant, suffix)) = rest.split_once('/') else {
        return false;
    };
    let first_segment = registrant.split('.').next().unwrap_or("");
    first_segment.len() >= 4
        && first_segment.chars().all(|c| c.is_ascii_digit())
        && !suffix.trim().is_empty()
        && !suffix.chars().any(char::is_whitespace)
}

/// Strips trailing `close` characters that have no matching `open` in the suffix.
///
/// DOIs may contain parentheses (`10.1002/(SICI)1097-4636`), but are often
/// wrapped in them in running text.
fn clean_unbalanced_trailing(doi: &str, open: char, close: char) -> String {
    let mut result = doi.to_string();
    if let Some(slash_pos) = result.find('/') {
        while result.ends_with(close) && {
            let suffix = &result[slash_pos + 1..];
            suffix.chars().filter(|&c| c == close).count()
                > suffix.chars().filter(|&c| c == open).count()
        } {
            result.pop();
        }
    }
    result
}

/// Every distinct valid DOI in the text, in order of appearance.
#[must_use]
pub fn extract_dois(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in DOI_PATTERN.find_iter(text) {
        // Reject IP-like or version-like matches such as `v10.1234/rc1`.
        if m.start() > 0 {
            let prev = text.as_bytes()[m.start() - 1];
            if prev.is_ascii_alphanumeric() || prev == b'.' {
                continue;
            }
        }
        if let Some(doi) = normalize_doi(m.as_str()) {
            trace!(doi = %doi, "found DOI in text");
            if !found.contains(&doi) {
                found.push(doi);
            }
        }
    }
    found
}

/// First valid DOI in free text.
#[must_use]
pub fn find_doi_in_text(text: &str) -> Option<String> {
    extract_dois(text).into_iter().next()
}

/// DOI from an HTML landing page: bibliographic meta tags first, then any DOI in the body.
#[must_use]
pub fn find_doi_in_html(html: &str) -> Option<String> {
    META_NAME_FIRST
        .captures_iter(html)
        .chain(META_CONTENT_FIRST.captures_iter(html))
        .find_map(|caps| normalize_doi(&caps[1]))
        .or_else(|| find_doi_in_text(html))
}

#[must_use]
pub fn is_arxiv_doi(doi: &str) -> bool {
    doi.to_ascii_lowercase().starts_with(ARXIV_DOI_PREFIX)
}

/// True when the DOI was minted by a preprint server.
#[must_use]
pub fn is_preprint_doi(doi: &str) -> bool {
    let lowered = doi.to_ascii_lowercase();
    PREPRINT_DOI_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

/// arXiv identifier (without version suffix) from text such as
/// `arXiv:2101.00001v2` or `https://arxiv.org/abs/2101.00001`.
#[must_use]
pub fn find_arxiv_id(text: &str) -> Option<String> {
    ARXIV_PATTERN
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// arXiv identifier from an `eprint` field value such as `2101.00001v2`.
#[must_use]
pub fn normalize_arxiv_id(value: &str) -> Option<String> {
    BARE_ARXIV_ID
        .captures(value.trim())
        .map(|caps| caps[1].to_string())
        .or_else(|| find_arxiv_id(value))
}

/// arXiv identifier embedded in an arXiv-minted DOI.
#[must_use]
pub fn arxiv_id_from_doi(doi: &str) -> Option<String> {
    let lowered = doi.to_ascii_lowercase();
    lowered
        .strip_prefix(ARXIV_DOI_PREFIX)
        .map(|id| id.split('v').next().unwrap_or(id).to_string())
}
