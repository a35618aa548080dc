//! Filtering rules for the free-form extras carried into merged records.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Keys never carried into a merged record.
const DROPPED_KEYS: [&str; 3] = ["keywords", "keyword", "copyright"];

/// Keys owned by typed fields; a source's copy in extras is ignored.
const RESERVED_KEYS: [&str; 10] = [
    "title",
    "author",
    "authors",
    "year",
    "doi",
    "journal",
    "booktitle",
    "howpublished",
    "venue",
    "entry_type",
];

/// arXiv identifiers that stop making sense once a published DOI is known.
pub(crate) const ARXIV_KEYS: [&str; 4] = ["eprint", "eprinttype", "archiveprefix", "primaryclass"];

/// Hosts a `url` extra may point at.
const ALLOWED_URL_HOSTS: [&str; 3] = ["doi.org", "dx.doi.org", "arxiv.org"];

/// Prefix for bookkeeping keys that travel with a record but are never written out.
pub const INTERNAL_PREFIX: &str = "x_";

#[allow(clippy::expect_used)]
static PMID_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*pmid\s*:?\s*\d+\s*\.?\s*$").expect("pmid note regex is valid")
});

/// Cleans one extra value; `None` means this source's value is unusable and the
/// next source in trust order gets a chance to supply the key.
#[must_use]
pub fn accept_extra(key: &str, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || DROPPED_KEYS.contains(&key) || RESERVED_KEYS.contains(&key) {
        return None;
    }
    match key {
        "note" if PMID_ONLY.is_match(value) => None,
        "url" => allowed_url(value),
        _ => Some(value.to_string()),
    }
}

/// Keeps doi.org and arxiv.org links only, upgraded to https.
fn allowed_url(value: &str) -> Option<String> {
    let mut url = Url::parse(value).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let allowed = ALLOWED_URL_HOSTS
        .iter()
        .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")));
    if !allowed {
        return None;
    }
    if url.scheme() == "http" {
        url.set_scheme("https").ok()?;
    }
    Some(url.to_string())
}

#[must_use]
pub fn is_internal(key: &str) -> bool {
    key.starts_with(INTERNAL_PREFIX)
}
