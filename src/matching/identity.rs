//! Pre-normalized comparison key for one work.

use crate::parser::{arxiv_id_from_doi, find_arxiv_id, normalize_arxiv_id};
use crate::record::RawCandidate;
use crate::text::{NameSignature, normalize_title};

/// Extras that may name an arXiv id in free text.
const ARXIV_TEXT_KEYS: [&str; 3] = ["journal", "howpublished", "url"];

/// Normalized title, author signatures and year of a work.
///
/// Computed once per record so repeated comparisons (deduplicating a listing,
/// validating fan-out results) do not re-normalize the same text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkIdentity {
    pub title: String,
    pub authors: Vec<NameSignature>,
    pub year: Option<i32>,
    /// arXiv id without version.
    pub eprint: Option<String>,
}

impl WorkIdentity {
    #[must_use]
    pub fn from_candidate(candidate: &RawCandidate) -> Self {
        let mut authors: Vec<NameSignature> = candidate
            .authors
            .iter()
            .filter_map(|name| NameSignature::parse(name))
            .collect();
        authors.dedup();
        Self {
            title: candidate
                .title
                .as_deref()
                .map(normalize_title)
                .unwrap_or_default(),
            authors,
            year: candidate.year,
            eprint: arxiv_eprint(candidate),
        }
    }

    /// Surnames only, sorted and deduplicated.
    #[must_use]
    pub fn surname_set(&self) -> Vec<&str> {
        let mut surnames: Vec<&str> = self
            .authors
            .iter()
            .map(|signature| signature.surname.as_str())
            .collect();
        surnames.sort_unstable();
        surnames.dedup();
        surnames
    }

    /// Fraction of authors with a compatible counterpart, relative to the
    /// shorter list. `None` when either side has no parsed authors.
    #[must_use]
    pub fn author_overlap(&self, other: &Self) -> Option<f64> {
        if self.authors.is_empty() || other.authors.is_empty() {
            return None;
        }
        let matched = matched_count(&self.authors, &other.authors)
            .max(matched_count(&other.authors, &self.authors));
        let shorter = self.authors.len().min(other.authors.len());
        #[allow(clippy::cast_precision_loss)]
        Some(matched as f64 / shorter as f64)
    }

    /// Whether both years are known and at most `window` apart.
    /// `None` when either year is missing.
    #[must_use]
    pub fn year_within(&self, other: &Self, window: u32) -> Option<bool> {
        match (self.year, other.year) {
            (Some(a), Some(b)) => Some(a.abs_diff(b) <= window),
            _ => None,
        }
    }
}

/// arXiv id carried by `candidate`: the `eprint` extra, an arXiv DOI, or an
/// `arXiv:` mention in the venue, journal, howpublished or url.
#[must_use]
pub fn arxiv_eprint(candidate: &RawCandidate) -> Option<String> {
    let archive = candidate
        .extras
        .get("archiveprefix")
        .or_else(|| candidate.extras.get("eprinttype"));
    if archive.is_none_or(|prefix| prefix.eq_ignore_ascii_case("arxiv"))
        && let Some(id) = candidate.extras.get("eprint").and_then(|v| normalize_arxiv_id(v))
    {
        return Some(id);
    }
    candidate
        .doi
        .as_deref()
        .and_then(arxiv_id_from_doi)
        .or_else(|| candidate.venue.as_deref().and_then(find_arxiv_id))
        .or_else(|| {
            ARXIV_TEXT_KEYS
                .iter()
                .filter_map(|key| candidate.extras.get(*key))
                .find_map(|text| find_arxiv_id(text))
        })
}

/// Greedy one-to-one matching of compatible signatures.
fn matched_count(left: &[NameSignature], right: &[NameSignature]) -> usize {
    let mut used = vec![false; right.len()];
    let mut count = 0;
    for signature in left {
        if let Some(index) = right
            .iter()
            .enumerate()
            .position(|(i, other)| !used[i] && signature.is_compatible(other))
        {
            used[index] = true;
            count += 1;
        }
    }
    count
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::Source;

    fn identity(title: &str, authors: &[&str], year: Option<i32>) -> WorkIdentity {
        let mut candidate = RawCandidate::new(Source::ScholarBaseline)
            .with_title(title)
            .with_authors(authors.iter().copied());
        candidate.year = year;
        WorkIdentity::from_candidate(&candidate)
    }

    #[test]
    fn test_identity_normalizes_title_and_authors() {
        let id = identity("Deep <b>Learning</b>!", &["Doe, Jane", "J. Smith"], Some(2020));
        assert_eq!(id.title, "deep learning");
        assert_eq!(id.surname_set(), vec!["doe", "smith"]);
    }

    #[test]
    fn test_arxiv_eprint_from_fields() {
        let eprint = RawCandidate::new(Source::Arxiv)
            .with_extra("eprint", "2101.00001v2")
            .with_extra("archiveprefix", "arXiv");
        assert_eq!(arxiv_eprint(&eprint).as_deref(), Some("2101.00001"));

        let doi = RawCandidate::new(Source::Datacite).with_doi("10.48550/arXiv.2101.00001");
        assert_eq!(arxiv_eprint(&doi).as_deref(), Some("2101.00001"));

        let venue = RawCandidate::new(Source::ScholarBaseline)
            .with_venue("arXiv preprint arXiv:1905.12345");
        assert_eq!(arxiv_eprint(&venue).as_deref(), Some("1905.12345"));

        let other_archive = RawCandidate::new(Source::Crossref)
            .with_extra("eprint", "2101.00001")
            .with_extra("archiveprefix", "SSRN");
        assert_eq!(arxiv_eprint(&other_archive), None);
    }

    #[test]
    fn test_author_overlap_uses_shorter_list() {
        let full = identity("T", &["Jane Doe", "John Smith", "Ann Roe"], None);
        let truncated = identity("T", &["J. Doe"], None);
        assert!((full.author_overlap(&truncated).unwrap() - 1.0).abs() < f64::EPSILON);

        let other = identity("T", &["Bob Stone", "John Smith"], None);
        assert!((full.author_overlap(&other).unwrap() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_author_overlap_absent_without_authors() {
        let a = identity("T", &[], None);
        let b = identity("T", &["Jane Doe"], None);
        assert_eq!(a.author_overlap(&b), None);
    }

    #[test]
    fn test_year_within_window() {
        let a = identity("T", &[], Some(2020));
        let b = identity("T", &[], Some(2021));
        let c = identity("T", &[], None);
        assert_eq!(a.year_within(&b, 1), Some(true));
        assert_eq!(a.year_within(&b, 0), Some(false));
        assert_eq!(a.year_within(&c, 1), None);
    }
}
