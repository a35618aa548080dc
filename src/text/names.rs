//! Person-name handling: surname signatures for matching and display surnames.

use std::sync::LazyLock;

use regex::Regex;

use super::{collapse_whitespace, fold_diacritics, strip_markup};

#[allow(clippy::expect_used)]
static AUTHOR_AND_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+and\s+").expect("author split regex is valid"));

/// Surname plus given-name initials, both lowercase ASCII-folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameSignature {
    pub surname: String,
    pub initials: String,
}

impl NameSignature {
    /// Parses `"Last, First"` or `"First Middle Last"`.
    ///
    /// Returns `None` for empty names and "et al." markers.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let cleaned = collapse_whitespace(&fold_diacritics(&strip_markup(name)));
        if cleaned.is_empty() || is_et_al(&cleaned) {
            return None;
        }

        let (surname_part, given_part) = match cleaned.split_once(',') {
            Some((last, first)) => (last.trim().to_string(), first.trim().to_string()),
            None => {
                let tokens: Vec<&str> = cleaned.split_whitespace().collect();
                let (last, given) = tokens.split_last()?;
                ((*last).to_string(), given.join(" "))
            }
        };

        let surname: String = surname_part
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        if surname.is_empty() {
            return None;
        }

        let initials: String = given_part
            .split(|c: char| c.is_whitespace() || c == '.' || c == '-')
            .filter_map(|token| token.chars().find(|c| c.is_alphabetic()))
            .flat_map(char::to_lowercase)
            .collect();

        Some(Self { surname, initials })
    }

    /// Same surname and initials that do not contradict each other.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        if self.surname != other.surname {
            return false;
        }
        self.initials.is_empty()
            || other.initials.is_empty()
            || self.initials.starts_with(&other.initials)
            || other.initials.starts_with(&self.initials)
    }
}

/// `et al.`, `others` and similar truncation markers.
#[must_use]
pub fn is_et_al(name: &str) -> bool {
    let lowered = name.trim().trim_end_matches('.').to_lowercase();
    matches!(lowered.as_str(), "et al" | "others" | "and others" | "al")
}

/// Display surname for citation keys and directory names, e.g. `Smith`.
#[must_use]
pub fn surname(name: &str) -> Option<String> {
    let cleaned = collapse_whitespace(&strip_markup(name));
    if cleaned.is_empty() || is_et_al(&cleaned) {
        return None;
    }
    let raw = match cleaned.split_once(',') {
        Some((last, _)) => last.trim().to_string(),
        None => cleaned.split_whitespace().last()?.to_string(),
    };
    let letters: String = fold_diacritics(&raw)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let mut chars = letters.chars();
    let first = chars.next()?;
    Some(first.to_ascii_uppercase().to_string() + chars.as_str())
}

/// True when some given name is spelled out rather than reduced to an initial.
#[must_use]
pub fn has_full_given_name(name: &str) -> bool {
    let cleaned = collapse_whitespace(&strip_markup(name));
    let given = match cleaned.split_once(',') {
        Some((_, first)) => first.to_string(),
        None => {
            let tokens: Vec<&str> = cleaned.split_whitespace().collect();
            match tokens.split_last() {
                Some((_, given)) => given.join(" "),
                None => String::new(),
            }
        }
    };
    given
        .split(|c: char| c.is_whitespace() || c == '-')
        .any(|token| token.trim_end_matches('.').chars().count() > 1 && !token.ends_with('.'))
}

/// Splits a BibTeX-style `A and B and C` author field.
#[must_use]
pub fn split_bibtex_authors(value: &str) -> Vec<String> {
    AUTHOR_AND_SPLIT
        .split(value)
        .map(collapse_whitespace)
        .filter(|name| !name.is_empty())
        .collect()
}
