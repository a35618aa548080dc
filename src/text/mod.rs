//! Text normalization shared by scoring, merging and citation keys.

pub mod names;

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

pub use names::NameSignature;

#[allow(clippy::expect_used)]
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("html tag regex is valid"));
#[allow(clippy::expect_used)]
static LATEX_ACCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\\[`'^"~=.]\s*\{?([A-Za-z])\}?"#).expect("latex accent regex is valid")
});
#[allow(clippy::expect_used)]
static LATEX_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([^$]*)\$").expect("latex math regex is valid"));
#[allow(clippy::expect_used)]
static LATEX_COMMAND_WITH_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\[A-Za-z]+\s*\{([^{}]*)\}").expect("latex command regex is valid")
});
#[allow(clippy::expect_used)]
static LATEX_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[A-Za-z]+").expect("latex bare command regex is valid"));

/// Truncation markers that make a value unusable wherever they appear.
const TRUNCATION_MARKERS: [&str; 3] = ["...", "\u{2026}", "et al"];

/// Whole values that stand in for missing data.
const PLACEHOLDER_VALUES: [&str; 5] = ["n/a", "na", "tbd", "unknown", "placeholder"];

/// Joins runs of whitespace into single spaces and trims the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes HTML tags and LaTeX markup, keeping the visible text.
#[must_use]
pub fn strip_markup(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, " ");
    let text = LATEX_ACCENT.replace_all(&text, "$1");
    let text = LATEX_MATH.replace_all(&text, "$1");

    // Nested commands like \textbf{\emph{x}} unwrap one level per pass.
    let mut text = text.into_owned();
    for _ in 0..4 {
        let next = LATEX_COMMAND_WITH_ARG.replace_all(&text, "$1").into_owned();
        if next == text {
            break;
        }
        text = next;
    }
    let text = LATEX_COMMAND.replace_all(&text, "");
    collapse_whitespace(&text.replace(['{', '}'], ""))
}

/// Folds accented characters to their base form (NFKD without combining marks).
#[must_use]
pub fn fold_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Comparison form of a title: markup stripped, folded, lowercased,
/// punctuation replaced by spaces.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let folded = fold_diacritics(&strip_markup(title)).to_lowercase();
    let spaced: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&spaced)
}

/// Similarity of two titles in `[0, 1]`; 0 when either title is empty.
#[must_use]
pub fn title_similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize_title(a), &normalize_title(b))
}

/// [`title_similarity`] for titles already passed through [`normalize_title`].
#[must_use]
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// True when the value looks truncated or like a stand-in rather than real data.
#[must_use]
pub fn is_placeholder(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    TRUNCATION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        || PLACEHOLDER_VALUES.contains(&lowered.trim_end_matches('.'))
}

/// Strips one or two trailing periods from a title; ellipses are kept.
#[must_use]
pub fn trim_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.ends_with("...") || trimmed.ends_with('\u{2026}') {
        return trimmed.to_string();
    }
    let mut result = trimmed;
    for _ in 0..2 {
        match result.strip_suffix('.') {
            Some(rest) => result = rest.trim_end(),
            None => break,
        }
    }
    result.to_string()
}

/// Cleans a title as received from a source: tags removed, whitespace collapsed,
/// trailing periods trimmed. LaTeX is preserved for the serializer.
#[must_use]
pub fn clean_title(raw: &str) -> String {
    trim_title(&collapse_whitespace(&HTML_TAG.replace_all(raw, " ")))
}
