//! Short titles for citation keys and file names.

use std::collections::HashSet;

use stop_words::{LANGUAGE, get};

use crate::text::{fold_diacritics, strip_markup};

/// Words that carry no meaning in a key even when the stop-word list keeps them.
const EXTRA_STOP_WORDS: [&str; 5] = ["using", "via", "through", "towards", "toward"];

/// Produces a short, key-safe rendering of a title.
///
/// Implementations may call out to an external service; returning `None`
/// makes the caller fall back to [`SignificantWords`].
pub trait TitleShortener: Send + Sync {
    fn shorten(&self, title: &str, max_words: usize) -> Option<String>;
}

/// First `max_words` non-stop-words of the title, each capitalized and joined.
#[derive(Debug, Clone)]
pub struct SignificantWords {
    stop: HashSet<String>,
}

impl Default for SignificantWords {
    fn default() -> Self {
        Self::new()
    }
}

impl SignificantWords {
    #[must_use]
    pub fn new() -> Self {
        let mut stop: HashSet<String> = get(LANGUAGE::English)
            .into_iter()
            .map(|word| word.to_lowercase())
            .collect();
        stop.extend(EXTRA_STOP_WORDS.iter().map(|word| (*word).to_string()));
        Self { stop }
    }
}

impl TitleShortener for SignificantWords {
    fn shorten(&self, title: &str, max_words: usize) -> Option<String> {
        let folded = fold_diacritics(&strip_markup(title));
        let words: Vec<&str> = folded
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();
        let max_words = max_words.max(1);
        let mut picks: Vec<&str> = words
            .iter()
            .copied()
            .filter(|word| !self.stop.contains(&word.to_lowercase()))
            .take(max_words)
            .collect();
        if picks.is_empty() {
            picks = words.into_iter().take(max_words).collect();
        }
        let short: String = picks.into_iter().map(capitalize).collect();
        (!short.is_empty()).then_some(short)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_stop_words() {
        let shortener = SignificantWords::new();
        assert_eq!(
            shortener.shorten("A Survey of Graph Neural Networks", 2).as_deref(),
            Some("SurveyGraph")
        );
        assert_eq!(
            shortener.shorten("Convolutional networks via segmentation", 4).as_deref(),
            Some("ConvolutionalNetworksSegmentation")
        );
    }

    #[test]
    fn test_falls_back_to_leading_words() {
        let shortener = SignificantWords::new();
        assert_eq!(shortener.shorten("The and of", 2).as_deref(), Some("TheAnd"));
        assert_eq!(shortener.shorten("  ", 2), None);
    }

    #[test]
    fn test_folds_diacritics() {
        let shortener = SignificantWords::new();
        assert_eq!(shortener.shorten("Étude numérique", 2).as_deref(), Some("EtudeNumerique"));
    }
}
