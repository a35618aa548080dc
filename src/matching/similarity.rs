//! Weighted title/author/year similarity between two records.

use crate::config::SimilarityConfig;
use crate::record::RawCandidate;
use crate::text::normalized_similarity;

use super::WorkIdentity;

/// Components of one comparison, kept for logging rejected candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub title: f64,
    /// `None` when either side lacks parsed authors.
    pub author_overlap: Option<f64>,
    /// `None` when either side lacks a year.
    pub year_match: Option<bool>,
    pub score: f64,
}

/// Pure, symmetric similarity scorer.
///
/// The title term always carries `title_weight`. The author and year terms add
/// their weight only when both records carry that evidence, and the sum is
/// divided by the weight actually in play. Missing evidence therefore forfeits
/// its bonus without dragging the score down, and identical titled records
/// score exactly 1.0. A title similarity under `title_min` scores 0 outright.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScorer {
    config: SimilarityConfig,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(SimilarityConfig::default())
    }
}

impl SimilarityScorer {
    #[must_use]
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Score in `[0, 1]` for two candidates.
    #[must_use]
    pub fn score(&self, a: &RawCandidate, b: &RawCandidate) -> f64 {
        self.compare(&WorkIdentity::from_candidate(a), &WorkIdentity::from_candidate(b))
            .score
    }

    /// Full comparison of two precomputed identities.
    #[must_use]
    pub fn compare(&self, a: &WorkIdentity, b: &WorkIdentity) -> ScoreBreakdown {
        let title = normalized_similarity(&a.title, &b.title);
        let author_overlap = a.author_overlap(b);
        let year_match = a.year_within(b, self.config.year_window);

        if title < self.config.title_min || title <= 0.0 {
            return ScoreBreakdown {
                title,
                author_overlap,
                year_match,
                score: 0.0,
            };
        }

        let mut weight = self.config.title_weight;
        let mut total = self.config.title_weight * title;
        if let Some(overlap) = author_overlap {
            weight += self.config.author_bonus;
            total += self.config.author_bonus * overlap;
        }
        if let Some(within) = year_match {
            weight += self.config.year_bonus;
            if within {
                total += self.config.year_bonus;
            }
        }

        let score = if weight > 0.0 {
            (total / weight).clamp(0.0, 1.0)
        } else {
            0.0
        };
        ScoreBreakdown {
            title,
            author_overlap,
            year_match,
            score,
        }
    }

    /// Whether two identities describe the same work.
    #[must_use]
    pub fn is_duplicate(&self, a: &WorkIdentity, b: &WorkIdentity) -> bool {
        self.compare(a, b).score >= self.config.duplicate_threshold
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.config.duplicate_threshold
    }
}
