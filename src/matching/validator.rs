//! Decides whether a fetched candidate describes the same work as a baseline.

use std::fmt;

use crate::record::RawCandidate;

use super::{SimilarityScorer, WorkIdentity};

/// Why a candidate was accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptReason {
    DoiMatch,
    EprintMatch,
    Similarity(f64),
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Candidate has neither title nor DOI.
    NoEvidence,
    /// Both sides carry DOIs and they differ.
    DoiConflict { baseline: String, candidate: String },
    /// Both sides carry arXiv ids and they differ.
    EprintConflict { baseline: String, candidate: String },
    LowScore { score: f64, threshold: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEvidence => f.write_str("candidate has neither title nor DOI"),
            Self::DoiConflict {
                baseline,
                candidate,
            } => write!(f, "DOI conflict: baseline {baseline} vs candidate {candidate}"),
            Self::EprintConflict {
                baseline,
                candidate,
            } => write!(f, "arXiv id conflict: baseline {baseline} vs candidate {candidate}"),
            Self::LowScore { score, threshold } => {
                write!(f, "similarity {score:.3} below threshold {threshold:.3}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(AcceptReason),
    Rejected(RejectReason),
}

impl Verdict {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Candidate validator: DOI short-circuit, arXiv id short-circuit, then
/// similarity against the threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateValidator {
    scorer: SimilarityScorer,
}

impl CandidateValidator {
    #[must_use]
    pub fn new(scorer: SimilarityScorer) -> Self {
        Self { scorer }
    }

    #[must_use]
    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Validates `candidate` against `baseline`.
    #[must_use]
    pub fn validate(&self, baseline: &RawCandidate, candidate: &RawCandidate) -> Verdict {
        self.validate_with_identity(baseline, &WorkIdentity::from_candidate(baseline), candidate)
    }

    /// Same as [`Self::validate`] with the baseline identity precomputed.
    #[must_use]
    pub fn validate_with_identity(
        &self,
        baseline: &RawCandidate,
        baseline_identity: &WorkIdentity,
        candidate: &RawCandidate,
    ) -> Verdict {
        if !candidate.has_evidence() {
            return Verdict::Rejected(RejectReason::NoEvidence);
        }

        if let (Some(left), Some(right)) = (&baseline.doi, &candidate.doi) {
            return if left.eq_ignore_ascii_case(right) {
                Verdict::Accepted(AcceptReason::DoiMatch)
            } else {
                Verdict::Rejected(RejectReason::DoiConflict {
                    baseline: left.clone(),
                    candidate: right.clone(),
                })
            };
        }

        let identity = WorkIdentity::from_candidate(candidate);
        if let (Some(left), Some(right)) = (&baseline_identity.eprint, &identity.eprint) {
            return if left == right {
                Verdict::Accepted(AcceptReason::EprintMatch)
            } else {
                Verdict::Rejected(RejectReason::EprintConflict {
                    baseline: left.clone(),
                    candidate: right.clone(),
                })
            };
        }

        let score = self.scorer.compare(baseline_identity, &identity).score;
        if score >= self.scorer.threshold() {
            Verdict::Accepted(AcceptReason::Similarity(score))
        } else {
            Verdict::Rejected(RejectReason::LowScore {
                score,
                threshold: self.scorer.threshold(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;

    fn baseline() -> RawCandidate {
        RawCandidate::new(Source::ScholarBaseline).with_title("Deep Learning for X")
    }

    #[test]
    fn test_equal_dois_accept_despite_different_titles() {
        let validator = CandidateValidator::default();
        let base = baseline().with_doi("10.1000/abc");
        let candidate = RawCandidate::new(Source::Crossref)
            .with_title("Completely unrelated")
            .with_doi("https://doi.org/10.1000/ABC");
        assert_eq!(
            validator.validate(&base, &candidate),
            Verdict::Accepted(AcceptReason::DoiMatch)
        );
    }

    #[test]
    fn test_different_dois_reject_despite_same_title() {
        let validator = CandidateValidator::default();
        let base = baseline().with_doi("10.1000/abc");
        let candidate = RawCandidate::new(Source::Crossref)
            .with_title("Deep Learning for X")
            .with_doi("10.1000/xyz");
        assert!(matches!(
            validator.validate(&base, &candidate),
            Verdict::Rejected(RejectReason::DoiConflict { .. })
        ));
    }

    #[test]
    fn test_equal_arxiv_ids_accept_despite_different_titles() {
        let validator = CandidateValidator::default();
        let base = baseline().with_venue("arXiv preprint arXiv:2101.00001");
        let candidate = RawCandidate::new(Source::Arxiv)
            .with_title("A renamed preprint")
            .with_extra("eprint", "2101.00001v3")
            .with_extra("archiveprefix", "arXiv");
        assert_eq!(
            validator.validate(&base, &candidate),
            Verdict::Accepted(AcceptReason::EprintMatch)
        );
    }

    #[test]
    fn test_different_arxiv_ids_reject_despite_same_title() {
        let validator = CandidateValidator::default();
        let base = baseline().with_extra("eprint", "2101.00001");
        let candidate = RawCandidate::new(Source::Arxiv)
            .with_title("Deep Learning for X")
            .with_extra("eprint", "2101.99999");
        assert!(matches!(
            validator.validate(&base, &candidate),
            Verdict::Rejected(RejectReason::EprintConflict { .. })
        ));
    }

    #[test]
    fn test_published_doi_outranks_arxiv_id() {
        let validator = CandidateValidator::default();
        let base = baseline()
            .with_doi("10.1000/abc")
            .with_extra("eprint", "2101.00001");
        let candidate = RawCandidate::new(Source::Crossref)
            .with_title("Deep Learning for X")
            .with_doi("10.1000/abc")
            .with_extra("eprint", "2101.99999");
        assert_eq!(
            validator.validate(&base, &candidate),
            Verdict::Accepted(AcceptReason::DoiMatch)
        );
    }

    #[test]
    fn test_candidate_without_title_or_doi_rejected() {
        let validator = CandidateValidator::default();
        let candidate = RawCandidate::new(Source::Crossref)
            .with_authors(["Jane Doe"])
            .with_year(2020);
        assert_eq!(
            validator.validate(&baseline(), &candidate),
            Verdict::Rejected(RejectReason::NoEvidence)
        );
    }

    #[test]
    fn test_title_only_baseline_accepts_matching_title() {
        let validator = CandidateValidator::default();
        let candidate = RawCandidate::new(Source::Crossref)
            .with_title("Deep Learning for X")
            .with_doi("10.1000/abc")
            .with_year(2023);
        assert!(validator.validate(&baseline(), &candidate).is_accepted());
    }

    #[test]
    fn test_low_score_reports_threshold() {
        let validator = CandidateValidator::default();
        let candidate = RawCandidate::new(Source::Crossref).with_title("Something else entirely");
        let verdict = validator.validate(&baseline(), &candidate);
        let Verdict::Rejected(reason) = verdict else {
            panic!("expected rejection");
        };
        assert!(reason.to_string().contains("below threshold 0.900"));
    }
}
