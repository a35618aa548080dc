//! Duplicate detection: similarity scoring and candidate validation.

pub mod identity;
pub mod similarity;
pub mod validator;

pub use identity::WorkIdentity;
pub use similarity::{ScoreBreakdown, SimilarityScorer};
pub use validator::{AcceptReason, CandidateValidator, RejectReason, Verdict};
