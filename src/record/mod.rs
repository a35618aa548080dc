//! Record types shared by every stage: sources, candidates and merged records.

pub mod candidate;
pub mod canonical;
pub mod source;

pub use candidate::RawCandidate;
pub use canonical::{CanonicalRecord, EntryType, Field, FieldKind, Sourced};
pub use source::{Source, TrustOrder, TrustOrderError};
