//! Pre-commit deduplication gate.

pub mod gate;
pub mod resolve;
pub mod types;

pub use gate::{DedupGate, DEFAULT_THRESHOLD};
pub use resolve::resolve;
pub use types::{
    CandidateCheck, CommitDecision, DeduplicationCheckResult, GateOutcome, SimilarMatch,
};
