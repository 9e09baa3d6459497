use std::collections::HashSet;

use super::types::{CommitDecision, DeduplicationCheckResult};

/// Decides which candidates get written. Pure; keeps the caller's order.
///
/// Candidates the check result does not mention count as non-duplicates.
pub fn resolve(
    decision: CommitDecision,
    result: &DeduplicationCheckResult,
    candidates: &[String],
) -> Vec<String> {
    match decision {
        CommitDecision::Abort => Vec::new(),
        CommitDecision::CommitAll => candidates.to_vec(),
        CommitDecision::CommitNonDuplicatesOnly => {
            let flagged: HashSet<&str> = result.flagged().map(|c| c.candidate.as_str()).collect();
            candidates
                .iter()
                .filter(|c| !flagged.contains(c.as_str()))
                .cloned()
                .collect()
        }
    }
}
