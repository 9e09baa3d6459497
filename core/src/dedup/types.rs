use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    pub existing: String,
    /// In `[0, 1]`.
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateCheck {
    pub candidate: String,
    pub has_similar: bool,
    #[serde(default)]
    pub similar: Vec<SimilarMatch>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeduplicationCheckResult {
    pub has_any_similar: bool,
    #[serde(default)]
    pub results: Vec<CandidateCheck>,
}

impl DeduplicationCheckResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Clamps similarities into `[0, 1]` and recomputes `has_any_similar` so that
    /// the summary flag never disagrees with the per-candidate flags.
    pub fn normalized(mut self) -> Self {
        for check in &mut self.results {
            for m in &mut check.similar {
                m.similarity = if m.similarity.is_nan() {
                    0.0
                } else {
                    m.similarity.clamp(0.0, 1.0)
                };
            }
        }
        self.has_any_similar = self.has_any_similar || self.results.iter().any(|c| c.has_similar);
        self
    }

    pub fn flagged(&self) -> impl Iterator<Item = &CandidateCheck> {
        self.results.iter().filter(|c| c.has_similar)
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged().count()
    }
}

/// The three choices offered before a batch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitDecision {
    CommitAll,
    CommitNonDuplicatesOnly,
    Abort,
}

impl CommitDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommitAll => "commit_all",
            Self::CommitNonDuplicatesOnly => "commit_non_duplicates_only",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for CommitDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commit_all" | "all" => Ok(Self::CommitAll),
            "commit_non_duplicates_only" | "new" | "new_only" => {
                Ok(Self::CommitNonDuplicatesOnly)
            }
            "abort" | "cancel" => Ok(Self::Abort),
            other => Err(format!("unknown commit decision: {other}")),
        }
    }
}

/// Result of running the full gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    /// `None` when nothing was similar and no decision was needed.
    pub decision: Option<CommitDecision>,
    pub to_commit: Vec<String>,
    pub check: DeduplicationCheckResult,
}

impl GateOutcome {
    pub fn is_aborted(&self) -> bool {
        self.decision == Some(CommitDecision::Abort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalized_clamps_and_recomputes_flag() {
        let r: DeduplicationCheckResult = serde_json::from_value(json!({
            "has_any_similar": false,
            "results": [
                {"candidate": "a", "has_similar": true,
                 "similar": [{"existing": "A", "similarity": 1.3}]},
                {"candidate": "b", "has_similar": false}
            ]
        }))
        .unwrap();
        let r = r.normalized();
        assert!(r.has_any_similar);
        assert_eq!(r.results[0].similar[0].similarity, 1.0);
        assert!(r.results[1].similar.is_empty());
        assert_eq!(r.flagged_count(), 1);
    }

    #[test]
    fn decision_parses_short_names() {
        assert_eq!("all".parse::<CommitDecision>().unwrap(), CommitDecision::CommitAll);
        assert_eq!(
            "new".parse::<CommitDecision>().unwrap(),
            CommitDecision::CommitNonDuplicatesOnly
        );
        assert_eq!("cancel".parse::<CommitDecision>().unwrap(), CommitDecision::Abort);
        assert!("maybe".parse::<CommitDecision>().is_err());
    }
}
