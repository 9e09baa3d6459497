//! Task data model as mirrored by the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Which orchestration flavor owns a task. Kinds are not interchangeable:
/// a task id submitted under one kind is never watched under another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    DiscoveryAgent,
    SuggestionRunner,
    #[serde(alias = "sync")]
    SyncJob,
    #[serde(alias = "cleanup")]
    CleanupJob,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::DiscoveryAgent,
        TaskKind::SuggestionRunner,
        TaskKind::SyncJob,
        TaskKind::CleanupJob,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DiscoveryAgent => "discovery-agent",
            Self::SuggestionRunner => "suggestion-runner",
            Self::SyncJob => "sync-job",
            Self::CleanupJob => "cleanup-job",
        }
    }

    /// Only kinds whose backend writes checkpoints can be resumed.
    pub fn is_resumable(self) -> bool {
        matches!(self, Self::DiscoveryAgent)
    }

    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            Self::DiscoveryAgent => &["concepts"],
            Self::SuggestionRunner => &["seed_text"],
            Self::SyncJob | Self::CleanupJob => &["project"],
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discovery-agent" | "discovery" => Ok(Self::DiscoveryAgent),
            "suggestion-runner" | "suggestion" => Ok(Self::SuggestionRunner),
            "sync-job" | "sync" => Ok(Self::SyncJob),
            "cleanup-job" | "cleanup" => Ok(Self::CleanupJob),
            other => Err(format!("unknown task kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One server-side unit of long-running work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_ref: Option<String>,
    /// Set when this task was started by resuming an earlier one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<String>,
}

/// Consumer-visible view of the latest poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress: Value,
    pub message: Option<String>,
    pub errors: Vec<String>,
    pub observed_at: DateTime<Utc>,
    /// Number of successful polls in the owning session, starting at 1.
    pub sequence: u64,
}

/// Kind-specific full result payload, opaque to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskResult(pub Value);

impl TaskResult {
    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Candidate identifiers meant for persistence, when the payload carries any
    /// under one of the conventional keys.
    pub fn candidates(&self) -> Vec<String> {
        const KEYS: [&str; 3] = ["candidates", "codes", "suggestions"];
        for key in KEYS {
            if let Some(items) = self.0.get(key).and_then(Value::as_array) {
                return items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Object(map) => map
                            .get("name")
                            .or_else(|| map.get("code"))
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        _ => None,
                    })
                    .collect();
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("sync".parse::<TaskKind>().unwrap(), TaskKind::SyncJob);
        assert_eq!(
            "Discovery-Agent".parse::<TaskKind>().unwrap(),
            TaskKind::DiscoveryAgent
        );
        assert!("neo4j".parse::<TaskKind>().is_err());
    }

    #[test]
    fn kind_serde_uses_kebab_case() {
        let v = serde_json::to_value(TaskKind::SuggestionRunner).unwrap();
        assert_eq!(v, json!("suggestion-runner"));
        let k: TaskKind = serde_json::from_value(json!("sync")).unwrap();
        assert_eq!(k, TaskKind::SyncJob);
    }

    #[test]
    fn only_discovery_is_resumable() {
        let resumable: Vec<_> = TaskKind::ALL.iter().filter(|k| k.is_resumable()).collect();
        assert_eq!(resumable, vec![&TaskKind::DiscoveryAgent]);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
    }

    #[test]
    fn result_candidates_from_strings_and_objects() {
        let r = TaskResult(json!({"codes": ["a", {"name": "b"}, {"code": "c"}, 3]}));
        assert_eq!(r.candidates(), vec!["a", "b", "c"]);
        assert!(TaskResult(json!({"other": 1})).candidates().is_empty());
    }
}
