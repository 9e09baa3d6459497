//! Wire shapes for the task and dedup endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::TaskStatus;

/// Response of `POST /tasks/execute` and `POST /tasks/resume`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAccepted {
    pub task_id: String,
    pub status: TaskStatus,
}

/// Response of `GET /tasks/status/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "errors_or_default")]
    pub errors: Vec<String>,
    #[serde(
        default,
        alias = "checkpoint_ref",
        skip_serializing_if = "Option::is_none"
    )]
    pub checkpoint: Option<String>,
}

// Backends send `errors: null` as often as they omit it.
fn errors_or_default<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumePayload<'a> {
    pub task_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckBatchRequest {
    pub candidates: Vec<String>,
    pub threshold: f32,
}
