use async_trait::async_trait;
use serde_json::Value;

use super::models::{CheckBatchRequest, StatusReport, TaskAccepted};
use crate::dedup::DeduplicationCheckResult;
use crate::error::TransportError;
use crate::task::{TaskKind, TaskResult};

/// Request/response access to the task endpoints.
#[async_trait]
pub trait TaskTransport: Send + Sync {
    async fn execute(&self, kind: TaskKind, params: &Value)
        -> Result<TaskAccepted, TransportError>;

    async fn status(&self, task_id: &str) -> Result<StatusReport, TransportError>;

    /// Only meaningful once the task is terminal.
    async fn result(&self, task_id: &str) -> Result<TaskResult, TransportError>;

    async fn resume(&self, task_id: &str) -> Result<TaskAccepted, TransportError>;
}

#[async_trait]
pub trait DedupTransport: Send + Sync {
    async fn check_batch(
        &self,
        request: &CheckBatchRequest,
    ) -> Result<DeduplicationCheckResult, TransportError>;
}

/// Logical request identities, shared by transports and error events.
pub mod paths {
    pub const EXECUTE: &str = "/tasks/execute";
    pub const RESUME: &str = "/tasks/resume";
    pub const CHECK_BATCH: &str = "/codes/check-batch";
    pub const HEALTH: &str = "/health";

    pub fn status(task_id: &str) -> String {
        format!("/tasks/status/{task_id}")
    }

    pub fn result(task_id: &str) -> String {
        format!("/tasks/result/{task_id}")
    }
}
