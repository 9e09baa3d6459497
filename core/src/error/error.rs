use thiserror::Error;

use super::transport::TransportError;
use crate::task::TaskStatus;

/// The backend itself marked a task as `error`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("task {task_id} reported an error: {message}")]
pub struct TaskReportedError {
    pub task_id: String,
    pub message: String,
    pub errors: Vec<String>,
    /// True when a checkpoint was recorded and `resume` may be attempted.
    pub resumable: bool,
}

#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("connection lost while watching task {task_id} after {failures} consecutive failures")]
    ConnectionLost { task_id: String, failures: u32 },
    #[error("result for task {task_id} is unavailable while status is {status}")]
    ResultUnavailable { task_id: String, status: TaskStatus },
    #[error(transparent)]
    TaskReported(#[from] TaskReportedError),
}

impl TaskError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[derive(Error, Debug, Clone)]
pub enum GateError {
    #[error("validation error: {0}")]
    Validation(String),
    /// The similarity check itself failed; the write must stay blocked.
    #[error("dedup check inconclusive: {0}")]
    Inconclusive(#[from] TransportError),
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("task failed: {0}")]
    Task(#[from] TaskError),
    #[error("dedup gate failed: {0}")]
    Gate(#[from] GateError),
    #[error("dedup gate aborted the write")]
    Aborted,
    #[error("command failed: {0}")]
    Command(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
