use crate::error::TaskReportedError;
use crate::task::{Task, TaskResult, TaskSnapshot};

/// Notifications delivered to the consumer of a [`super::TaskOrchestrator`].
#[derive(Debug, Clone)]
pub enum TaskUpdate {
    /// A session started watching `task` (after submit, resume or attach).
    Started(Task),
    /// A successful poll, terminal or not.
    Progress(TaskSnapshot),
    Completed {
        task_id: String,
        result: TaskResult,
    },
    /// The backend marked the task `error`.
    Failed {
        task_id: String,
        error: TaskReportedError,
        partial: Option<TaskResult>,
    },
    /// Too many consecutive poll failures; the session is gone.
    ConnectionLost { task_id: String, failures: u32 },
    /// The task completed but its result could not be retrieved.
    ResultFetchFailed { task_id: String, message: String },
    /// Released by the consumer before reaching a terminal state.
    Cancelled { task_id: String },
}

impl TaskUpdate {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Started(task) => &task.task_id,
            Self::Progress(snapshot) => &snapshot.task_id,
            Self::Completed { task_id, .. }
            | Self::Failed { task_id, .. }
            | Self::ConnectionLost { task_id, .. }
            | Self::ResultFetchFailed { task_id, .. }
            | Self::Cancelled { task_id } => task_id,
        }
    }

    /// True for updates after which the session no longer exists.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Started(_) | Self::Progress(_))
    }
}
