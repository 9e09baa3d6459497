#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use qualcode_core::api::{
    paths, CheckBatchRequest, DedupTransport, DeduplicationCheckResult, StatusReport,
    TaskAccepted, TaskKind, TaskResult, TaskStatus, TaskTransport, TransportError,
    TransportErrorKind,
};

/// In-memory backend whose status replies are queued by the test. Once the
/// queue runs dry the last successful reply repeats.
#[derive(Default)]
pub struct ScriptedTransport {
    statuses: Mutex<VecDeque<Result<StatusReport, TransportError>>>,
    sticky: Mutex<Option<StatusReport>>,
    result: Mutex<Option<Result<TaskResult, TransportError>>>,
    accept_ids: Mutex<VecDeque<String>>,
    hold_status: Mutex<Option<Arc<Notify>>>,
    execute_calls: AtomicUsize,
    status_calls: AtomicUsize,
    result_calls: AtomicUsize,
    resume_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accept_as(&self, task_id: &str) {
        self.accept_ids.lock().unwrap().push_back(task_id.to_string());
    }

    pub fn push_status(&self, report: StatusReport) {
        self.statuses.lock().unwrap().push_back(Ok(report));
    }

    pub fn push_failure(&self, err: TransportError) {
        self.statuses.lock().unwrap().push_back(Err(err));
    }

    pub fn set_result(&self, result: Result<TaskResult, TransportError>) {
        *self.result.lock().unwrap() = Some(result);
    }

    /// Status calls block until the returned handle is notified.
    pub fn hold_status(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold_status.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn result_calls(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }

    fn next_id(&self, fallback: &str) -> String {
        self.accept_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[async_trait]
impl TaskTransport for ScriptedTransport {
    async fn execute(&self, _kind: TaskKind, _params: &Value) -> Result<TaskAccepted, TransportError> {
        let n = self.execute_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TaskAccepted {
            task_id: self.next_id(&format!("task-{n}")),
            status: TaskStatus::Pending,
        })
    }

    async fn status(&self, task_id: &str) -> Result<StatusReport, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let hold = self.hold_status.lock().unwrap().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(Ok(report)) => {
                *self.sticky.lock().unwrap() = Some(report.clone());
                Ok(report)
            }
            Some(Err(err)) => Err(err),
            None => self.sticky.lock().unwrap().clone().ok_or_else(|| {
                TransportError::new(
                    TransportErrorKind::Status,
                    paths::status(task_id),
                    "no scripted status",
                )
                .with_status(404)
            }),
        }
    }

    async fn result(&self, task_id: &str) -> Result<TaskResult, TransportError> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().unwrap().clone().unwrap_or_else(|| {
            Err(TransportError::status_error(404, paths::result(task_id), "not found"))
        })
    }

    async fn resume(&self, task_id: &str) -> Result<TaskAccepted, TransportError> {
        let n = self.resume_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TaskAccepted {
            task_id: self.next_id(&format!("{task_id}-r{n}")),
            status: TaskStatus::Pending,
        })
    }
}

/// Dedup backend with one canned reply.
pub struct FixedDedup {
    reply: Result<DeduplicationCheckResult, TransportError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<CheckBatchRequest>>,
}

impl FixedDedup {
    pub fn new(reply: Result<DeduplicationCheckResult, TransportError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CheckBatchRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl DedupTransport for FixedDedup {
    async fn check_batch(
        &self,
        request: &CheckBatchRequest,
    ) -> Result<DeduplicationCheckResult, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.reply.clone()
    }
}

pub fn report(task_id: &str, status: TaskStatus, progress: Value) -> StatusReport {
    StatusReport {
        task_id: task_id.to_string(),
        status,
        progress,
        message: None,
        errors: Vec::new(),
        checkpoint: None,
    }
}

pub fn error_report(task_id: &str, message: &str, checkpoint: Option<&str>) -> StatusReport {
    StatusReport {
        task_id: task_id.to_string(),
        status: TaskStatus::Error,
        progress: Value::Null,
        message: Some(message.to_string()),
        errors: vec![message.to_string()],
        checkpoint: checkpoint.map(str::to_string),
    }
}

pub fn connect_refused(task_id: &str) -> TransportError {
    TransportError::new(
        TransportErrorKind::Connect,
        paths::status(task_id),
        "connection refused",
    )
}

pub fn codes_result(codes: &[&str]) -> TaskResult {
    TaskResult(json!({ "codes": codes }))
}
