//! Generic orchestrator for long-running, server-executed tasks.
//!
//! One `TaskOrchestrator` owns one logical slot (a panel, a CLI run) for one
//! task kind. Starting a new session in the slot always releases the previous
//! one first, so at most one ticker exists per slot. Dropping the orchestrator
//! releases whatever session is still live.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::session::{PollingSession, SessionState};
use super::update::TaskUpdate;
use crate::config::PollingConfig;
use crate::error::{TaskError, TaskReportedError, TransportError, TransportErrorKind};
use crate::events::{ErrorBus, ErrorEvent, ErrorOrigin};
use crate::task::{
    validate_params, StatusTransition, Task, TaskKind, TaskResult, TaskSnapshot, TaskStatus,
};
use crate::transport::{paths, StatusReport, TaskAccepted, TaskTransport};

pub const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// HTTP status attached to notices for task-reported errors: the status request
/// itself succeeded.
const TASK_REPORTED_STATUS: u16 = 200;

pub struct TaskOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    kind: TaskKind,
    transport: Arc<dyn TaskTransport>,
    config: PollingConfig,
    errors: Option<ErrorBus>,
    updates: broadcast::Sender<TaskUpdate>,
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    session: Option<PollingSession>,
    last_snapshot: Option<TaskSnapshot>,
    /// Errored task id -> checkpoint, for resumable kinds only.
    checkpoints: HashMap<String, String>,
    /// Task id -> fetched result. Each task's result is retrieved at most once.
    results: HashMap<String, TaskResult>,
}

enum TickOutcome {
    /// Another poll for the same session was still pending.
    Skipped,
    /// The session was released while the request was in flight.
    Discarded,
    Observed(TaskSnapshot),
}

impl TaskOrchestrator {
    pub fn new(
        kind: TaskKind,
        transport: Arc<dyn TaskTransport>,
        config: PollingConfig,
        errors: Option<ErrorBus>,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                kind,
                transport,
                config,
                errors,
                updates,
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.inner.kind
    }

    pub fn config(&self) -> &PollingConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskUpdate> {
        self.inner.updates.subscribe()
    }

    /// Starts a task and a polling session for it.
    pub async fn submit(&self, params: Value) -> Result<Task, TaskError> {
        let kind = self.inner.kind;
        validate_params(kind, &params)?;

        tracing::info!(
            target: "qualcode.task",
            stage = "task.submit.in",
            kind = %kind
        );
        let accepted = match self.inner.transport.execute(kind, &params).await {
            Ok(a) => a,
            Err(err) => return Err(self.inner.surface(err)),
        };
        let accepted = self.inner.check_accepted(accepted, paths::EXECUTE)?;

        let task = Task {
            task_id: accepted.task_id,
            kind,
            status: accepted.status,
            progress: Value::Null,
            checkpoint_ref: None,
            resumed_from: None,
        };
        tracing::info!(
            target: "qualcode.task",
            stage = "task.submit.out",
            kind = %kind,
            task_id = %task.task_id,
            status = %task.status
        );
        Inner::start_session(&self.inner, task.clone());
        Ok(task)
    }

    /// Watches a task that was started elsewhere (e.g. before a restart).
    pub fn attach(&self, task_id: &str) -> Result<Task, TaskError> {
        if task_id.trim().is_empty() {
            return Err(TaskError::validation("task_id must not be empty"));
        }
        let task = Task {
            task_id: task_id.to_string(),
            kind: self.inner.kind,
            status: TaskStatus::Pending,
            progress: Value::Null,
            checkpoint_ref: None,
            resumed_from: None,
        };
        Inner::start_session(&self.inner, task.clone());
        Ok(task)
    }

    /// One status check. With a live session for `task_id` this is a regular
    /// tick (failure counting, terminal handling); otherwise it is read-only.
    pub async fn poll(&self, task_id: &str) -> Result<TaskSnapshot, TaskError> {
        if let Some(state) = self.inner.live_state(task_id) {
            return match self.inner.tick(&state).await? {
                TickOutcome::Observed(snapshot) => Ok(snapshot),
                TickOutcome::Skipped => self.inner.last_snapshot_for(task_id).ok_or_else(|| {
                    TaskError::Transport(TransportError::new(
                        TransportErrorKind::Request,
                        paths::status(task_id),
                        "a poll for this task is already in flight",
                    ))
                }),
                TickOutcome::Discarded => Err(TaskError::Transport(TransportError::new(
                    TransportErrorKind::Request,
                    paths::status(task_id),
                    "session was released while the status request was in flight",
                ))),
            };
        }

        let reply = self
            .inner
            .transport
            .status(task_id)
            .await
            .and_then(|r| expect_task(task_id, r));
        let report = match reply {
            Ok(r) => r,
            Err(err) => return Err(self.inner.surface(err)),
        };
        if report.status == TaskStatus::Error {
            self.inner
                .record_checkpoint(task_id, report.checkpoint.as_deref());
        }
        Ok(snapshot_from(self.inner.kind, task_id, &report, 0))
    }

    /// Starts a new task from the checkpoint of a task that ended in `error`.
    pub async fn resume(&self, task_id: &str) -> Result<Task, TaskError> {
        let kind = self.inner.kind;
        if !kind.is_resumable() {
            return Err(TaskError::validation(format!("{kind} tasks cannot be resumed")));
        }
        if self.inner.live_state(task_id).is_some() {
            return Err(TaskError::validation(format!(
                "task {task_id} is still being watched; it must reach a terminal error first"
            )));
        }
        let Some(checkpoint) = self.inner.checkpoint_for(task_id) else {
            return Err(TaskError::validation(format!(
                "no checkpoint is known for task {task_id}"
            )));
        };

        tracing::info!(
            target: "qualcode.task",
            stage = "task.resume.in",
            kind = %kind,
            task_id = %task_id,
            checkpoint = %checkpoint
        );
        let accepted = match self.inner.transport.resume(task_id).await {
            Ok(a) => a,
            Err(err) => return Err(self.inner.surface(err)),
        };
        let accepted = self.inner.check_accepted(accepted, paths::RESUME)?;
        self.inner.lock().checkpoints.remove(task_id);

        let task = Task {
            task_id: accepted.task_id,
            kind,
            status: accepted.status,
            progress: Value::Null,
            checkpoint_ref: Some(checkpoint),
            resumed_from: Some(task_id.to_string()),
        };
        tracing::info!(
            target: "qualcode.task",
            stage = "task.resume.out",
            task_id = %task.task_id,
            resumed_from = %task_id
        );
        Inner::start_session(&self.inner, task.clone());
        Ok(task)
    }

    /// Client-local unsubscribe; the backend is not told. Returns false when
    /// there was nothing to release, so a repeated cancel is a no-op.
    pub fn cancel(&self, task_id: &str) -> bool {
        let released = self.inner.release_session(task_id);
        if released {
            tracing::info!(
                target: "qualcode.task",
                stage = "task.cancel",
                task_id = %task_id
            );
            self.inner.emit(TaskUpdate::Cancelled {
                task_id: task_id.to_string(),
            });
        }
        released
    }

    /// Cancels whatever session the slot currently holds.
    pub fn cancel_active(&self) -> bool {
        match self.active_task_id() {
            Some(id) => self.cancel(&id),
            None => false,
        }
    }

    /// Full result of a terminal task. The backend is asked at most once per
    /// task; later calls return the cached value.
    pub async fn fetch_result(&self, task_id: &str) -> Result<TaskResult, TaskError> {
        if let Some(result) = self.inner.cached_result(task_id) {
            return Ok(result);
        }
        if let Some(state) = self.inner.live_state(task_id) {
            return Err(TaskError::ResultUnavailable {
                task_id: task_id.to_string(),
                status: state.last_status(),
            });
        }

        let reply = self
            .inner
            .transport
            .status(task_id)
            .await
            .and_then(|r| expect_task(task_id, r));
        let report = match reply {
            Ok(r) => r,
            Err(err) => return Err(self.inner.surface(err)),
        };
        if !report.status.is_terminal() {
            return Err(TaskError::ResultUnavailable {
                task_id: task_id.to_string(),
                status: report.status,
            });
        }
        if report.status == TaskStatus::Error {
            self.inner
                .record_checkpoint(task_id, report.checkpoint.as_deref());
        }
        let result = match self.inner.transport.result(task_id).await {
            Ok(r) => r,
            Err(err) => return Err(self.inner.surface(err)),
        };
        self.inner.lock().results.insert(task_id.to_string(), result.clone());
        Ok(result)
    }

    pub fn snapshot(&self) -> Option<TaskSnapshot> {
        self.inner.lock().last_snapshot.clone()
    }

    pub fn active_task_id(&self) -> Option<String> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.task_id().to_string())
    }

    /// Failure count of the live session for `task_id`, if any.
    pub fn consecutive_failures(&self, task_id: &str) -> Option<u32> {
        self.inner.live_state(task_id).map(|s| s.failures())
    }

    pub fn has_checkpoint(&self, task_id: &str) -> bool {
        self.inner.checkpoint_for(task_id).is_some()
    }

    /// Releases the live session without emitting `Cancelled`. Called on drop;
    /// safe to call any number of times.
    pub fn dispose(&self) -> bool {
        match self.inner.take_session(None) {
            Some(mut session) => session.release(),
            None => false,
        }
    }
}

impl Drop for TaskOrchestrator {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, update: TaskUpdate) {
        // No receivers is fine.
        let _ = self.updates.send(update);
    }

    fn publish(&self, event: ErrorEvent) {
        if let Some(bus) = &self.errors {
            bus.publish(event);
        }
    }

    /// Publishes a one-shot failure and converts it for the caller.
    fn surface(&self, err: TransportError) -> TaskError {
        tracing::warn!(
            target: "qualcode.task",
            stage = "task.request.failed",
            kind = %self.kind,
            error = %err
        );
        self.publish(ErrorEvent::from_transport(&err));
        TaskError::Transport(err)
    }

    fn check_accepted(&self, accepted: TaskAccepted, path: &str) -> Result<TaskAccepted, TaskError> {
        if accepted.task_id.trim().is_empty() {
            let err = TransportError::new(
                TransportErrorKind::Decode,
                path,
                "backend accepted the task without a task_id",
            );
            return Err(self.surface(err));
        }
        Ok(accepted)
    }

    fn live_state(&self, task_id: &str) -> Option<Arc<SessionState>> {
        self.lock()
            .session
            .as_ref()
            .filter(|s| s.task_id() == task_id)
            .map(|s| s.state().clone())
    }

    fn last_snapshot_for(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.lock()
            .last_snapshot
            .as_ref()
            .filter(|s| s.task_id == task_id)
            .cloned()
    }

    fn cached_result(&self, task_id: &str) -> Option<TaskResult> {
        self.lock().results.get(task_id).cloned()
    }

    fn checkpoint_for(&self, task_id: &str) -> Option<String> {
        self.lock().checkpoints.get(task_id).cloned()
    }

    /// Returns true when a checkpoint was recorded.
    fn record_checkpoint(&self, task_id: &str, checkpoint: Option<&str>) -> bool {
        if !self.kind.is_resumable() {
            return false;
        }
        match checkpoint.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => {
                self.lock()
                    .checkpoints
                    .insert(task_id.to_string(), c.to_string());
                true
            }
            None => false,
        }
    }

    /// Removes the session from the slot, if it matches `task_id` (any when
    /// `None`). The caller releases it outside the lock.
    fn take_session(&self, task_id: Option<&str>) -> Option<PollingSession> {
        let mut slot = self.lock();
        let matches = match (&slot.session, task_id) {
            (Some(s), Some(id)) => s.task_id() == id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            slot.session.take()
        } else {
            None
        }
    }

    fn release_session(&self, task_id: &str) -> bool {
        match self.take_session(Some(task_id)) {
            Some(mut session) => session.release(),
            None => false,
        }
    }

    fn start_session(this: &Arc<Self>, task: Task) {
        if let Some(mut previous) = this.take_session(None) {
            tracing::debug!(
                target: "qualcode.task",
                stage = "task.session.replaced",
                previous = %previous.task_id(),
                next = %task.task_id
            );
            previous.release();
        }

        let state = Arc::new(SessionState::new(task.clone()));
        let handle = tokio::spawn(run_ticker(
            Arc::downgrade(this),
            state.clone(),
            this.config.interval(),
        ));
        let session = PollingSession::new(state, handle);

        let displaced = {
            let mut slot = this.lock();
            slot.last_snapshot = None;
            slot.session.replace(session)
        };
        if let Some(mut displaced) = displaced {
            displaced.release();
        }
        this.emit(TaskUpdate::Started(task));
    }

    async fn tick(&self, state: &Arc<SessionState>) -> Result<TickOutcome, TaskError> {
        let Some(_in_flight) = state.begin_poll() else {
            tracing::trace!(
                target: "qualcode.task",
                stage = "task.poll.skipped",
                task_id = %state.task_id()
            );
            return Ok(TickOutcome::Skipped);
        };

        let task_id = state.task_id();
        tracing::debug!(
            target: "qualcode.task",
            stage = "task.poll.in",
            kind = %self.kind,
            task_id = %task_id
        );
        let reply = self
            .transport
            .status(task_id)
            .await
            .and_then(|r| expect_task(task_id, r));
        if state.is_closed() {
            tracing::debug!(
                target: "qualcode.task",
                stage = "task.poll.discarded",
                task_id = %task_id
            );
            return Ok(TickOutcome::Discarded);
        }

        let report = match reply {
            Ok(r) => r,
            Err(err) => return self.absorb_failure(state, err),
        };

        let sequence = state.record_success();
        let previous = state.swap_status(report.status);
        if let Err(violation) = StatusTransition::validate(previous, report.status) {
            tracing::warn!(
                target: "qualcode.task",
                stage = "task.poll.non_monotonic",
                task_id = %task_id,
                error = %violation
            );
        }

        let snapshot = snapshot_from(self.kind, task_id, &report, sequence);
        tracing::debug!(
            target: "qualcode.task",
            stage = "task.poll.out",
            task_id = %task_id,
            status = %snapshot.status,
            sequence = sequence
        );
        self.lock().last_snapshot = Some(snapshot.clone());
        self.emit(TaskUpdate::Progress(snapshot.clone()));

        if report.status.is_terminal() {
            self.finish_terminal(state, report).await;
        }
        Ok(TickOutcome::Observed(snapshot))
    }

    fn absorb_failure(
        &self,
        state: &SessionState,
        err: TransportError,
    ) -> Result<TickOutcome, TaskError> {
        let failures = state.record_failure();
        let cap = self.config.failure_cap();
        let task_id = state.task_id().to_string();

        if failures < cap {
            tracing::debug!(
                target: "qualcode.task",
                stage = "task.poll.failed",
                task_id = %task_id,
                failures = failures,
                cap = cap,
                error = %err
            );
            return Err(TaskError::Transport(err));
        }

        tracing::warn!(
            target: "qualcode.task",
            stage = "task.poll.connection_lost",
            task_id = %task_id,
            failures = failures,
            error = %err
        );
        if self.release_session(&task_id) {
            self.publish(
                ErrorEvent::new(
                    err.status_code(),
                    format!(
                        "lost connection after {failures} failed status checks: {}",
                        err.message()
                    ),
                    err.path(),
                )
                .with_origin(ErrorOrigin::ConnectionLost),
            );
            self.emit(TaskUpdate::ConnectionLost {
                task_id: task_id.clone(),
                failures,
            });
        }
        Err(TaskError::ConnectionLost { task_id, failures })
    }

    async fn finish_terminal(&self, state: &SessionState, report: StatusReport) {
        if !state.claim_result() {
            return;
        }
        let task_id = state.task_id().to_string();
        tracing::debug!(
            target: "qualcode.task",
            stage = "task.result.in",
            task_id = %task_id,
            status = %report.status
        );
        let fetched = self.transport.result(&task_id).await;
        if state.is_closed() {
            tracing::debug!(
                target: "qualcode.task",
                stage = "task.result.discarded",
                task_id = %task_id
            );
            return;
        }
        self.release_session(&task_id);

        if report.status == TaskStatus::Completed {
            match fetched {
                Ok(result) => {
                    tracing::info!(
                        target: "qualcode.task",
                        stage = "task.completed",
                        task_id = %task_id
                    );
                    self.lock().results.insert(task_id.clone(), result.clone());
                    self.emit(TaskUpdate::Completed { task_id, result });
                }
                Err(err) => {
                    tracing::warn!(
                        target: "qualcode.task",
                        stage = "task.result.failed",
                        task_id = %task_id,
                        error = %err
                    );
                    self.publish(ErrorEvent::from_transport(&err));
                    self.emit(TaskUpdate::ResultFetchFailed {
                        task_id,
                        message: err.to_string(),
                    });
                }
            }
            return;
        }

        let resumable = self.record_checkpoint(&task_id, report.checkpoint.as_deref());
        let partial = match fetched {
            Ok(result) => {
                self.lock().results.insert(task_id.clone(), result.clone());
                Some(result)
            }
            Err(err) => {
                tracing::debug!(
                    target: "qualcode.task",
                    stage = "task.result.partial_missing",
                    task_id = %task_id,
                    error = %err
                );
                None
            }
        };
        let message = report
            .message
            .clone()
            .or_else(|| report.errors.first().cloned())
            .unwrap_or_else(|| "task reported an error".to_string());
        let error = TaskReportedError {
            task_id: task_id.clone(),
            message,
            errors: report.errors,
            resumable,
        };
        tracing::warn!(
            target: "qualcode.task",
            stage = "task.failed",
            task_id = %task_id,
            resumable = resumable,
            message = %error.message
        );
        self.publish(
            ErrorEvent::new(
                TASK_REPORTED_STATUS,
                error.message.clone(),
                paths::status(&task_id),
            )
            .with_origin(ErrorOrigin::TaskReported),
        );
        self.emit(TaskUpdate::Failed {
            task_id,
            error,
            partial,
        });
    }
}

/// A status reply describing another task is treated as undecodable.
fn expect_task(task_id: &str, report: StatusReport) -> Result<StatusReport, TransportError> {
    if report.task_id == task_id {
        return Ok(report);
    }
    Err(TransportError::new(
        TransportErrorKind::Decode,
        paths::status(task_id),
        format!(
            "status reply is for task {:?}, expected {:?}",
            report.task_id, task_id
        ),
    ))
}

fn snapshot_from(kind: TaskKind, task_id: &str, report: &StatusReport, sequence: u64) -> TaskSnapshot {
    TaskSnapshot {
        task_id: task_id.to_string(),
        kind,
        status: report.status,
        progress: report.progress.clone(),
        message: report.message.clone(),
        errors: report.errors.clone(),
        observed_at: Utc::now(),
        sequence,
    }
}

/// The interval loop. Holds only a weak reference so that dropping the
/// orchestrator tears the session down.
async fn run_ticker(inner: Weak<Inner>, state: Arc<SessionState>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if state.is_closed() {
            break;
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match inner.tick(&state).await {
            Ok(TickOutcome::Observed(snapshot)) if snapshot.status.is_terminal() => break,
            Ok(TickOutcome::Discarded) => break,
            Ok(_) => {}
            Err(TaskError::ConnectionLost { .. }) => break,
            Err(_) => {}
        }
    }
}
