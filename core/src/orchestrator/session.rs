//! Client-local bookkeeping for watching one task.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::task::{Task, TaskStatus};

/// State shared between a [`PollingSession`] and its ticker.
pub(crate) struct SessionState {
    pub(crate) task: Task,
    failures: AtomicU32,
    result_fetched: AtomicBool,
    in_flight: AtomicBool,
    closed: AtomicBool,
    polls: AtomicU64,
    last_status: Mutex<TaskStatus>,
}

impl SessionState {
    pub(crate) fn new(task: Task) -> Self {
        let status = task.status;
        Self {
            task,
            failures: AtomicU32::new(0),
            result_fetched: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            polls: AtomicU64::new(0),
            last_status: Mutex::new(status),
        }
    }

    pub(crate) fn task_id(&self) -> &str {
        &self.task.task_id
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Claims the single in-flight slot. `None` means a poll is already pending.
    pub(crate) fn begin_poll(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(self))
    }

    pub(crate) fn record_failure(&self) -> u32 {
        self.failures.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn record_success(&self) -> u64 {
        self.failures.store(0, Ordering::Release);
        self.polls.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    /// Returns false if the result was already claimed.
    pub(crate) fn claim_result(&self) -> bool {
        !self.result_fetched.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn result_fetched(&self) -> bool {
        self.result_fetched.load(Ordering::Acquire)
    }

    /// Stores the new status and returns the previous one.
    pub(crate) fn swap_status(&self, status: TaskStatus) -> TaskStatus {
        let mut guard = match self.last_status.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, status)
    }

    pub(crate) fn last_status(&self) -> TaskStatus {
        match self.last_status.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Clears the in-flight flag on every exit path, including ticker abort.
pub(crate) struct InFlight<'a>(&'a SessionState);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

/// Watches one task. Owns the interval handle and releases it exactly once:
/// on terminal state, on the failure cap, on cancel, or when dropped.
pub struct PollingSession {
    state: Arc<SessionState>,
    interval_handle: Option<JoinHandle<()>>,
}

impl PollingSession {
    pub(crate) fn new(state: Arc<SessionState>, interval_handle: JoinHandle<()>) -> Self {
        Self {
            state,
            interval_handle: Some(interval_handle),
        }
    }

    pub(crate) fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn task_id(&self) -> &str {
        self.state.task_id()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.failures()
    }

    pub fn result_fetched(&self) -> bool {
        self.state.result_fetched()
    }

    pub fn is_released(&self) -> bool {
        self.interval_handle.is_none()
    }

    /// Stops the ticker. Returns false when it was already released.
    pub fn release(&mut self) -> bool {
        self.state.close();
        match self.interval_handle.take() {
            Some(handle) => {
                handle.abort();
                tracing::debug!(
                    target: "qualcode.task",
                    stage = "task.session.released",
                    task_id = %self.state.task_id()
                );
                true
            }
            None => false,
        }
    }
}

impl Drop for PollingSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;
    use serde_json::Value;

    fn task() -> Task {
        Task {
            task_id: "t1".into(),
            kind: TaskKind::SyncJob,
            status: TaskStatus::Pending,
            progress: Value::Null,
            checkpoint_ref: None,
            resumed_from: None,
        }
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let state = Arc::new(SessionState::new(task()));
        let handle = tokio::spawn(std::future::pending::<()>());
        let mut session = PollingSession::new(state.clone(), handle);

        assert!(session.release());
        assert!(!session.release());
        assert!(session.is_released());
        assert!(state.is_closed());
    }

    #[test]
    fn in_flight_is_exclusive_and_cleared_on_drop() {
        let state = SessionState::new(task());
        let guard = state.begin_poll().expect("first claim");
        assert!(state.begin_poll().is_none());
        drop(guard);
        assert!(state.begin_poll().is_some());
    }

    #[test]
    fn success_resets_failures() {
        let state = SessionState::new(task());
        assert_eq!(state.record_failure(), 1);
        assert_eq!(state.record_failure(), 2);
        assert_eq!(state.record_success(), 1);
        assert_eq!(state.failures(), 0);
    }

    #[test]
    fn result_claimed_once() {
        let state = SessionState::new(task());
        assert!(state.claim_result());
        assert!(!state.claim_result());
        assert!(state.result_fetched());
    }
}
