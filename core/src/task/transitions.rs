//! Monotonic status progression as observed by the client.

use super::types::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("status regressed from {from} to {to}")]
    Regression { from: TaskStatus, to: TaskStatus },
    #[error("status changed after terminal state {state}")]
    FromTerminalState { state: TaskStatus },
}

pub struct StatusTransition;

impl StatusTransition {
    fn rank(status: TaskStatus) -> u8 {
        match status {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed | TaskStatus::Error => 2,
        }
    }

    /// Checks an observed change. Repeats of the same status are always valid.
    pub fn validate(from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
        if from == to {
            return Ok(());
        }
        if from.is_terminal() {
            return Err(TransitionError::FromTerminalState { state: from });
        }
        if Self::rank(to) < Self::rank(from) {
            return Err(TransitionError::Regression { from, to });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_repeat_are_valid() {
        assert!(StatusTransition::validate(TaskStatus::Pending, TaskStatus::Pending).is_ok());
        assert!(StatusTransition::validate(TaskStatus::Pending, TaskStatus::Running).is_ok());
        assert!(StatusTransition::validate(TaskStatus::Pending, TaskStatus::Completed).is_ok());
        assert!(StatusTransition::validate(TaskStatus::Running, TaskStatus::Error).is_ok());
    }

    #[test]
    fn regression_is_rejected() {
        assert_eq!(
            StatusTransition::validate(TaskStatus::Running, TaskStatus::Pending),
            Err(TransitionError::Regression {
                from: TaskStatus::Running,
                to: TaskStatus::Pending
            })
        );
    }

    #[test]
    fn terminal_is_final() {
        assert!(matches!(
            StatusTransition::validate(TaskStatus::Error, TaskStatus::Completed),
            Err(TransitionError::FromTerminalState { .. })
        ));
    }
}
