use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id_gen::generate_event_id;
use crate::error::TransportError;

/// Where a notice came from, so subscribers can tell "retry" apart from
/// "resume" apart from "fix input".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    #[default]
    Transport,
    ConnectionLost,
    TaskReported,
    DedupCheck,
}

/// One transport or application failure notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub id: String,
    #[serde(default)]
    pub origin: ErrorOrigin,
    /// HTTP status, or 0 for "no connection" and client-side failures.
    pub status: u16,
    pub message: String,
    /// Logical request identity.
    pub path: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(status: u16, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: generate_event_id(),
            origin: ErrorOrigin::Transport,
            status,
            message: message.into(),
            path: path.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn from_transport(err: &TransportError) -> Self {
        Self::new(err.status_code(), err.message(), err.path())
    }

    pub fn with_origin(mut self, origin: ErrorOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn is_connectivity(&self) -> bool {
        self.status == 0
    }
}
