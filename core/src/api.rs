//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `qualcode_core::api` instead of reaching into internal modules.

pub use crate::config::{
    get_data_dir, load, load_default, load_from_path, AppConfig, BackendConfig, DedupConfig,
    LoggingConfig, NoticeConfig, PollingConfig,
};
pub use crate::dedup::{
    resolve, CandidateCheck, CommitDecision, DedupGate, DeduplicationCheckResult, GateOutcome,
    SimilarMatch, DEFAULT_THRESHOLD,
};
pub use crate::error::{
    CliError, GateError, TaskError, TaskReportedError, TransportError, TransportErrorKind,
};
pub use crate::events::{generate_event_id, ErrorBus, ErrorEvent, ErrorOrigin, Subscription};
pub use crate::orchestrator::{PollingSession, TaskOrchestrator, TaskUpdate};
pub use crate::task::{
    validate_params, StatusTransition, Task, TaskKind, TaskResult, TaskSnapshot, TaskStatus,
    TransitionError,
};
pub use crate::transport::{
    paths, CheckBatchRequest, DedupTransport, ResumePayload, StatusReport, TaskAccepted,
    TaskTransport,
};
