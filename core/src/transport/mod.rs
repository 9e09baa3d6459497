pub mod models;
pub mod traits;

pub use models::{CheckBatchRequest, ResumePayload, StatusReport, TaskAccepted};
pub use traits::{paths, DedupTransport, TaskTransport};
