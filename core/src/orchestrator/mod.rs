pub mod manager;
pub mod session;
pub mod update;

pub use manager::{TaskOrchestrator, UPDATE_CHANNEL_CAPACITY};
pub use session::PollingSession;
pub use update::TaskUpdate;
