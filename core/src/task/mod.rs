pub mod params;
pub mod transitions;
pub mod types;

pub use params::validate_params;
pub use transitions::{StatusTransition, TransitionError};
pub use types::{Task, TaskKind, TaskResult, TaskSnapshot, TaskStatus};
