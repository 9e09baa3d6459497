#[allow(clippy::module_inception)]
pub mod error;
pub mod transport;

pub use error::{CliError, GateError, TaskError, TaskReportedError};
pub use transport::{TransportError, TransportErrorKind};
