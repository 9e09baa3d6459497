//! Error broadcast channel: any component may publish, any may subscribe.

pub mod bus;
pub mod id_gen;
pub mod types;

pub use bus::{ErrorBus, Subscription};
pub use id_gen::generate_event_id;
pub use types::{ErrorEvent, ErrorOrigin};
