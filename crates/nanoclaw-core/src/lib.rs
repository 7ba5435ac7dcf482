//! Wiring for the pieces that have nowhere else to live: the event bus,
//! the registered-chat/session table, and the top-level host that owns
//! an instance of each subsystem crate.

pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod registry;
pub mod services;
pub mod store;

pub use bus::{EventBus, HandlerId, HandlerResult, DEFAULT_HANDLER_TIMEOUT};
pub use config::NanoclawConfig;
pub use error::{CoreError, Result};
pub use event::{Event, EventKind};
pub use host::{Host, HostConfig};
pub use registry::Registry;
pub use store::JsonlMap;
