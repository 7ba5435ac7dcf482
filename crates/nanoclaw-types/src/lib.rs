//! Shared data types for the nanoclaw orchestrator.
//!
//! These types are deliberately free of async runtime dependencies so that
//! every other crate in the workspace -- including the plugin contract
//! crate, which may be consumed by statically linked plugin crates -- can
//! depend on them without pulling in tokio.

pub mod error;
pub mod event;
pub mod jid;
pub mod registered_chat;
pub mod session;
pub mod task;

pub use error::NanoclawError;
pub use event::{Event, EventKind, InboundMessage, OutboundMessage};
pub use jid::Jid;
pub use registered_chat::RegisteredChat;
pub use session::Session;
pub use task::{ContextMode, ScheduleKind, ScheduleValue, ScheduledTask, TaskRunLog, TaskStatus};
