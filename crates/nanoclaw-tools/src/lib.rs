//! Loads container-target plugin tools and dispatches invocations to
//! them with capability-gated, per-invocation context (C6).

pub mod dispatcher;
pub mod error;
pub mod validate;

pub use dispatcher::ToolDispatcher;
pub use error::ToolDispatchError;
pub use validate::validate_args;
