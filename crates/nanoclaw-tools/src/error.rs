//! Tool dispatch errors.

use thiserror::Error;

/// Errors raised while registering or invoking tools.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ToolDispatchError {
    /// No tool is registered under this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The invocation's arguments failed schema validation.
    #[error("tool '{tool}' argument validation failed: {reason}")]
    ValidationFailed {
        /// Tool name.
        tool: String,
        /// What was wrong with the arguments.
        reason: String,
    },

    /// The tool's own handler or a capability-gated service it called failed.
    #[error("plugin error: {0}")]
    Plugin(#[from] nanoclaw_plugin::PluginError),
}

/// A convenience alias for this crate.
pub type Result<T> = std::result::Result<T, ToolDispatchError>;
