//! Top-level orchestrator error taxonomy.

use thiserror::Error;

/// Errors that can abort process startup. Everything past startup is
/// caught and logged at the owning loop instead of propagating here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    #[error("configuration invalid: {0}")]
    Configuration(String),

    #[error("task store unreadable or corrupt: {0}")]
    TaskStore(#[from] nanoclaw_scheduler::SchedulerError),

    #[error("plugin load failed: {0}")]
    Plugin(#[from] nanoclaw_plugin::PluginError),

    #[error("channel router error: {0}")]
    Router(#[from] nanoclaw_channels::RouterError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
