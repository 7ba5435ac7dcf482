//! Plugin subsystem errors.

use thiserror::Error;

/// Errors raised while discovering, loading, unloading, or invoking plugins.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PluginError {
    /// The manifest failed schema validation.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// The plugin's entry path resolves outside its own directory.
    #[error("plugin entry path escapes plugin directory: {0}")]
    EntryPathEscape(String),

    /// The plugin's entry file does not exist.
    #[error("plugin entry not found: {0}")]
    EntryNotFound(String),

    /// A dependency cycle was detected during topological sort.
    #[error("dependency cycle detected at plugin '{0}'")]
    DependencyCycle(String),

    /// A duplicate plugin name was encountered during loading.
    #[error("duplicate plugin name: {0}")]
    DuplicateName(String),

    /// `onLoad` failed or exceeded its hard timeout.
    #[error("plugin '{name}' failed to load: {reason}")]
    LoadFailed {
        /// Plugin name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// A capability-gated operation was invoked without the declared capability.
    #[error("capability denied: operation '{operation}' requires '{capability}'")]
    CapabilityDenied {
        /// The operation that was attempted.
        operation: String,
        /// The capability that would have authorized it.
        capability: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error parsing a manifest or tool argument.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A live `tasks`/`messages` service call failed in the owning
    /// subsystem (the scheduler, the router) rather than at the
    /// capability gate.
    #[error("{0}")]
    Other(String),
}

/// A convenience alias for this crate.
pub type Result<T> = std::result::Result<T, PluginError>;
