//! Top-level error taxonomy for the nanoclaw orchestrator.
//!
//! Each subsystem crate defines its own narrower error enum (`IpcError`,
//! `PluginError`, `SchedulerError`, ...); this enum is the cross-cutting
//! kind shared by types that do not belong to one subsystem, and the
//! aggregation point the CLI reports from at startup.

use thiserror::Error;

/// Top-level error type for the nanoclaw core.
///
/// Variants map onto the error taxonomy: configuration failures are
/// never retried, security violations are raised synchronously at the
/// call site, and I/O/JSON failures wrap the underlying std errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NanoclawError {
    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A capability-gated service was invoked without the required capability.
    #[error("capability denied: operation '{operation}' requires '{capability}'")]
    CapabilityDenied {
        /// The operation that was attempted.
        operation: String,
        /// The capability that would have authorized it.
        capability: String,
    },

    /// A write targeted a path outside its designated root.
    #[error("path escape: '{attempted}' is outside root '{root}'")]
    PathEscape {
        /// The root directory the write should have stayed under.
        root: String,
        /// The resolved absolute path that escaped it.
        attempted: String,
    },

    /// The agent subprocess crashed, exited non-zero, or emitted unparsable output.
    #[error("agent process error: {0}")]
    ProcessError(String),

    /// A scheduled task run failed; see the diagnoser for classification.
    #[error("schedule failure: {0}")]
    ScheduleFailure(String),

    /// A filesystem or channel transport failure.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, NanoclawError>;
