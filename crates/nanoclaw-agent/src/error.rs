//! Agent runner errors.

use thiserror::Error;

/// Errors raised while spawning, feeding, or reading an agent subprocess.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AgentError {
    /// The subprocess could not be spawned.
    #[error("failed to spawn agent process: {0}")]
    SpawnFailed(String),

    /// A framed stdout payload failed to parse as JSON.
    #[error("malformed agent output frame: {0}")]
    MalformedFrame(String),

    /// The agent exited without emitting any framed output.
    #[error("agent process exited with no output (exit code {exit_code:?})")]
    NoOutput {
        /// Process exit code, if the OS reported one.
        exit_code: Option<i32>,
    },

    /// The agent process reported a terminal error via its own framing.
    #[error("agent reported error: {0}")]
    AgentReportedError(String),

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience alias for this crate.
pub type Result<T> = std::result::Result<T, AgentError>;
