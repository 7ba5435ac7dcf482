//! IPC transport errors.

use thiserror::Error;

/// Errors raised by the file-drop IPC transport.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IpcError {
    /// A write targeted a path outside the transport's designated root.
    #[error("ipc path escape: '{attempted}' is outside root '{root}'")]
    PathEscape {
        /// The configured IPC root.
        root: String,
        /// The resolved absolute path that fell outside it.
        attempted: String,
    },

    /// Underlying filesystem error during a write, drain, or unlink.
    #[error("ipc transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A dropped file's contents could not be parsed as an [`crate::IpcMessage`].
    #[error("ipc parse error in '{file}': {source}")]
    Parse {
        /// The file that failed to parse.
        file: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// A convenience alias for this crate.
pub type Result<T> = std::result::Result<T, IpcError>;
