//! File-drop IPC transport.
//!
//! A per-agent bidirectional transport rooted at a known directory:
//! producers write small JSON files atomically (temp-then-rename),
//! consumers drain them in filename order (which is chronological order
//! because filenames are epoch-millis-prefixed). A zero-content `_close`
//! file is the sentinel that signals end of session.

pub mod error;
pub mod message;
pub mod transport;

pub use error::IpcError;
pub use message::IpcMessage;
pub use transport::IpcTransport;
