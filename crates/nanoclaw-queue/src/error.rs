//! Per-chat queue errors.

use thiserror::Error;

/// Errors raised by the per-chat queue actor.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum QueueError {
    /// The agent failed to spawn for this chat.
    #[error("agent spawn failed for chat: {0}")]
    SpawnFailed(String),

    /// The queued item was dropped because the chat was killed.
    #[error("work item for chat cancelled")]
    Cancelled,

    /// The owning actor task has already shut down.
    #[error("chat queue is no longer running")]
    QueueClosed,

    /// Underlying IPC transport error.
    #[error("ipc error: {0}")]
    Ipc(#[from] nanoclaw_ipc::IpcError),

    /// Underlying agent runner error.
    #[error("agent error: {0}")]
    Agent(#[from] nanoclaw_agent::AgentError),
}

/// A convenience alias for this crate.
pub type Result<T> = std::result::Result<T, QueueError>;
