//! Router-level error taxonomy.

use nanoclaw_types::Jid;
use thiserror::Error;

/// Errors raised by the channel router itself, as distinct from errors a
/// `Channel` implementation returns from its own methods.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RouterError {
    #[error("no channel registered for prefix '{prefix}' (jid {jid})")]
    UnknownPrefix { prefix: String, jid: Jid },

    #[error("chat {jid} is not registered and registration was declined")]
    NotRegistered { jid: Jid },

    #[error("channel '{name}' failed to start: {reason}")]
    ChannelStartFailed { name: String, reason: String },

    #[error("channel '{name}' is already registered")]
    DuplicateChannel { name: String },
}

/// Errors a [`crate::traits::Channel`] implementation returns from its own
/// connect/send operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChannelError {
    #[error("{0}")]
    Transport(String),

    #[error("operation not supported by this channel")]
    NotSupported,
}

pub type Result<T> = std::result::Result<T, RouterError>;
