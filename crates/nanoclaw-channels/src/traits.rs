//! The seams between a channel implementation, the router, and the
//! registered-chat policy that decides who gets auto-registered.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use nanoclaw_types::{InboundMessage, Jid, RegisteredChat};

use crate::error::ChannelError;

/// One platform adapter (Discord, web, etc). Implementations own their own
/// connection lifecycle; the router supervises them with one task and one
/// [`CancellationToken`] each.
#[async_trait]
pub trait Channel: Send + Sync {
    /// The channel name used as the JID prefix, e.g. `"discord"`.
    fn name(&self) -> &str;

    /// Establish the channel's connection and begin delivering inbound
    /// events to `host` until `cancel` fires. Returns once the channel has
    /// shut down, whether cleanly or due to cancellation.
    async fn connect(
        &self,
        host: Arc<dyn RouterHost>,
        cancel: CancellationToken,
    ) -> Result<(), ChannelError>;

    /// Tear down any resources not already released by `connect` returning.
    async fn disconnect(&self) -> Result<(), ChannelError>;

    /// Whether this channel instance is the one that owns `jid`.
    fn owns_jid(&self, jid: &Jid) -> bool;

    /// Send a text message to `jid`.
    async fn send_message(&self, jid: &Jid, text: &str) -> Result<(), ChannelError>;

    /// Send a voice message. Channels that don't support voice keep the
    /// default, which reports `NotSupported`.
    async fn send_voice(&self, _jid: &Jid, _path: &Path) -> Result<(), ChannelError> {
        Err(ChannelError::NotSupported)
    }

    /// Toggle a typing indicator. Channels without one simply no-op.
    async fn set_typing(&self, _jid: &Jid, _on: bool) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Whether `jid` is this channel's designated administrative chat
    /// (the one where cross-chat tools are permitted). Most channels have
    /// no such notion and default to `false`.
    fn is_main_channel(&self, _jid: &Jid) -> bool {
        false
    }
}

/// The core-facing callback surface a [`Channel`] uses to report inbound
/// activity. Implemented by the router, not by individual channels.
#[async_trait]
pub trait RouterHost: Send + Sync {
    /// A message arrived for `jid`.
    async fn on_message(&self, jid: Jid, message: InboundMessage);

    /// Chat metadata observed independent of any single message (used to
    /// keep display names and last-seen timestamps current).
    async fn on_chat_seen(&self, jid: Jid, timestamp: DateTime<Utc>, display_name: String);
}

/// Decides whether an unregistered chat may be auto-registered, and
/// whether a registered-but-trigger-gated chat's message should be piped
/// through to the agent. Implemented outside this crate (by the component
/// owning the registered-chat table) to avoid a dependency cycle.
pub trait RegistrationPolicy: Send + Sync {
    /// Whether `jid` is permitted to interact with the system at all
    /// (the allow-list check).
    fn is_allowed(&self, jid: &Jid) -> bool;

    /// Look up `jid`'s registration, if any.
    fn lookup(&self, jid: &Jid) -> Option<RegisteredChat>;

    /// Auto-register a previously unseen chat, or return `None` if
    /// registration is declined (e.g. no matching trigger, not the owner).
    fn ensure_registered(
        &self,
        jid: &Jid,
        display_name: &str,
    ) -> Option<RegisteredChat>;

    /// Whether `text` satisfies `chat`'s trigger pattern, if it has one.
    /// Chats with `requires_trigger=false` always pass.
    fn check_trigger(&self, chat: &RegisteredChat, text: &str) -> bool;
}

/// Publishes `message:inbound`/`message:outbound` notifications onto the
/// process-wide event bus. Implemented outside this crate (by whatever
/// owns that bus) to avoid a dependency cycle.
#[async_trait]
pub trait MessageEvents: Send + Sync {
    /// A message was admitted past the registration policy.
    async fn message_inbound(&self, message: &InboundMessage);
    /// A message is about to be sent back out through a channel.
    async fn message_outbound(&self, jid: &Jid, text: &str);
}

/// A [`MessageEvents`] that does nothing, for routers with no bus to wire in.
pub struct NoopMessageEvents;

#[async_trait]
impl MessageEvents for NoopMessageEvents {
    async fn message_inbound(&self, _message: &InboundMessage) {}
    async fn message_outbound(&self, _jid: &Jid, _text: &str) {}
}
