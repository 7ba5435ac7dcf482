//! Inbound / outbound message types exchanged between channels and the core.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jid::Jid;

/// A message received from a chat platform, normalized by the channel router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique id assigned by the originating channel (or generated if absent).
    pub id: String,
    /// Routing key for the chat this message belongs to.
    pub jid: Jid,
    /// Platform-specific sender identifier.
    pub sender_id: String,
    /// Human-readable sender display name.
    pub sender_name: String,
    /// Message text content.
    pub content: String,
    /// When the channel observed the message.
    pub timestamp: DateTime<Utc>,
    /// Whether this message was sent by the host's own bot account.
    #[serde(default)]
    pub is_from_self: bool,
    /// Whether the sender is itself a bot account.
    #[serde(default)]
    pub is_bot: bool,
}

impl InboundMessage {
    /// Folder-independent cache key for this message's originating chat.
    pub fn jid_key(&self) -> String {
        self.jid.as_str().to_string()
    }
}

/// A message to be sent back out through a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Destination chat.
    pub jid: Jid,
    /// Message text.
    pub text: String,
    /// Optional message id this is a reply to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Arbitrary metadata carried alongside the message (job id, tool name, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl OutboundMessage {
    /// Build a plain outbound message with no reply target or metadata.
    pub fn plain(jid: Jid, text: impl Into<String>) -> Self {
        Self {
            jid,
            text: text.into(),
            reply_to: None,
            metadata: HashMap::new(),
        }
    }
}

/// Discriminant used to key event-bus handler registration, independent
/// of payload. Lives alongside [`InboundMessage`]/[`OutboundMessage`]
/// since every [`Event`] payload is built from one of them (or names a
/// jid/task/plugin that a handler may want to cross-reference against
/// them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageInbound,
    MessageOutbound,
    ContainerStart,
    ContainerStop,
    TaskCreated,
    TaskCompleted,
    PluginLoaded,
    PluginUnloaded,
}

/// One occurrence on the event bus. Each variant's payload is fixed at
/// compile time; there is no untyped/dynamic event shape. Declared here,
/// rather than in the core crate that owns the bus itself, so that the
/// plugin crate can depend on it directly instead of depending on the
/// core crate (which itself depends on the plugin crate).
#[derive(Debug, Clone)]
pub enum Event {
    /// A message was admitted by the channel router.
    MessageInbound(InboundMessage),
    /// A message is about to be (or was) sent back out through a channel.
    MessageOutbound(OutboundMessage),
    /// An agent subprocess started for a JID.
    ContainerStart { jid: Jid },
    /// An agent subprocess for a JID exited.
    ContainerStop { jid: Jid },
    /// A scheduled task was created.
    TaskCreated { task_id: String },
    /// A scheduled task run completed (success or failure).
    TaskCompleted { task_id: String },
    /// A plugin finished `onLoad`.
    PluginLoaded { name: String },
    /// A plugin finished `onUnload`.
    PluginUnloaded { name: String },
}

impl Event {
    /// The discriminant used to look up this event's handlers.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::MessageInbound(_) => EventKind::MessageInbound,
            Event::MessageOutbound(_) => EventKind::MessageOutbound,
            Event::ContainerStart { .. } => EventKind::ContainerStart,
            Event::ContainerStop { .. } => EventKind::ContainerStop,
            Event::TaskCreated { .. } => EventKind::TaskCreated,
            Event::TaskCompleted { .. } => EventKind::TaskCompleted,
            Event::PluginLoaded { .. } => EventKind::PluginLoaded,
            Event::PluginUnloaded { .. } => EventKind::PluginUnloaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_matches_variant() {
        let event = Event::TaskCreated { task_id: "t1".into() };
        assert_eq!(event.kind(), EventKind::TaskCreated);
    }

    #[test]
    fn inbound_jid_key_matches_display() {
        let msg = InboundMessage {
            id: "m1".into(),
            jid: Jid::new("discord", "42"),
            sender_id: "u1".into(),
            sender_name: "Alice".into(),
            content: "hi".into(),
            timestamp: Utc::now(),
            is_from_self: false,
            is_bot: false,
        };
        assert_eq!(msg.jid_key(), "discord:42");
    }

    #[test]
    fn outbound_plain_has_no_reply_target() {
        let msg = OutboundMessage::plain(Jid::new("web", "main"), "hello");
        assert!(msg.reply_to.is_none());
        assert_eq!(msg.text, "hello");
    }

    #[test]
    fn inbound_serde_roundtrip() {
        let msg = InboundMessage {
            id: "m2".into(),
            jid: Jid::new("web", "main"),
            sender_id: "owner".into(),
            sender_name: "Owner".into(),
            content: "wait, also...".into(),
            timestamp: Utc::now(),
            is_from_self: false,
            is_bot: false,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let restored: InboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.content, "wait, also...");
        assert_eq!(restored.jid, msg.jid);
    }
}
