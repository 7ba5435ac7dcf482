//! Chat identifier (JID) type.
//!
//! A JID is an opaque, platform-prefixed string (`discord:<channelId>`,
//! `web:main`) used as the routing key for everything in the system:
//! per-chat queues, registered chats, scheduled tasks, and sessions are
//! all keyed by JID.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NanoclawError;

/// An opaque, platform-prefixed chat identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    /// Parse a raw string into a `Jid`.
    ///
    /// The string must contain at least one `:` separating the channel
    /// prefix from the channel-specific suffix, and the prefix must be
    /// non-empty.
    pub fn parse(raw: impl Into<String>) -> Result<Self, NanoclawError> {
        let raw = raw.into();
        match raw.split_once(':') {
            Some((prefix, _)) if !prefix.is_empty() => Ok(Self(raw)),
            _ => Err(NanoclawError::ConfigInvalid {
                reason: format!("jid '{raw}' has no channel prefix"),
            }),
        }
    }

    /// Build a JID from a known channel name and a suffix, without
    /// re-validating the channel name.
    pub fn new(channel: &str, suffix: &str) -> Self {
        Self(format!("{channel}:{suffix}"))
    }

    /// The channel prefix (the part before the first `:`).
    pub fn channel_prefix(&self) -> &str {
        self.0.split_once(':').map(|(p, _)| p).unwrap_or(&self.0)
    }

    /// The channel-specific suffix (the part after the first `:`).
    pub fn suffix(&self) -> &str {
        self.0.split_once(':').map(|(_, s)| s).unwrap_or("")
    }

    /// The full underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Jid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_prefixed() {
        let jid = Jid::parse("discord:12345").unwrap();
        assert_eq!(jid.channel_prefix(), "discord");
        assert_eq!(jid.suffix(), "12345");
    }

    #[test]
    fn parse_rejects_missing_prefix() {
        assert!(Jid::parse("no-colon-here").is_err());
        assert!(Jid::parse(":suffix-only").is_err());
    }

    #[test]
    fn new_builds_prefixed_string() {
        let jid = Jid::new("web", "main");
        assert_eq!(jid.as_str(), "web:main");
    }

    #[test]
    fn suffix_may_contain_colons() {
        let jid = Jid::parse("discord:guild:channel:123").unwrap();
        assert_eq!(jid.channel_prefix(), "discord");
        assert_eq!(jid.suffix(), "guild:channel:123");
    }

    #[test]
    fn display_round_trips() {
        let jid = Jid::new("web", "main");
        assert_eq!(jid.to_string(), "web:main");
    }
}
