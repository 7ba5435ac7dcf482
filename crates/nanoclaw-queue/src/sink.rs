//! The channel-facing delivery points for agent output and inbound turns.

use async_trait::async_trait;
use nanoclaw_types::Jid;

/// Delivers an outbound message produced by a running agent to whatever
/// channel owns the chat. Implemented by the channel router.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    /// Deliver `text` to `jid`.
    async fn deliver(&self, jid: &Jid, text: &str);
}

/// Accepts an inbound turn for a JID's queue. A trait (rather than a
/// direct [`crate::QueueManager`] reference) so the channel router can
/// hold one without depending on a concrete `FileSystem` type parameter.
#[async_trait]
pub trait InboundSink: Send + Sync {
    /// Enqueue `text` as an interactive turn for `jid`.
    async fn enqueue(&self, jid: Jid, text: String);
}

/// An [`OutboundSink`] that records every delivery in memory, for tests.
#[cfg(test)]
pub struct RecordingSink {
    sent: tokio::sync::Mutex<Vec<(Jid, String)>>,
}

#[cfg(test)]
impl RecordingSink {
    /// An empty recording sink.
    pub fn new() -> Self {
        Self {
            sent: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// All `(jid, text)` pairs delivered so far, in delivery order.
    pub async fn sent(&self) -> Vec<(Jid, String)> {
        self.sent.lock().await.clone()
    }
}

#[cfg(test)]
impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[async_trait]
impl OutboundSink for RecordingSink {
    async fn deliver(&self, jid: &Jid, text: &str) {
        self.sent.lock().await.push((jid.clone(), text.to_string()));
    }
}
