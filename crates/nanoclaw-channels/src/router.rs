//! [`ChannelRouter`] -- normalizes inbound events, applies the
//! registration/allow-list policy, and dispatches outbound messages to the
//! channel instance that owns each JID.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nanoclaw_queue::{InboundSink, OutboundSink};
use nanoclaw_types::{InboundMessage, Jid};

use crate::error::RouterError;
use crate::traits::{Channel, MessageEvents, NoopMessageEvents, RegistrationPolicy, RouterHost};

struct ChannelTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns every registered [`Channel`] instance, supervises one task per
/// channel, and is the single point both directions of traffic pass
/// through: inbound events arrive via [`RouterHost`], outbound deliveries
/// leave via [`OutboundSink`].
pub struct ChannelRouter {
    channels: RwLock<HashMap<String, Arc<dyn Channel>>>,
    tasks: RwLock<HashMap<String, ChannelTask>>,
    policy: Arc<dyn RegistrationPolicy>,
    inbound: Arc<dyn InboundSink>,
    events: Arc<dyn MessageEvents>,
}

impl ChannelRouter {
    /// Build an empty router with no event-bus wiring. Channels are added
    /// with [`register_channel`] before calling [`start_all`].
    pub fn new(policy: Arc<dyn RegistrationPolicy>, inbound: Arc<dyn InboundSink>) -> Arc<Self> {
        Self::with_events(policy, inbound, Arc::new(NoopMessageEvents))
    }

    /// Build an empty router that publishes `message:inbound`/
    /// `message:outbound` onto `events`.
    pub fn with_events(
        policy: Arc<dyn RegistrationPolicy>,
        inbound: Arc<dyn InboundSink>,
        events: Arc<dyn MessageEvents>,
    ) -> Arc<Self> {
        Arc::new(Self {
            channels: RwLock::new(HashMap::new()),
            tasks: RwLock::new(HashMap::new()),
            policy,
            inbound,
            events,
        })
    }

    /// Register a channel instance. It is not started until [`start_all`]
    /// or [`start_channel`] is called.
    pub async fn register_channel(&self, channel: Arc<dyn Channel>) -> Result<(), RouterError> {
        let name = channel.name().to_string();
        let mut channels = self.channels.write().await;
        if channels.contains_key(&name) {
            return Err(RouterError::DuplicateChannel { name });
        }
        channels.insert(name, channel);
        Ok(())
    }

    /// Start every registered channel that isn't already running.
    pub async fn start_all(self: &Arc<Self>) {
        let names: Vec<String> = self.channels.read().await.keys().cloned().collect();
        for name in names {
            if let Err(err) = self.start_channel(&name).await {
                error!(channel = %name, error = %err, "channel failed to start");
            }
        }
    }

    /// Start a single registered channel in its own supervised task.
    pub async fn start_channel(self: &Arc<Self>, name: &str) -> Result<(), RouterError> {
        if self.tasks.read().await.contains_key(name) {
            return Ok(());
        }
        let channel = self
            .channels
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RouterError::ChannelStartFailed {
                name: name.to_string(),
                reason: "not registered".into(),
            })?;

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let host: Arc<dyn RouterHost> = self.clone();
        let channel_name = name.to_string();
        let handle = tokio::spawn(async move {
            info!(channel = %channel_name, "starting channel");
            if let Err(err) = channel.connect(host, task_cancel).await {
                error!(channel = %channel_name, error = %err, "channel exited with error");
            } else {
                info!(channel = %channel_name, "channel stopped");
            }
        });

        self.tasks
            .write()
            .await
            .insert(name.to_string(), ChannelTask { cancel, handle });
        Ok(())
    }

    /// Cancel and await every running channel task, then call `disconnect`
    /// on each underlying channel.
    pub async fn stop_all(&self) {
        let names: Vec<String> = self.tasks.read().await.keys().cloned().collect();
        for name in names {
            self.stop_channel(&name).await;
        }
    }

    async fn stop_channel(&self, name: &str) {
        let task = self.tasks.write().await.remove(name);
        let Some(task) = task else { return };
        task.cancel.cancel();
        if let Err(err) = task.handle.await {
            warn!(channel = %name, error = %err, "channel task panicked");
        }
        if let Some(channel) = self.channels.read().await.get(name).cloned() {
            if let Err(err) = channel.disconnect().await {
                warn!(channel = %name, error = %err, "channel disconnect failed");
            }
        }
    }

}

#[async_trait]
impl OutboundSink for ChannelRouter {
    async fn deliver(&self, jid: &Jid, text: &str) {
        let channels = self.channels.read().await;
        let channel = match channels.get(jid.channel_prefix()) {
            Some(channel) => channel.clone(),
            None => {
                error!(%jid, prefix = jid.channel_prefix(), "dropping outbound message: unknown channel prefix");
                return;
            }
        };
        drop(channels);
        self.events.message_outbound(jid, text).await;
        if let Err(err) = channel.send_message(jid, text).await {
            error!(%jid, error = %err, "outbound delivery failed");
        }
    }
}

#[async_trait]
impl RouterHost for ChannelRouter {
    async fn on_message(&self, jid: Jid, message: InboundMessage) {
        if !self.policy.is_allowed(&jid) {
            debug!(%jid, "dropping message from disallowed jid");
            return;
        }

        let chat = match self.policy.lookup(&jid) {
            Some(chat) => chat,
            None => match self.policy.ensure_registered(&jid, &message.sender_name) {
                Some(chat) => chat,
                None => {
                    debug!(%jid, "declined to auto-register chat");
                    return;
                }
            },
        };

        if chat.requires_trigger && !self.policy.check_trigger(&chat, &message.content) {
            debug!(%jid, "message did not match trigger pattern");
            return;
        }

        self.events.message_inbound(&message).await;
        self.inbound.enqueue(jid, message.content).await;
    }

    async fn on_chat_seen(&self, jid: Jid, _timestamp: DateTime<Utc>, display_name: String) {
        if !self.policy.is_allowed(&jid) {
            return;
        }
        if self.policy.lookup(&jid).is_none() {
            self.policy.ensure_registered(&jid, &display_name);
        }
    }
}

impl std::fmt::Debug for ChannelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRouter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    use nanoclaw_types::RegisteredChat;

    use crate::error::ChannelError;

    struct AllowAllPolicy {
        registered: StdMutex<HashMap<Jid, RegisteredChat>>,
    }

    impl AllowAllPolicy {
        fn new() -> Self {
            Self {
                registered: StdMutex::new(HashMap::new()),
            }
        }
    }

    impl RegistrationPolicy for AllowAllPolicy {
        fn is_allowed(&self, _jid: &Jid) -> bool {
            true
        }

        fn lookup(&self, jid: &Jid) -> Option<RegisteredChat> {
            self.registered.lock().unwrap().get(jid).cloned()
        }

        fn ensure_registered(&self, jid: &Jid, display_name: &str) -> Option<RegisteredChat> {
            let chat = RegisteredChat::new(jid.clone(), display_name, jid.suffix());
            self.registered
                .lock()
                .unwrap()
                .insert(jid.clone(), chat.clone());
            Some(chat)
        }

        fn check_trigger(&self, _chat: &RegisteredChat, _text: &str) -> bool {
            true
        }
    }

    struct RecordingInbound {
        received: StdMutex<Vec<(Jid, String)>>,
    }

    impl RecordingInbound {
        fn new() -> Self {
            Self {
                received: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InboundSink for RecordingInbound {
        async fn enqueue(&self, jid: Jid, text: String) {
            self.received.lock().unwrap().push((jid, text));
        }
    }

    struct StubChannel {
        channel_name: String,
        sent: StdMutex<Vec<(Jid, String)>>,
        connected: AtomicBool,
    }

    impl StubChannel {
        fn new(name: &str) -> Self {
            Self {
                channel_name: name.to_string(),
                sent: StdMutex::new(Vec::new()),
                connected: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Channel for StubChannel {
        fn name(&self) -> &str {
            &self.channel_name
        }

        async fn connect(
            &self,
            _host: Arc<dyn RouterHost>,
            cancel: CancellationToken,
        ) -> Result<(), ChannelError> {
            self.connected.store(true, Ordering::SeqCst);
            cancel.cancelled().await;
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), ChannelError> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn owns_jid(&self, jid: &Jid) -> bool {
            jid.channel_prefix() == self.channel_name
        }

        async fn send_message(&self, jid: &Jid, text: &str) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push((jid.clone(), text.to_string()));
            Ok(())
        }
    }

    fn sample_message(jid: &Jid, content: &str) -> InboundMessage {
        InboundMessage {
            id: "m1".into(),
            jid: jid.clone(),
            sender_id: "u1".into(),
            sender_name: "Alice".into(),
            content: content.into(),
            timestamp: Utc::now(),
            is_from_self: false,
            is_bot: false,
        }
    }

    #[tokio::test]
    async fn on_message_auto_registers_and_forwards() {
        let policy = Arc::new(AllowAllPolicy::new());
        let inbound = Arc::new(RecordingInbound::new());
        let router = ChannelRouter::new(policy, inbound.clone());

        let jid = Jid::new("web", "main");
        router.on_message(jid.clone(), sample_message(&jid, "hello")).await;

        let received = inbound.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], (jid, "hello".to_string()));
    }

    #[tokio::test]
    async fn deliver_routes_to_matching_channel() {
        let policy = Arc::new(AllowAllPolicy::new());
        let inbound = Arc::new(RecordingInbound::new());
        let router = ChannelRouter::new(policy, inbound);

        let channel = Arc::new(StubChannel::new("web"));
        router.register_channel(channel.clone()).await.unwrap();

        let jid = Jid::new("web", "main");
        router.deliver(&jid, "pong").await;

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[(jid, "pong".to_string())]);
    }

    #[tokio::test]
    async fn deliver_drops_unknown_prefix_without_panic() {
        let policy = Arc::new(AllowAllPolicy::new());
        let inbound = Arc::new(RecordingInbound::new());
        let router = ChannelRouter::new(policy, inbound);

        let jid = Jid::new("ghost", "1");
        router.deliver(&jid, "nobody home").await;
    }

    #[tokio::test]
    async fn register_channel_rejects_duplicate_name() {
        let policy = Arc::new(AllowAllPolicy::new());
        let inbound = Arc::new(RecordingInbound::new());
        let router = ChannelRouter::new(policy, inbound);

        router
            .register_channel(Arc::new(StubChannel::new("web")))
            .await
            .unwrap();
        let result = router.register_channel(Arc::new(StubChannel::new("web"))).await;
        assert!(matches!(result, Err(RouterError::DuplicateChannel { .. })));
    }

    #[tokio::test]
    async fn start_and_stop_channel_round_trips() {
        let policy = Arc::new(AllowAllPolicy::new());
        let inbound = Arc::new(RecordingInbound::new());
        let router = ChannelRouter::new(policy, inbound);

        let channel = Arc::new(StubChannel::new("web"));
        router.register_channel(channel.clone()).await.unwrap();
        router.start_channel("web").await.unwrap();

        tokio::task::yield_now().await;
        assert!(channel.connected.load(Ordering::SeqCst));

        router.stop_all().await;
        assert!(!channel.connected.load(Ordering::SeqCst));
    }
}
