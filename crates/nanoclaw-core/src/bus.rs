//! Typed in-process pub/sub with per-handler timeouts (C1).
//!
//! `emit` fans every registered handler for an event's kind out onto its
//! own task and waits for all of them to settle. A handler that errors or
//! times out is logged and otherwise ignored -- it never affects sibling
//! handlers or the emitter.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::event::{Event, EventKind};

/// Id returned by [`EventBus::on`], used to unregister a handler later.
pub type HandlerId = u64;

/// What a handler returns: `Ok(())` on success, or any error to log.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type BoxFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
type HandlerFn = Box<dyn Fn(Event) -> BoxFuture + Send + Sync>;

/// Per-handler timeout applied when none is configured explicitly.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

/// The event bus. Cheaply cloneable via `Arc` if shared across components.
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<(HandlerId, Arc<HandlerFn>)>>>,
    next_id: AtomicU64,
    handler_timeout: Duration,
}

impl EventBus {
    /// A bus with the default 5s per-handler timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_HANDLER_TIMEOUT)
    }

    /// A bus with a custom per-handler timeout.
    pub fn with_timeout(handler_timeout: Duration) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            handler_timeout,
        }
    }

    /// Register a handler for `kind`. Returns an id usable with [`off`](Self::off).
    pub async fn on<F, Fut>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let boxed: HandlerFn = Box::new(move |event| Box::pin(handler(event)));
        self.on_boxed(kind, boxed).await
    }

    /// Register an already-boxed handler for `kind`. The generic [`on`](Self::on)
    /// builds its closure into this same shape and delegates here; this is
    /// also the entry point [`PluginEventBus`] uses, since a trait object
    /// method can't itself be generic over closure type.
    async fn on_boxed(&self, kind: EventKind, handler: HandlerFn) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .await
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Unregister a handler. A no-op if the id is unknown.
    pub async fn off(&self, kind: EventKind, id: HandlerId) {
        if let Some(list) = self.handlers.write().await.get_mut(&kind) {
            list.retain(|(hid, _)| *hid != id);
        }
    }

    /// Number of handlers registered for `kind`.
    pub async fn listener_count(&self, kind: EventKind) -> usize {
        self.handlers.read().await.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Remove every handler for every kind.
    pub async fn clear(&self) {
        self.handlers.write().await.clear();
    }

    /// Fan `event` out to every handler registered for its kind, in
    /// parallel, and wait for all of them to settle or time out.
    /// Completes successfully even with zero listeners.
    pub async fn emit(&self, event: Event) {
        let kind = event.kind();
        let handlers = {
            let guard = self.handlers.read().await;
            guard.get(&kind).cloned().unwrap_or_default()
        };
        if handlers.is_empty() {
            return;
        }

        let mut set: JoinSet<(HandlerId, Result<HandlerResult, tokio::time::error::Elapsed>)> =
            JoinSet::new();
        for (id, handler) in handlers {
            let event = event.clone();
            let timeout = self.handler_timeout;
            set.spawn(async move {
                let result = tokio::time::timeout(timeout, handler(event)).await;
                (id, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(Ok(())))) => {}
                Ok((id, Ok(Err(err)))) => {
                    warn!(handler_id = id, ?kind, error = %err, "event handler failed");
                }
                Ok((id, Err(_elapsed))) => {
                    warn!(handler_id = id, ?kind, "event handler timed out");
                }
                Err(join_err) => {
                    error!(?kind, error = %join_err, "event handler task panicked");
                }
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Lets this bus back a [`nanoclaw_plugin::PluginEventBus`] so it can be
/// handed into a plugin's context without the plugin crate depending on
/// this one.
#[async_trait]
impl nanoclaw_plugin::PluginEventBus for EventBus {
    async fn emit(&self, event: Event) {
        EventBus::emit(self, event).await
    }

    async fn on(&self, kind: EventKind, handler: nanoclaw_plugin::PluginEventHandler) -> HandlerId {
        self.on_boxed(kind, handler).await
    }

    async fn off(&self, kind: EventKind, id: HandlerId) {
        EventBus::off(self, kind, id).await
    }
}

/// Lets this bus back a [`nanoclaw_scheduler::TaskEvents`], so the
/// scheduler can publish `task:created`/`task:completed` without
/// depending on this crate.
#[async_trait]
impl nanoclaw_scheduler::TaskEvents for EventBus {
    async fn task_created(&self, task_id: &str) {
        self.emit(Event::TaskCreated {
            task_id: task_id.to_string(),
        })
        .await;
    }

    async fn task_completed(&self, task_id: &str) {
        self.emit(Event::TaskCompleted {
            task_id: task_id.to_string(),
        })
        .await;
    }
}

/// Lets this bus back a [`nanoclaw_channels::MessageEvents`], so the
/// channel router can publish `message:inbound`/`message:outbound`
/// without depending on this crate.
#[async_trait]
impl nanoclaw_channels::MessageEvents for EventBus {
    async fn message_inbound(&self, message: &nanoclaw_types::InboundMessage) {
        self.emit(Event::MessageInbound(message.clone())).await;
    }

    async fn message_outbound(&self, jid: &nanoclaw_types::Jid, text: &str) {
        self.emit(Event::MessageOutbound(nanoclaw_types::OutboundMessage::plain(
            jid.clone(),
            text,
        )))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;
    use tokio::time::sleep;

    #[tokio::test]
    async fn emit_with_no_listeners_completes() {
        let bus = EventBus::new();
        bus.emit(Event::TaskCreated { task_id: "t1".into() }).await;
    }

    #[tokio::test]
    async fn handlers_for_one_kind_all_fire() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            bus.on(EventKind::TaskCreated, move |_event| {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        }

        bus.emit(Event::TaskCreated { task_id: "t1".into() }).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn handler_error_does_not_affect_siblings() {
        let bus = EventBus::new();
        let ran = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::TaskCreated, |_event| async move {
            Err("boom".into())
        })
        .await;

        let ran_clone = ran.clone();
        bus.on(EventKind::TaskCreated, move |_event| {
            let ran = ran_clone.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        bus.emit(Event::TaskCreated { task_id: "t1".into() }).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_handler_is_timed_out_without_delaying_others() {
        let bus = EventBus::with_timeout(Duration::from_millis(20));
        let fast_ran = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::TaskCreated, |_event| async move {
            sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let fast_clone = fast_ran.clone();
        bus.on(EventKind::TaskCreated, move |_event| {
            let fast_ran = fast_clone.clone();
            async move {
                fast_ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        let started = std::time::Instant::now();
        bus.emit(Event::TaskCreated { task_id: "t1".into() }).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(fast_ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn off_removes_handler() {
        let bus = EventBus::new();
        let ran = Arc::new(StdMutex::new(0));
        let ran_clone = ran.clone();
        let id = bus
            .on(EventKind::PluginLoaded, move |_event| {
                let ran = ran_clone.clone();
                async move {
                    *ran.lock().unwrap() += 1;
                    Ok(())
                }
            })
            .await;

        bus.off(EventKind::PluginLoaded, id).await;
        bus.emit(Event::PluginLoaded { name: "p1".into() }).await;
        assert_eq!(*ran.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn listener_count_and_clear() {
        let bus = EventBus::new();
        bus.on(EventKind::PluginLoaded, |_event| async move { Ok(()) }).await;
        bus.on(EventKind::PluginLoaded, |_event| async move { Ok(()) }).await;
        assert_eq!(bus.listener_count(EventKind::PluginLoaded).await, 2);

        bus.clear().await;
        assert_eq!(bus.listener_count(EventKind::PluginLoaded).await, 0);
    }
}
