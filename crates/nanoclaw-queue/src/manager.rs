//! Owns one [`ChatQueueHandle`] per JID, creating it lazily on first use.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use nanoclaw_platform::FileSystem;
use nanoclaw_types::Jid;

use crate::chat_queue::{spawn_chat_queue, ChatQueueConfig, ChatQueueHandle};
use crate::item::TaskOutcome;
use crate::sink::InboundSink;

/// Resolves the on-disk layout for a JID's agent process and IPC inbox.
pub trait ChatPaths: Send + Sync {
    /// The agent's process working directory for this chat.
    fn working_dir(&self, jid: &Jid) -> PathBuf;
    /// The directory the agent polls for inbound IPC files.
    fn ipc_root(&self, jid: &Jid) -> PathBuf;
}

/// The primitive per-chat-queue operations (`enqueueMessage`,
/// `enqueueTask`, `closeStdin`, `kill`), fanned out over every JID.
pub struct QueueManager<F: FileSystem> {
    config: Arc<ChatQueueConfig<F>>,
    paths: Arc<dyn ChatPaths>,
    queues: Mutex<HashMap<Jid, ChatQueueHandle>>,
}

impl<F: FileSystem + 'static> QueueManager<F> {
    /// Build a manager that spawns every chat's actor from the same
    /// shared configuration.
    pub fn new(config: Arc<ChatQueueConfig<F>>, paths: Arc<dyn ChatPaths>) -> Self {
        Self {
            config,
            paths,
            queues: Mutex::new(HashMap::new()),
        }
    }

    async fn handle_for(&self, jid: &Jid) -> ChatQueueHandle {
        let mut queues = self.queues.lock().await;
        if let Some(handle) = queues.get(jid) {
            return handle.clone();
        }
        debug!(jid = %jid, "spawning chat queue");
        let handle = spawn_chat_queue(
            jid.clone(),
            self.paths.working_dir(jid),
            self.paths.ipc_root(jid),
            self.config.clone(),
        );
        queues.insert(jid.clone(), handle.clone());
        handle
    }

    /// `enqueueMessage(jid, produceText)`.
    pub async fn enqueue_message(
        &self,
        jid: &Jid,
        produce_text: impl FnOnce() -> String + Send + 'static,
    ) {
        self.handle_for(jid).await.enqueue_message(produce_text).await;
    }

    /// `enqueueTask(jid, taskId, runTask)`.
    pub async fn enqueue_task(
        &self,
        jid: &Jid,
        task_id: impl Into<String>,
        produce_config: impl FnOnce() -> nanoclaw_agent::AgentConfig + Send + 'static,
        on_complete: impl FnOnce(TaskOutcome) + Send + 'static,
    ) {
        self.handle_for(jid)
            .await
            .enqueue_task(task_id, produce_config, on_complete)
            .await;
    }

    /// `closeStdin(jid)`. A no-op if the chat has no active queue.
    pub async fn close_stdin(&self, jid: &Jid) {
        if let Some(handle) = self.queues.lock().await.get(jid).cloned() {
            handle.close_stdin().await;
        }
    }

    /// `kill(jid)`. A no-op if the chat has no active queue.
    pub async fn kill(&self, jid: &Jid) {
        if let Some(handle) = self.queues.lock().await.get(jid).cloned() {
            handle.kill().await;
        }
    }

    /// JIDs with a currently spawned queue actor (not necessarily a
    /// running agent process).
    pub async fn active_jids(&self) -> Vec<Jid> {
        self.queues.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl<F: FileSystem + 'static> InboundSink for QueueManager<F> {
    async fn enqueue(&self, jid: Jid, text: String) {
        self.enqueue_message(&jid, move || text).await;
    }
}
