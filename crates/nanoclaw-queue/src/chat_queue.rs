//! The per-JID queue actor: strict FIFO within a chat, full parallelism
//! across chats, and the live interrupt/augment pattern (C5).

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use nanoclaw_agent::{AgentRunner, RunningAgent, DEFAULT_KILL_GRACE};
use nanoclaw_ipc::{IpcMessage, IpcTransport};
use nanoclaw_platform::FileSystem;
use nanoclaw_types::Jid;

use crate::item::{TaskOutcome, WorkItem};
use crate::sink::OutboundSink;

/// Default idle timeout for interactive turns before the queue closes
/// the agent's stdin gracefully.
pub const DEFAULT_INTERACTIVE_IDLE: Duration = Duration::from_secs(5 * 60);

/// Default idle timeout for scheduled task runs.
pub const DEFAULT_TASK_IDLE: Duration = Duration::from_secs(10 * 60);

enum Command {
    Enqueue(WorkItem),
    CloseStdin,
    Kill,
}

/// A handle to a running chat queue actor. Cloning shares the same
/// underlying actor.
#[derive(Clone)]
pub struct ChatQueueHandle {
    jid: Jid,
    tx: mpsc::Sender<Command>,
}

impl ChatQueueHandle {
    /// Enqueue an interactive inbound turn.
    pub async fn enqueue_message(&self, produce_text: impl FnOnce() -> String + Send + 'static) {
        let _ = self
            .tx
            .send(Command::Enqueue(WorkItem::Message {
                produce_text: Box::new(produce_text),
            }))
            .await;
    }

    /// Enqueue a scheduled task run.
    pub async fn enqueue_task(
        &self,
        task_id: impl Into<String>,
        produce_config: impl FnOnce() -> nanoclaw_agent::AgentConfig + Send + 'static,
        on_complete: impl FnOnce(TaskOutcome) + Send + 'static,
    ) {
        let _ = self
            .tx
            .send(Command::Enqueue(WorkItem::Task {
                task_id: task_id.into(),
                produce_config: Box::new(produce_config),
                on_complete: Box::new(on_complete),
            }))
            .await;
    }

    /// Request a graceful idle close of the current agent, if any.
    pub async fn close_stdin(&self) {
        let _ = self.tx.send(Command::CloseStdin).await;
    }

    /// Hard-abort the current agent and drop all queued work.
    pub async fn kill(&self) {
        let _ = self.tx.send(Command::Kill).await;
    }

    /// The JID this queue serves.
    pub fn jid(&self) -> &Jid {
        &self.jid
    }
}

/// Configuration shared by every chat queue spawned from one manager.
pub struct ChatQueueConfig<F: FileSystem> {
    /// Spawns agent subprocesses.
    pub agent_runner: Arc<AgentRunner>,
    /// Filesystem used by the IPC transport.
    pub fs: Arc<F>,
    /// Delivers streamed agent output to the owning channel.
    pub outbound: Arc<dyn OutboundSink>,
    /// Idle timeout for interactive turns.
    pub interactive_idle: Duration,
    /// Idle timeout for scheduled task runs.
    pub task_idle: Duration,
}

/// Spawn the actor task for one chat and return a handle to it.
///
/// `working_dir` is the agent's process working directory; `ipc_root` is
/// the directory the agent polls for inbound IPC files (its inbox).
pub fn spawn_chat_queue<F: FileSystem + 'static>(
    jid: Jid,
    working_dir: PathBuf,
    ipc_root: PathBuf,
    config: Arc<ChatQueueConfig<F>>,
) -> ChatQueueHandle {
    let (tx, rx) = mpsc::channel(64);
    let handle = ChatQueueHandle {
        jid: jid.clone(),
        tx,
    };
    tokio::spawn(run(jid, working_dir, ipc_root, config, rx));
    handle
}

enum RunKind {
    Interactive,
    Task {
        task_id: String,
        on_complete: crate::item::OnTaskComplete,
    },
}

async fn run<F: FileSystem + 'static>(
    jid: Jid,
    working_dir: PathBuf,
    ipc_root: PathBuf,
    config: Arc<ChatQueueConfig<F>>,
    mut rx: mpsc::Receiver<Command>,
) {
    let transport = IpcTransport::new(ipc_root, config.fs.clone());
    let mut current: Option<(RunningAgent, RunKind)> = None;
    let mut pending_tasks: VecDeque<WorkItem> = VecDeque::new();
    let mut idle_deadline: Option<Instant> = None;

    loop {
        let frame_fut = async {
            match &mut current {
                Some((agent, _)) => agent.next_frame().await,
                None => std::future::pending().await,
            }
        };
        let idle_fut = async {
            match idle_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            maybe_cmd = rx.recv() => {
                let Some(cmd) = maybe_cmd else {
                    debug!(jid = %jid, "chat queue handle dropped, shutting down");
                    break;
                };
                match cmd {
                    Command::Enqueue(item) => {
                        handle_enqueue(
                            &jid, &working_dir, &transport, &config,
                            &mut current, &mut pending_tasks, &mut idle_deadline, item,
                        ).await;
                    }
                    Command::CloseStdin => {
                        if current.is_some() {
                            if let Err(e) = transport.write_close_sentinel().await {
                                warn!(jid = %jid, error = %e, "failed to write close sentinel");
                            }
                        }
                    }
                    Command::Kill => {
                        if let Some((mut agent, kind)) = current.take() {
                            let _ = transport.write_close_sentinel().await;
                            let _ = agent.wait_or_kill(DEFAULT_KILL_GRACE).await;
                            complete_kind(kind, false, Some("killed".into()));
                        }
                        idle_deadline = None;
                        let mut dropped = 0;
                        while let Ok(cmd) = rx.try_recv() {
                            if let Command::Enqueue(WorkItem::Task { on_complete, task_id, .. }) = cmd {
                                on_complete(TaskOutcome {
                                    task_id,
                                    succeeded: false,
                                    error: Some("cancelled".into()),
                                });
                            }
                            dropped += 1;
                        }
                        for item in pending_tasks.drain(..) {
                            if let WorkItem::Task { on_complete, task_id, .. } = item {
                                on_complete(TaskOutcome {
                                    task_id,
                                    succeeded: false,
                                    error: Some("cancelled".into()),
                                });
                            }
                        }
                        if dropped > 0 {
                            info!(jid = %jid, dropped, "dropped queued work on kill");
                        }
                    }
                }
            }
            frame = frame_fut => {
                match frame {
                    Some(Ok(output)) => {
                        if let Some(text) = output.outbound_text() {
                            config.outbound.deliver(&jid, text).await;
                        }
                        idle_deadline = Some(Instant::now() + idle_timeout_for(&current, &config));
                        if output.is_error() {
                            warn!(jid = %jid, "agent reported terminal error frame");
                        }
                    }
                    Some(Err(e)) => {
                        warn!(jid = %jid, error = %e, "error reading agent frame");
                    }
                    None => {
                        if let Some((mut agent, kind)) = current.take() {
                            let status = agent.wait().await.ok();
                            let succeeded = status.map(|s| s.success()).unwrap_or(false);
                            complete_kind(kind, succeeded, (!succeeded).then(|| "agent exited non-zero".into()));
                        }
                        idle_deadline = None;
                        if let Some(next) = pending_tasks.pop_front() {
                            handle_enqueue(
                                &jid, &working_dir, &transport, &config,
                                &mut current, &mut pending_tasks, &mut idle_deadline, next,
                            ).await;
                        }
                    }
                }
            }
            _ = idle_fut => {
                debug!(jid = %jid, "idle timeout elapsed, requesting graceful close");
                if let Err(e) = transport.write_close_sentinel().await {
                    warn!(jid = %jid, error = %e, "failed to write close sentinel on idle");
                }
                idle_deadline = None;
            }
        }
    }
}

fn complete_kind(kind: RunKind, succeeded: bool, error: Option<String>) {
    if let RunKind::Task { task_id, on_complete } = kind {
        on_complete(TaskOutcome {
            task_id,
            succeeded,
            error,
        });
    }
}

fn idle_timeout_for<F: FileSystem>(
    current: &Option<(RunningAgent, RunKind)>,
    config: &ChatQueueConfig<F>,
) -> Duration {
    match current {
        Some((_, RunKind::Task { .. })) => config.task_idle,
        _ => config.interactive_idle,
    }
}

async fn handle_enqueue<F: FileSystem + 'static>(
    jid: &Jid,
    working_dir: &PathBuf,
    transport: &IpcTransport<F>,
    config: &Arc<ChatQueueConfig<F>>,
    current: &mut Option<(RunningAgent, RunKind)>,
    pending_tasks: &mut VecDeque<WorkItem>,
    idle_deadline: &mut Option<Instant>,
    item: WorkItem,
) {
    match item {
        WorkItem::Message { produce_text } => {
            let text = produce_text();
            if current.is_some() {
                if let Err(e) = transport
                    .write(&IpcMessage::Message {
                        chat_jid: jid.as_str().to_string(),
                        text,
                        sender: None,
                        group_folder: working_dir
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        timestamp: chrono::Utc::now(),
                    })
                    .await
                {
                    warn!(jid = %jid, error = %e, "failed to pipe interrupt message into running agent");
                }
            } else {
                let agent_config = nanoclaw_agent::AgentConfig::interactive(
                    text,
                    working_dir
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    jid.as_str(),
                    false,
                );
                match config.agent_runner.spawn(working_dir, &agent_config).await {
                    Ok(agent) => {
                        *current = Some((agent, RunKind::Interactive));
                        *idle_deadline = Some(Instant::now() + config.interactive_idle);
                    }
                    Err(e) => {
                        warn!(jid = %jid, error = %e, "failed to spawn agent for interactive turn");
                    }
                }
            }
        }
        WorkItem::Task {
            task_id,
            produce_config,
            on_complete,
        } => {
            if current.is_some() {
                pending_tasks.push_back(WorkItem::Task {
                    task_id,
                    produce_config,
                    on_complete,
                });
                return;
            }
            let agent_config = produce_config();
            match config.agent_runner.spawn(working_dir, &agent_config).await {
                Ok(agent) => {
                    *current = Some((
                        agent,
                        RunKind::Task {
                            task_id,
                            on_complete,
                        },
                    ));
                    *idle_deadline = Some(Instant::now() + config.task_idle);
                }
                Err(e) => {
                    warn!(jid = %jid, task_id = %task_id, error = %e, "failed to spawn agent for task run");
                    on_complete(TaskOutcome {
                        task_id,
                        succeeded: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanoclaw_agent::AgentRunner;
    use nanoclaw_platform::NativeFileSystem;
    use std::sync::Mutex as StdMutex;

    fn shell_script(dir: &std::path::Path, body: &str) -> PathBuf {
        let script_path = dir.join("agent.sh");
        std::fs::write(&script_path, body).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
                .unwrap();
        }
        script_path
    }

    #[tokio::test]
    async fn interactive_message_spawns_and_delivers_output() {
        let chat_dir = tempfile::tempdir().unwrap();
        let ipc_dir = tempfile::tempdir().unwrap();
        let script = shell_script(
            chat_dir.path(),
            "#!/bin/sh\ncat >/dev/null\necho '---NANOCLAW_OUTPUT_START---'\necho '{\"status\":\"success\",\"result\":\"reply\"}'\necho '---NANOCLAW_OUTPUT_END---'\n",
        );

        let sink = Arc::new(crate::sink::RecordingSink::new());
        let config = Arc::new(ChatQueueConfig {
            agent_runner: Arc::new(AgentRunner::new(
                "/bin/sh",
                vec![script.to_string_lossy().to_string()],
            )),
            fs: Arc::new(NativeFileSystem),
            outbound: sink.clone(),
            interactive_idle: Duration::from_secs(30),
            task_idle: Duration::from_secs(30),
        });

        let jid = Jid::new("discord", "1");
        let handle = spawn_chat_queue(
            jid.clone(),
            chat_dir.path().to_path_buf(),
            ipc_dir.path().to_path_buf(),
            config,
        );

        handle.enqueue_message(|| "hello".to_string()).await;

        for _ in 0..50 {
            if !sink.sent().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let sent = sink.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "reply");
    }

    #[tokio::test]
    async fn task_completion_callback_reports_success() {
        let chat_dir = tempfile::tempdir().unwrap();
        let ipc_dir = tempfile::tempdir().unwrap();
        let script = shell_script(
            chat_dir.path(),
            "#!/bin/sh\ncat >/dev/null\necho '---NANOCLAW_OUTPUT_START---'\necho '{\"status\":\"success\",\"result\":\"done\"}'\necho '---NANOCLAW_OUTPUT_END---'\n",
        );

        let sink = Arc::new(crate::sink::RecordingSink::new());
        let config = Arc::new(ChatQueueConfig {
            agent_runner: Arc::new(AgentRunner::new(
                "/bin/sh",
                vec![script.to_string_lossy().to_string()],
            )),
            fs: Arc::new(NativeFileSystem),
            outbound: sink,
            interactive_idle: Duration::from_secs(30),
            task_idle: Duration::from_secs(30),
        });

        let jid = Jid::new("discord", "1");
        let handle = spawn_chat_queue(
            jid,
            chat_dir.path().to_path_buf(),
            ipc_dir.path().to_path_buf(),
            config,
        );

        let outcome: Arc<StdMutex<Option<TaskOutcome>>> = Arc::new(StdMutex::new(None));
        let outcome_clone = outcome.clone();
        handle
            .enqueue_task(
                "task-1",
                || {
                    nanoclaw_agent::AgentConfig::interactive("run it", "owner-dm", "discord:1", true)
                        .as_scheduled_task()
                },
                move |result| {
                    *outcome_clone.lock().unwrap() = Some(result);
                },
            )
            .await;

        for _ in 0..50 {
            if outcome.lock().unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let result = outcome.lock().unwrap().take().unwrap();
        assert_eq!(result.task_id, "task-1");
        assert!(result.succeeded);
    }
}
