//! Due-scan loop and run procedure for scheduled tasks (C7).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use nanoclaw_agent::AgentConfig;
use nanoclaw_platform::FileSystem;
use nanoclaw_queue::{ChatPaths, OutboundSink, QueueManager, TaskOutcome};
use nanoclaw_types::{ContextMode, Jid, ScheduleKind, ScheduleValue, ScheduledTask, TaskStatus};

use crate::diagnosis::{diagnose, Diagnosis};
use crate::error::{Result, SchedulerError};
use crate::next_run::compute_next_run;
use crate::retry::backoff_for;
use crate::store::TaskStore;

/// Default interval between due-task scans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How many of a task's most recent run-log errors the diagnoser
/// considers when deciding `persistent` vs `transient`.
const DIAGNOSIS_WINDOW: usize = 2;

/// Resolves whether a task's target chat is still a registered group.
/// Implemented by whatever owns the registered-chat table (outside this
/// crate, to avoid a dependency cycle).
pub trait GroupResolver: Send + Sync {
    /// `true` if `folder` still names a registered chat.
    fn folder_exists(&self, folder: &str) -> bool;
}

/// Looks up a folder's current agent session id, for `contextMode=group`
/// task runs that should reuse the folder's ongoing conversation rather
/// than start a fresh one. Implemented by whatever owns the session
/// table (outside this crate, to avoid a dependency cycle); the single
/// writer is the interactive queue, so this trait is read-only.
pub trait SessionResolver: Send + Sync {
    /// The folder's current resumable session id, if one has been
    /// assigned yet.
    fn session_id_for(&self, folder: &str) -> Option<String>;
}

/// Publishes task lifecycle notifications onto the process-wide event
/// bus. Implemented by whatever owns that bus (outside this crate, to
/// avoid a dependency cycle).
#[async_trait::async_trait]
pub trait TaskEvents: Send + Sync {
    /// A task was just registered.
    async fn task_created(&self, task_id: &str);
    /// A task run just finished, successfully or not.
    async fn task_completed(&self, task_id: &str);
}

/// A [`TaskEvents`] that does nothing, for configs with no bus to wire in.
pub struct NoopTaskEvents;

#[async_trait::async_trait]
impl TaskEvents for NoopTaskEvents {
    async fn task_created(&self, _task_id: &str) {}
    async fn task_completed(&self, _task_id: &str) {}
}

/// Shared configuration for a [`SchedulerEngine`].
pub struct SchedulerConfig<F: FileSystem> {
    /// Per-chat queues the scheduler submits runs through.
    pub queue: Arc<QueueManager<F>>,
    /// Resolves whether a task's chat is still registered.
    pub resolver: Arc<dyn GroupResolver>,
    /// Resolves a folder's current session id for `contextMode=group` runs.
    pub sessions: Arc<dyn SessionResolver>,
    /// Sends the engine's own notifications (paused/completed/error),
    /// independent of whatever the agent itself streams back.
    pub notify: Arc<dyn OutboundSink>,
    /// Where task run-log entries are appended.
    pub run_log_path: PathBuf,
    /// How often the due-scan loop checks for work.
    pub poll_interval: Duration,
    /// Resolves a chat's IPC root, so the engine can drop a task-set
    /// snapshot where the about-to-run agent's `list_tasks` tool expects
    /// to find it.
    pub paths: Arc<dyn ChatPaths>,
    /// The filesystem the snapshot is written through.
    pub fs: Arc<F>,
    /// Publishes `task:created`/`task:completed` notifications.
    pub events: Arc<dyn TaskEvents>,
}

/// Owns the task set and drives its lifecycle: due-scanning, running,
/// diagnosing failures, and scheduling retries.
pub struct SchedulerEngine<F: FileSystem> {
    store: TaskStore,
    tasks: RwLock<HashMap<String, ScheduledTask>>,
    config: SchedulerConfig<F>,
}

impl<F: FileSystem + 'static> SchedulerEngine<F> {
    /// Load the persisted task set from `store_path` and build the engine.
    pub async fn new(store_path: PathBuf, config: SchedulerConfig<F>) -> Result<Arc<Self>> {
        let store = TaskStore::new(store_path);
        let tasks = store.load_tasks().await?;
        Ok(Arc::new(Self {
            store,
            tasks: RwLock::new(tasks),
            config,
        }))
    }

    /// Register a new task and persist it.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_task(
        self: &Arc<Self>,
        folder: String,
        jid: Jid,
        prompt: String,
        schedule_kind: ScheduleKind,
        schedule_value: ScheduleValue,
        context_mode: ContextMode,
        max_retries: u32,
    ) -> Result<String> {
        let now = Utc::now();
        let next_run = match schedule_kind {
            ScheduleKind::Once => match &schedule_value {
                ScheduleValue::At(at) => Some(*at),
                _ => Some(now),
            },
            _ => compute_next_run(schedule_kind, &schedule_value, now)?,
        };

        let task = ScheduledTask {
            id: format!("task-{}", Uuid::new_v4()),
            folder,
            jid,
            prompt,
            schedule_kind,
            schedule_value,
            context_mode,
            status: TaskStatus::Active,
            next_run,
            last_run: None,
            last_result: None,
            last_error: None,
            retry_count: 0,
            max_retries,
            created_at: now,
        };

        self.store.append_create(&task).await?;
        let id = task.id.clone();
        self.tasks.write().await.insert(id.clone(), task);
        info!(task_id = %id, "scheduled task added");
        self.config.events.task_created(&id).await;
        Ok(id)
    }

    /// All tasks, for CLI/dashboard listing.
    pub async fn list_tasks(&self) -> Vec<ScheduledTask> {
        self.tasks.read().await.values().cloned().collect()
    }

    /// Suspend a task so the due-scan loop skips it.
    pub async fn pause_task(&self, task_id: &str) -> Result<()> {
        self.set_status(task_id, TaskStatus::Paused).await
    }

    /// Resume a paused task.
    pub async fn resume_task(&self, task_id: &str) -> Result<()> {
        self.set_status(task_id, TaskStatus::Active).await
    }

    /// Idempotently remove a task. A non-existent id is a no-op.
    pub async fn cancel_task(&self, task_id: &str) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(task_id).is_none() {
            return Ok(());
        }
        drop(tasks);
        self.store.append_delete(task_id).await
    }

    async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))?;
        task.status = status;
        drop(tasks);
        self.store
            .append_update(task_id, "status", serde_json::json!(status))
            .await
    }

    /// Run every active task whose `nextRun` is at or before now. Tasks
    /// discovered for the same JID in one sweep enqueue in discovery
    /// order; different JIDs run in parallel via separate chat queues.
    async fn tick(self: &Arc<Self>) {
        let now = Utc::now();
        let due: Vec<String> = {
            let tasks = self.tasks.read().await;
            tasks
                .values()
                .filter(|t| t.status == TaskStatus::Active && t.next_run.is_some_and(|nr| nr <= now))
                .map(|t| t.id.clone())
                .collect()
        };

        for task_id in due {
            // Re-read: the task may have been paused or cancelled since
            // the scan above built the candidate list.
            let still_due = {
                let tasks = self.tasks.read().await;
                tasks
                    .get(&task_id)
                    .is_some_and(|t| t.status == TaskStatus::Active && t.next_run.is_some_and(|nr| nr <= now))
            };
            if !still_due {
                continue;
            }
            if let Err(e) = self.run_task(&task_id).await {
                error!(task_id = %task_id, error = %e, "failed to submit scheduled task run");
            }
        }
    }

    /// Submit one task run to its chat's queue.
    pub async fn run_task(self: &Arc<Self>, task_id: &str) -> Result<()> {
        let task = {
            let tasks = self.tasks.read().await;
            tasks
                .get(task_id)
                .cloned()
                .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))?
        };

        if !self.config.resolver.folder_exists(&task.folder) {
            self.handle_run_outcome(task_id, TaskOutcome {
                task_id: task_id.to_string(),
                succeeded: false,
                error: Some("group not found".to_string()),
            })
            .await;
            return Ok(());
        }

        self.write_task_snapshot(&task.jid).await;

        let session_id = match task.context_mode {
            ContextMode::Group => self.config.sessions.session_id_for(&task.folder),
            ContextMode::Isolated => None,
        };
        let jid = task.jid.clone();
        let folder = task.folder.clone();
        let prompt = task.prompt.clone();
        let is_main = false;
        let context_mode = task.context_mode;
        let chat_jid = jid.to_string();

        let produce_config = move || {
            let mut config = AgentConfig::interactive(prompt, folder, chat_jid, is_main).as_scheduled_task();
            if context_mode == ContextMode::Group {
                if let Some(sid) = session_id {
                    config = config.with_session_id(sid);
                }
            }
            config
        };

        let engine = self.clone();
        let id = task_id.to_string();
        let on_complete = move |outcome: TaskOutcome| {
            tokio::spawn(async move {
                engine.handle_run_outcome(&id, outcome).await;
            });
        };

        self.config
            .queue
            .enqueue_task(&jid, task_id.to_string(), produce_config, on_complete)
            .await;
        Ok(())
    }

    /// Drop a read-only snapshot of the full task set into `jid`'s IPC
    /// root, so the agent's `list_tasks` tool sees a coherent view
    /// instead of racing the store. Best-effort: a write failure is
    /// logged, not propagated, since the run itself must still proceed.
    async fn write_task_snapshot(&self, jid: &Jid) {
        let tasks: Vec<ScheduledTask> = self.tasks.read().await.values().cloned().collect();
        let body = match serde_json::to_string(&tasks) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "failed to serialize task snapshot");
                return;
            }
        };
        let path = self.config.paths.ipc_root(jid).join("tasks_snapshot.json");
        if let Err(e) = self.config.fs.write_atomic(&path, &body).await {
            warn!(%jid, error = %e, "failed to write task snapshot");
        }
    }

    /// Record the run log entry and drive the retry/diagnosis state
    /// machine for one completed (or failed) run.
    async fn handle_run_outcome(self: &Arc<Self>, task_id: &str, outcome: TaskOutcome) {
        let run_at = Utc::now();
        let status_str = if outcome.succeeded { "success" } else { "error" };
        let log_entry = serde_json::json!({
            "task_id": task_id,
            "run_at": run_at,
            "duration_ms": 0,
            "status": status_str,
            "result": if outcome.succeeded { outcome.error.as_ref() } else { None },
            "error": if outcome.succeeded { None } else { outcome.error.as_ref() },
        });
        if let Err(e) = self.store.append_run_log(&self.config.run_log_path, &log_entry).await {
            warn!(task_id, error = %e, "failed to append run log");
        }

        if outcome.succeeded {
            self.handle_success(task_id, run_at).await;
        } else {
            let error = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            self.handle_failure(task_id, run_at, error).await;
        }
        self.config.events.task_completed(task_id).await;
    }

    async fn handle_success(self: &Arc<Self>, task_id: &str, run_at: chrono::DateTime<Utc>) {
        let (kind, value) = {
            let tasks = self.tasks.read().await;
            let Some(task) = tasks.get(task_id) else { return };
            (task.schedule_kind, task.schedule_value.clone())
        };

        let next_run = match compute_next_run(kind, &value, run_at) {
            Ok(nr) => nr,
            Err(e) => {
                error!(task_id, error = %e, "failed to compute next run after success");
                None
            }
        };

        let new_status = if kind == ScheduleKind::Once { TaskStatus::Completed } else { TaskStatus::Active };

        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(task_id) {
                task.retry_count = 0;
                task.last_error = None;
                task.last_run = Some(run_at);
                task.next_run = next_run;
                task.status = new_status;
            }
        }

        let _ = self.store.append_update(task_id, "retry_count", serde_json::json!(0)).await;
        let _ = self.store.append_update(task_id, "last_error", serde_json::Value::Null).await;
        let _ = self.store.append_update(task_id, "last_run", serde_json::json!(run_at)).await;
        let _ = self.store.append_update(task_id, "next_run", serde_json::json!(next_run)).await;
        if new_status == TaskStatus::Completed {
            let _ = self.store.append_update(task_id, "status", serde_json::json!(new_status)).await;
        }
        debug!(task_id, "scheduled task run succeeded");
    }

    async fn handle_failure(self: &Arc<Self>, task_id: &str, run_at: chrono::DateTime<Utc>, error: String) {
        let (retry_count, max_retries, jid) = {
            let tasks = self.tasks.read().await;
            let Some(task) = tasks.get(task_id) else { return };
            (task.retry_count + 1, task.max_retries, task.jid.clone())
        };

        let recent_errors = self
            .store
            .recent_run_errors(&self.config.run_log_path, task_id, DIAGNOSIS_WINDOW)
            .await
            .unwrap_or_default();
        let diagnosis = diagnose(&error, &recent_errors);

        match diagnosis {
            Diagnosis::Orphaned => {
                self.transition(task_id, TaskStatus::Completed, &error, None).await;
                self.notify_chat(&jid, &diagnosis, &error).await;
                return;
            }
            Diagnosis::Persistent => {
                self.transition(task_id, TaskStatus::Paused, &error, None).await;
                self.notify_chat(&jid, &diagnosis, &error).await;
                return;
            }
            _ => {}
        }

        if retry_count > max_retries {
            self.transition(task_id, TaskStatus::Error, &error, None).await;
            self.notify_chat(&jid, &diagnosis, &error).await;
            return;
        }

        let delay = backoff_for(retry_count, diagnosis);
        let next_run = run_at
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(task_id) {
                task.retry_count = retry_count;
                task.last_error = Some(error.clone());
                task.last_run = Some(run_at);
                task.next_run = Some(next_run);
            }
        }
        let _ = self.store.append_update(task_id, "retry_count", serde_json::json!(retry_count)).await;
        let _ = self.store.append_update(task_id, "last_error", serde_json::json!(error)).await;
        let _ = self.store.append_update(task_id, "last_run", serde_json::json!(run_at)).await;
        let _ = self.store.append_update(task_id, "next_run", serde_json::json!(next_run)).await;
        debug!(task_id, retry_count, delay_secs = delay.as_secs(), "scheduled task run failed, retry scheduled");
    }

    async fn transition(&self, task_id: &str, status: TaskStatus, error: &str, next_run: Option<chrono::DateTime<Utc>>) {
        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(task_id) {
                task.status = status;
                task.last_error = Some(error.to_string());
                task.next_run = next_run;
            }
        }
        let _ = self.store.append_update(task_id, "status", serde_json::json!(status)).await;
        let _ = self.store.append_update(task_id, "last_error", serde_json::json!(error)).await;
        let _ = self.store.append_update(task_id, "next_run", serde_json::json!(next_run)).await;
    }

    async fn notify_chat(&self, jid: &Jid, diagnosis: &Diagnosis, raw_error: &str) {
        let text = format!(
            "Scheduled task notice: {}. {}. Raw error: {raw_error}",
            diagnosis.description(),
            diagnosis.recommendation(),
        );
        self.config.notify.deliver(jid, &text).await;
    }

    /// Run the due-scan loop until `cancel` fires.
    pub async fn start(self: Arc<Self>, cancel: CancellationToken) {
        info!("scheduled task engine started");
        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduled task engine shutting down");
                    return;
                }
                _ = interval.tick() => {
                    self.tick().await;
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
    use nanoclaw_queue::ChatQueueConfig;
    use std::sync::Mutex as StdMutex;

    struct AllowAll;
    impl GroupResolver for AllowAll {
        fn folder_exists(&self, _folder: &str) -> bool {
            true
        }
    }

    struct DenyAll;
    impl GroupResolver for DenyAll {
        fn folder_exists(&self, _folder: &str) -> bool {
            false
        }
    }

    struct RecordingNotify {
        sent: StdMutex<Vec<String>>,
    }
    impl RecordingNotify {
        fn new() -> Self {
            Self { sent: StdMutex::new(Vec::new()) }
        }
    }
    #[async_trait::async_trait]
    impl OutboundSink for RecordingNotify {
        async fn deliver(&self, _jid: &Jid, text: &str) {
            self.sent.lock().unwrap().push(text.to_string());
        }
    }

    struct NoSessions;
    impl SessionResolver for NoSessions {
        fn session_id_for(&self, _folder: &str) -> Option<String> {
            None
        }
    }

    struct NoopSink;
    #[async_trait::async_trait]
    impl OutboundSink for NoopSink {
        async fn deliver(&self, _jid: &Jid, _text: &str) {}
    }

    fn agent_script(dir: &std::path::Path, body: &str) -> PathBuf {
        let script = dir.join("agent.sh");
        std::fs::write(&script, format!("#!/bin/sh\ncat >/dev/null\n{body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        script
    }

    fn success_script(dir: &std::path::Path) -> PathBuf {
        agent_script(
            dir,
            "echo '---NANOCLAW_OUTPUT_START---'\necho '{\"status\":\"success\",\"result\":\"ok\"}'\necho '---NANOCLAW_OUTPUT_END---'",
        )
    }

    struct FixedPaths {
        root: PathBuf,
    }
    impl nanoclaw_queue::ChatPaths for FixedPaths {
        fn working_dir(&self, _jid: &Jid) -> PathBuf {
            self.root.clone()
        }
        fn ipc_root(&self, jid: &Jid) -> PathBuf {
            self.root.join("ipc").join(jid.suffix())
        }
    }

    async fn build_engine(
        dir: &std::path::Path,
        resolver: Arc<dyn GroupResolver>,
        notify: Arc<RecordingNotify>,
        script: PathBuf,
    ) -> Arc<SchedulerEngine<NativeFileSystem>> {
        let queue_config = Arc::new(ChatQueueConfig {
            agent_runner: Arc::new(AgentRunner::new("/bin/sh", vec![script.to_string_lossy().to_string()])),
            fs: Arc::new(NativeFileSystem),
            outbound: Arc::new(NoopSink) as Arc<dyn OutboundSink>,
            interactive_idle: Duration::from_secs(30),
            task_idle: Duration::from_secs(30),
        });
        let paths = Arc::new(FixedPaths { root: dir.to_path_buf() });
        let queue = Arc::new(QueueManager::new(queue_config, paths.clone()));
        let config = SchedulerConfig {
            queue,
            resolver,
            sessions: Arc::new(NoSessions),
            notify,
            run_log_path: dir.join("runs.jsonl"),
            poll_interval: Duration::from_millis(20),
            paths,
            fs: Arc::new(NativeFileSystem),
            events: Arc::new(NoopTaskEvents),
        };
        SchedulerEngine::new(dir.join("tasks.jsonl"), config).await.unwrap()
    }

    #[tokio::test]
    async fn run_task_against_missing_group_completes_as_orphaned() {
        let dir = tempfile::tempdir().unwrap();
        let script = success_script(dir.path());
        let notify = Arc::new(RecordingNotify::new());
        let engine = build_engine(dir.path(), Arc::new(DenyAll), notify.clone(), script).await;

        let id = engine
            .add_task(
                "owner-dm".into(),
                Jid::new("discord", "1"),
                "check".into(),
                ScheduleKind::Interval,
                ScheduleValue::IntervalMs(1000),
                ContextMode::Group,
                3,
            )
            .await
            .unwrap();

        engine.run_task(&id).await.unwrap();

        let task = engine.list_tasks().await.into_iter().find(|t| t.id == id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(notify.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let script = success_script(dir.path());
        let engine = build_engine(dir.path(), Arc::new(AllowAll), Arc::new(RecordingNotify::new()), script).await;

        let id = engine
            .add_task(
                "owner-dm".into(),
                Jid::new("discord", "1"),
                "check".into(),
                ScheduleKind::Interval,
                ScheduleValue::IntervalMs(1000),
                ContextMode::Group,
                3,
            )
            .await
            .unwrap();

        engine.pause_task(&id).await.unwrap();
        assert_eq!(engine.list_tasks().await[0].status, TaskStatus::Paused);
        engine.resume_task(&id).await.unwrap();
        assert_eq!(engine.list_tasks().await[0].status, TaskStatus::Active);
    }

    #[tokio::test]
    async fn cancel_task_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let script = success_script(dir.path());
        let engine = build_engine(dir.path(), Arc::new(AllowAll), Arc::new(RecordingNotify::new()), script).await;

        let id = engine
            .add_task(
                "owner-dm".into(),
                Jid::new("discord", "1"),
                "check".into(),
                ScheduleKind::Interval,
                ScheduleValue::IntervalMs(1000),
                ContextMode::Group,
                3,
            )
            .await
            .unwrap();

        engine.cancel_task(&id).await.unwrap();
        engine.cancel_task(&id).await.unwrap();
        assert!(engine.list_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn run_task_drops_a_task_snapshot_in_the_jids_ipc_root() {
        let dir = tempfile::tempdir().unwrap();
        let script = success_script(dir.path());
        let engine = build_engine(dir.path(), Arc::new(AllowAll), Arc::new(RecordingNotify::new()), script).await;

        let jid = Jid::new("discord", "1");
        engine
            .add_task(
                "owner-dm".into(),
                jid.clone(),
                "check".into(),
                ScheduleKind::Interval,
                ScheduleValue::IntervalMs(1000),
                ContextMode::Group,
                3,
            )
            .await
            .unwrap();

        let id = engine.list_tasks().await[0].id.clone();
        engine.run_task(&id).await.unwrap();

        let snapshot_path = dir.path().join("ipc").join(jid.suffix()).join("tasks_snapshot.json");
        let body = std::fs::read_to_string(&snapshot_path).unwrap();
        let tasks: Vec<ScheduledTask> = serde_json::from_str(&body).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, id);
    }

    #[tokio::test]
    async fn run_task_reports_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let script = success_script(dir.path());
        let engine = build_engine(dir.path(), Arc::new(AllowAll), Arc::new(RecordingNotify::new()), script).await;
        let err = engine.run_task("ghost").await.unwrap_err();
        assert!(matches!(err, SchedulerError::TaskNotFound(_)));
    }
}
