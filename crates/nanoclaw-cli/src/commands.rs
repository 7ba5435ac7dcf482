//! Subcommand bodies. Each loads config and whatever on-disk state it
//! needs directly -- commands are one-shot processes that read/mutate
//! the same JSONL stores the running host uses, not RPC calls into it.

use std::path::PathBuf;
use std::sync::Arc;

use comfy_table::{presets::UTF8_FULL, Table};

use nanoclaw_agent::AgentRunner;
use nanoclaw_core::{EventBus, NanoclawConfig, Registry};
use nanoclaw_platform::NativeFileSystem;
use nanoclaw_plugin::PluginRegistry;
use nanoclaw_queue::{ChatQueueConfig, QueueManager, DEFAULT_INTERACTIVE_IDLE, DEFAULT_TASK_IDLE};
use nanoclaw_scheduler::{SchedulerConfig, SchedulerEngine, TaskEvents, DEFAULT_POLL_INTERVAL};

use crate::paths::DataDirChatPaths;
use crate::sink::StdoutSink;

pub async fn load_config(explicit: Option<&str>) -> anyhow::Result<NanoclawConfig> {
    let path = nanoclaw_core::config::discover_path(explicit)
        .ok_or_else(|| anyhow::anyhow!("could not locate a config file"))?;
    nanoclaw_core::config::load(&path)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
}

async fn open_registry(config: &NanoclawConfig) -> anyhow::Result<Arc<Registry>> {
    Ok(Arc::new(
        Registry::load(config.data_dir(), Default::default(), Default::default()).await?,
    ))
}

fn task_store_path(config: &NanoclawConfig) -> PathBuf {
    config.data_dir().join("tasks.jsonl")
}

fn run_log_path(config: &NanoclawConfig) -> PathBuf {
    config.data_dir().join("task_runs.jsonl")
}

/// Build a fully wired (but not yet running) scheduler engine, for
/// commands that need to exercise real pause/resume/cancel/run-now
/// transitions rather than just list the persisted task set.
async fn open_scheduler(
    config: &NanoclawConfig,
    events: Arc<dyn TaskEvents>,
) -> anyhow::Result<Arc<SchedulerEngine<NativeFileSystem>>> {
    let registry = open_registry(config).await?;
    let paths = Arc::new(DataDirChatPaths::new(config.data_dir()));
    let fs = Arc::new(NativeFileSystem);
    let agent_runner = Arc::new(AgentRunner::new(
        config.agent_command.clone(),
        config.agent_args.clone(),
    ));
    let queue_config = Arc::new(ChatQueueConfig {
        agent_runner,
        fs: fs.clone(),
        outbound: Arc::new(StdoutSink),
        interactive_idle: DEFAULT_INTERACTIVE_IDLE,
        task_idle: DEFAULT_TASK_IDLE,
    });
    let queue = Arc::new(QueueManager::new(queue_config, paths.clone()));

    let scheduler_config = SchedulerConfig {
        queue,
        resolver: registry.clone(),
        sessions: registry.clone(),
        notify: Arc::new(StdoutSink),
        run_log_path: run_log_path(config),
        poll_interval: DEFAULT_POLL_INTERVAL,
        paths,
        fs,
        events,
    };
    Ok(SchedulerEngine::new(task_store_path(config), scheduler_config).await?)
}

pub async fn run(config_path: Option<String>) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    let registry = open_registry(&config).await?;
    let event_bus = Arc::new(EventBus::new());
    let scheduler = open_scheduler(&config, event_bus.clone() as Arc<dyn TaskEvents>).await?;

    let host_config = nanoclaw_core::HostConfig {
        plugin_dirs: config.plugin_dirs(),
        plugin_ipc_root: config.data_dir().join("plugin-ipc"),
        main_jid: nanoclaw_types::Jid::parse(config.main_jid.clone())?,
        main_folder: config.main_folder.clone(),
    };
    // The queue inside `scheduler`'s config isn't reachable from here,
    // so `run` builds its own via `open_scheduler`'s twin and hands it
    // to the host; they share the same on-disk `tasks.jsonl`/registry.
    let paths = Arc::new(DataDirChatPaths::new(config.data_dir()));
    let fs = Arc::new(NativeFileSystem);
    let agent_runner = Arc::new(AgentRunner::new(
        config.agent_command.clone(),
        config.agent_args.clone(),
    ));
    let host = nanoclaw_core::Host::new(
        host_config,
        registry,
        Arc::new(QueueManager::new(
            Arc::new(ChatQueueConfig {
                agent_runner,
                fs: fs.clone(),
                outbound: Arc::new(StdoutSink),
                interactive_idle: DEFAULT_INTERACTIVE_IDLE,
                task_idle: DEFAULT_TASK_IDLE,
            }),
            paths,
        )),
        scheduler,
        event_bus,
        PluginRegistry::new(),
    )
    .await?;

    host.load_plugins().await?;
    tracing::info!("no channels registered by this binary; external channel plugins attach via Host::register_channel");

    let shutdown = tokio_util::sync::CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_signal.cancel();
    });

    host.run(shutdown).await;
    Ok(())
}

pub async fn status(config_path: Option<String>) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    let registry = open_registry(&config).await?;
    let scheduler = open_scheduler(&config, Arc::new(nanoclaw_scheduler::NoopTaskEvents)).await?;

    println!("data dir: {}", config.data_dir().display());
    println!("registered chats: {}", registry.list_chats().len());
    println!("scheduled tasks: {}", scheduler.list_tasks().await.len());
    println!("agent command: {} {}", config.agent_command, config.agent_args.join(" "));
    Ok(())
}

pub async fn channels_list(config_path: Option<String>) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    let registry = open_registry(&config).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["jid", "folder", "display name", "main"]);
    for chat in registry.list_chats() {
        table.add_row(vec![
            chat.jid.to_string(),
            chat.folder,
            chat.display_name,
            chat.is_main.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn tasks_list(config_path: Option<String>) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    let scheduler = open_scheduler(&config, Arc::new(nanoclaw_scheduler::NoopTaskEvents)).await?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["id", "folder", "jid", "status", "next run"]);
    for task in scheduler.list_tasks().await {
        table.add_row(vec![
            task.id,
            task.folder,
            task.jid.to_string(),
            format!("{:?}", task.status),
            task.next_run.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn tasks_pause(config_path: Option<String>, task_id: String) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    open_scheduler(&config, Arc::new(nanoclaw_scheduler::NoopTaskEvents)).await?.pause_task(&task_id).await?;
    Ok(())
}

pub async fn tasks_resume(config_path: Option<String>, task_id: String) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    open_scheduler(&config, Arc::new(nanoclaw_scheduler::NoopTaskEvents)).await?.resume_task(&task_id).await?;
    Ok(())
}

pub async fn tasks_cancel(config_path: Option<String>, task_id: String) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    open_scheduler(&config, Arc::new(nanoclaw_scheduler::NoopTaskEvents)).await?.cancel_task(&task_id).await?;
    Ok(())
}

pub async fn tasks_run_now(config_path: Option<String>, task_id: String) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    open_scheduler(&config, Arc::new(nanoclaw_scheduler::NoopTaskEvents)).await?.run_task(&task_id).await?;
    Ok(())
}

pub async fn plugins_list(config_path: Option<String>) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    let manifests = PluginRegistry::discover(&config.plugin_dirs(), nanoclaw_plugin::PluginTarget::Host).await;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["name", "version", "target", "capabilities"]);
    for manifest in manifests {
        table.add_row(vec![
            manifest.name,
            manifest.version,
            format!("{:?}", manifest.target),
            manifest
                .capabilities
                .iter()
                .map(|c| format!("{c:?}"))
                .collect::<Vec<_>>()
                .join(","),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn config_show(config_path: Option<String>) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "data_dir": config.data_dir(),
        "plugin_dirs": config.plugin_dirs(),
        "main_jid": config.main_jid,
        "main_folder": config.main_folder,
        "task_poll_seconds": config.task_poll_seconds,
        "agent_command": config.agent_command,
        "agent_args": config.agent_args,
    }))?);
    Ok(())
}
