//! Process wiring: owns one instance of every subsystem and drives
//! startup, the running state, and graceful shutdown.
//!
//! Lifecycle, mirroring the workspace's gateway command:
//! 1. Load plugins (discover, dependency-sort, `on_load`).
//! 2. Register and start every channel.
//! 3. Start the scheduler's due-scan loop.
//! 4. Run until `shutdown` is cancelled.
//! 5. Stop channels, unload plugins in reverse order.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use nanoclaw_channels::ChannelRouter;
use nanoclaw_plugin::{
    context::{DeniedMessagesService, DeniedTasksService, LiveIpcService, PluginLogger},
    PluginCapability, PluginContext, PluginEventBus, PluginRegistry, PluginTarget,
};
use nanoclaw_platform::FileSystem;
use nanoclaw_queue::QueueManager;
use nanoclaw_scheduler::SchedulerEngine;
use nanoclaw_types::Jid;

use crate::bus::EventBus;
use crate::error::Result;
use crate::registry::Registry;
use crate::services::{CoreMessagesService, CoreTasksService};

/// Everything needed to bring up a [`Host`], besides the already-built
/// [`Registry`], `QueueManager`, and `SchedulerEngine` (each built by
/// the caller, since they in turn need the same `Registry` wired into
/// their own configs before `Host` ever sees them).
pub struct HostConfig {
    pub plugin_dirs: Vec<PathBuf>,
    pub plugin_ipc_root: PathBuf,
    pub main_jid: Jid,
    pub main_folder: String,
}

/// Owns the registry, the queue, the scheduler, the channel router, and
/// the plugin registry, and drives their shared lifecycle.
pub struct Host<F: FileSystem> {
    pub registry: Arc<Registry>,
    pub queue: Arc<QueueManager<F>>,
    pub scheduler: Arc<SchedulerEngine<F>>,
    pub router: Arc<ChannelRouter>,
    pub event_bus: Arc<EventBus>,
    plugins: Mutex<PluginRegistry>,
    plugin_dirs: Vec<PathBuf>,
    plugin_ipc_root: PathBuf,
    main_jid: Jid,
    main_folder: String,
}

impl<F: FileSystem + 'static> Host<F> {
    /// Wire every subsystem together around an already-loaded `registry`
    /// (shared with the scheduler's `GroupResolver`/`SessionResolver`)
    /// and `event_bus` (shared with the scheduler's `TaskEvents`, so
    /// `task:created`/`task:completed` land on the same bus plugins
    /// subscribe through). Does not start anything yet -- call
    /// [`Host::run`] for that.
    pub async fn new(
        config: HostConfig,
        registry: Arc<Registry>,
        queue: Arc<QueueManager<F>>,
        scheduler: Arc<SchedulerEngine<F>>,
        event_bus: Arc<EventBus>,
        mut plugins: PluginRegistry,
    ) -> Result<Arc<Self>> {
        let router = ChannelRouter::with_events(
            registry.clone(),
            queue.clone(),
            event_bus.clone() as Arc<dyn nanoclaw_channels::MessageEvents>,
        );
        plugins.set_event_bus(event_bus.clone() as Arc<dyn PluginEventBus>);

        Ok(Arc::new(Self {
            registry,
            queue,
            scheduler,
            router,
            event_bus,
            plugins: Mutex::new(plugins),
            plugin_dirs: config.plugin_dirs,
            plugin_ipc_root: config.plugin_ipc_root,
            main_jid: config.main_jid,
            main_folder: config.main_folder,
        }))
    }

    /// Discover and load every plugin under the configured directories,
    /// building each one's capability-gated context.
    pub async fn load_plugins(&self) -> Result<Vec<String>> {
        let mut plugins = self.plugins.lock().await;
        let ipc_root = self.plugin_ipc_root.clone();
        let outbound: Arc<dyn nanoclaw_queue::OutboundSink> = self.router.clone();
        let scheduler = self.scheduler.clone();
        let main_jid = self.main_jid.clone();
        let main_folder = self.main_folder.clone();
        let event_bus = self.event_bus.clone();

        let loaded = plugins
            .load_all(&self.plugin_dirs, PluginTarget::Host, move |manifest| {
                let ipc = Arc::new(LiveIpcService::new(ipc_root.join(&manifest.name), manifest));
                let messages: Arc<dyn nanoclaw_plugin::MessagesService> =
                    if manifest.has_capability(PluginCapability::MessagesRead)
                        || manifest.has_capability(PluginCapability::MessagesWrite)
                    {
                        Arc::new(CoreMessagesService::new(outbound.clone()))
                    } else {
                        Arc::new(DeniedMessagesService::new(PluginCapability::MessagesRead))
                    };
                let tasks: Arc<dyn nanoclaw_plugin::TasksService> =
                    if manifest.has_capability(PluginCapability::TasksManage) {
                        Arc::new(CoreTasksService::new(
                            scheduler.clone(),
                            main_jid.clone(),
                            main_folder.clone(),
                        ))
                    } else {
                        Arc::new(DeniedTasksService)
                    };
                PluginContext {
                    plugin_name: manifest.name.clone(),
                    logger: PluginLogger::new(manifest.name.clone()),
                    event_bus: event_bus.clone() as Arc<dyn PluginEventBus>,
                    config: manifest.config.clone(),
                    ipc,
                    messages,
                    tasks,
                }
            })
            .await?;
        info!(count = loaded.len(), "plugins loaded");
        Ok(loaded)
    }

    /// Register a channel and immediately start it.
    pub async fn register_channel(&self, channel: Arc<dyn nanoclaw_channels::Channel>) -> Result<()> {
        self.router.register_channel(channel.clone()).await?;
        self.router.start_channel(channel.name()).await?;
        Ok(())
    }

    /// Run until `shutdown` is cancelled: starts the scheduler's
    /// due-scan loop and blocks. Channels are expected to already be
    /// registered and started via [`Host::register_channel`].
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("host started");
        self.scheduler.clone().start(shutdown.clone()).await;
        self.router.stop_all().await;
        self.plugins.lock().await.unload_all().await;
        info!("host stopped");
    }
}
