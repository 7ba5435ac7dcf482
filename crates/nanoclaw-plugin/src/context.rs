//! Capability-gated plugin context.
//!
//! The context handed to a plugin is built from the manifest's declared
//! capability set. Granular services (`ipc`) expose operations
//! individually, each backed by either the live implementation or a
//! stub that denies just that operation. Whole-object services
//! (`messages`, `tasks`) are either fully live or fully denied.
//!
//! This is the typed-systems replacement for proxy-based capability
//! gating described in the design notes: each service is a small trait,
//! and the plugin is handed either the live implementation or a
//! `Denied*` implementation that returns `CapabilityDenied` -- no
//! runtime reflection is needed.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use nanoclaw_types::{Event, EventKind};

use crate::error::PluginError;
use crate::manifest::{PluginCapability, PluginManifest};

/// What a bus handler returns: `Ok(())` on success, or any error to log.
pub type PluginEventResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// An already-boxed event handler, as handed to [`PluginEventBus::on`].
///
/// Declared here rather than accepting a generic closure because
/// `PluginEventBus` is a trait object (the host's concrete bus lives in
/// the core crate, which this crate cannot depend on); trait object
/// methods can't be generic, so the boxing has to happen at the call
/// site instead of inside the trait method.
pub type PluginEventHandler =
    Box<dyn Fn(Event) -> Pin<Box<dyn Future<Output = PluginEventResult> + Send>> + Send + Sync>;

/// The event-bus surface exposed to a plugin through its [`PluginContext`].
///
/// A plugin depends only on this trait, not on the bus's concrete type,
/// since the concrete bus lives in the core crate and this crate is a
/// dependency of that one.
#[async_trait]
pub trait PluginEventBus: Send + Sync {
    /// Publish `event` to every handler registered for its kind.
    async fn emit(&self, event: Event);

    /// Register a handler for `kind`, returning an id usable with [`off`](Self::off).
    async fn on(&self, kind: EventKind, handler: PluginEventHandler) -> u64;

    /// Unregister a previously registered handler. A no-op if the id is unknown.
    async fn off(&self, kind: EventKind, id: u64);
}

/// Plugin-scoped logging facade, attributing every line to the plugin
/// that produced it.
#[derive(Clone)]
pub struct PluginLogger {
    plugin_name: String,
}

impl PluginLogger {
    /// Build a logger that tags every line with `plugin_name`.
    pub fn new(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
        }
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(plugin = %self.plugin_name, "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!(plugin = %self.plugin_name, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(plugin = %self.plugin_name, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(plugin = %self.plugin_name, "{message}");
    }
}

/// Granular IPC operations available to a plugin.
#[async_trait]
pub trait IpcService: Send + Sync {
    /// Read a file from the plugin's IPC-visible area.
    async fn read_file(&self, path: &str) -> Result<String, PluginError>;

    /// Write a file into the plugin's IPC-visible area.
    async fn write_file(&self, path: &str, content: &str) -> Result<(), PluginError>;
}

/// Live IPC service, rooted at a directory the caller has already
/// validated is appropriate for the invoking plugin.
pub struct LiveIpcService {
    root: PathBuf,
    can_read: bool,
    can_write: bool,
}

impl LiveIpcService {
    /// Construct a live service gated per-operation on the manifest's capabilities.
    pub fn new(root: PathBuf, manifest: &PluginManifest) -> Self {
        Self {
            root,
            can_read: manifest.has_capability(PluginCapability::IpcRead),
            can_write: manifest.has_capability(PluginCapability::IpcWrite),
        }
    }
}

#[async_trait]
impl IpcService for LiveIpcService {
    async fn read_file(&self, path: &str) -> Result<String, PluginError> {
        if !self.can_read {
            return Err(PluginError::CapabilityDenied {
                operation: "ipc.readFile".into(),
                capability: "ipc:read".into(),
            });
        }
        tokio::fs::read_to_string(self.root.join(path))
            .await
            .map_err(PluginError::Io)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), PluginError> {
        if !self.can_write {
            return Err(PluginError::CapabilityDenied {
                operation: "ipc.writeFile".into(),
                capability: "ipc:write".into(),
            });
        }
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(PluginError::Io)?;
        }
        tokio::fs::write(full, content).await.map_err(PluginError::Io)
    }
}

/// Whole-object service for reading/sending conversation messages.
#[async_trait]
pub trait MessagesService: Send + Sync {
    /// Read recent messages for the current chat.
    async fn read(&self, jid: &str, limit: usize) -> Result<Vec<String>, PluginError>;

    /// Send a message to the current chat.
    async fn send(&self, jid: &str, text: &str) -> Result<(), PluginError>;
}

/// A `messages` stub every one of whose methods denies with the missing capability.
pub struct DeniedMessagesService {
    missing: PluginCapability,
}

impl DeniedMessagesService {
    /// Build a stub naming the capability the plugin failed to declare.
    pub fn new(missing: PluginCapability) -> Self {
        Self { missing }
    }

    fn denial(&self, operation: &str) -> PluginError {
        let capability = match self.missing {
            PluginCapability::MessagesRead => "messages:read",
            PluginCapability::MessagesWrite => "messages:write",
            _ => "messages",
        };
        PluginError::CapabilityDenied {
            operation: operation.into(),
            capability: capability.into(),
        }
    }
}

#[async_trait]
impl MessagesService for DeniedMessagesService {
    async fn read(&self, _jid: &str, _limit: usize) -> Result<Vec<String>, PluginError> {
        Err(self.denial("messages.read"))
    }

    async fn send(&self, _jid: &str, _text: &str) -> Result<(), PluginError> {
        Err(self.denial("messages.send"))
    }
}

/// Whole-object service for managing scheduled tasks.
#[async_trait]
pub trait TasksService: Send + Sync {
    /// Create a scheduled task, returning its id.
    async fn create(&self, prompt: &str, schedule: &str) -> Result<String, PluginError>;

    /// Cancel a scheduled task by id.
    async fn cancel(&self, task_id: &str) -> Result<(), PluginError>;
}

/// A `tasks` stub every one of whose methods denies with `tasks:manage`.
pub struct DeniedTasksService;

#[async_trait]
impl TasksService for DeniedTasksService {
    async fn create(&self, _prompt: &str, _schedule: &str) -> Result<String, PluginError> {
        Err(PluginError::CapabilityDenied {
            operation: "tasks.create".into(),
            capability: "tasks:manage".into(),
        })
    }

    async fn cancel(&self, _task_id: &str) -> Result<(), PluginError> {
        Err(PluginError::CapabilityDenied {
            operation: "tasks.cancel".into(),
            capability: "tasks:manage".into(),
        })
    }
}

/// The services and configuration handed to a loaded plugin.
///
/// Constructed once per plugin at load time from a fixed set of real
/// services and the plugin's declared capability list.
#[derive(Clone)]
pub struct PluginContext {
    /// The plugin this context was built for (for log attribution).
    pub plugin_name: String,
    /// Plugin-scoped logger.
    pub logger: PluginLogger,
    /// The shared event bus, for subscribing to or emitting bus events.
    pub event_bus: Arc<dyn PluginEventBus>,
    /// The plugin's own manifest-declared configuration.
    pub config: serde_json::Value,
    /// Capability-gated IPC access.
    pub ipc: Arc<dyn IpcService>,
    /// Capability-gated message access.
    pub messages: Arc<dyn MessagesService>,
    /// Capability-gated task management.
    pub tasks: Arc<dyn TasksService>,
}

/// An event bus that drops every subscription and emission.
///
/// Useful wherever a [`PluginContext`] is built without a real bus at
/// hand, such as tests exercising something other than event flow.
pub struct NoopEventBus;

#[async_trait]
impl PluginEventBus for NoopEventBus {
    async fn emit(&self, _event: Event) {}

    async fn on(&self, _kind: EventKind, _handler: PluginEventHandler) -> u64 {
        0
    }

    async fn off(&self, _kind: EventKind, _id: u64) {}
}
